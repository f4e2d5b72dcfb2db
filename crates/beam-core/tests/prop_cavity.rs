// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Property-Based Tests (proptest) for beam-core
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Property-based tests for the RF cavity element.
//!
//! Covers: covariance symmetry and semi-definiteness, the field-free limit,
//! synchronous/driven phase inversion, cache idempotence.

mod common;

use beam_core::cavity::RfCavity;
use beam_core::element::Element;
use beam_core::sync_phase::SyncPhaseSolver;
use beam_math::linalg::{is_positive_semidefinite, is_symmetric};
use beam_types::constants::{PS_DIM, PS_PX, PS_PY, PS_X, PS_Y};
use common::*;
use ndarray::{Array1, Array2};
use proptest::prelude::*;

/// Symmetric PSD covariance A·Aᵀ over the six dynamic coordinates.
fn covariance(entries: &[f64]) -> Array2<f64> {
    let a = Array2::from_shape_fn((6, 6), |(i, j)| entries[i * 6 + j]);
    let s = a.dot(&a.t());
    let mut out: Array2<f64> = Array2::zeros((PS_DIM, PS_DIM));
    for i in 0..6 {
        for j in 0..6 {
            out[[i, j]] = s[[i, j]];
        }
    }
    out
}

// ── Covariance Transport ─────────────────────────────────────────────

proptest! {
    /// Output covariance stays symmetric and PSD for any PSD input.
    #[test]
    fn covariance_stays_symmetric_psd(
        entries in proptest::collection::vec(-1e-3f64..1e-3, 36),
        scale in 0.0f64..1.5,
        phi in -80.0f64..0.0,
    ) {
        let mut cfg = generic_config("axis.json", scale);
        cfg.sync_phase_deg = phi;
        let mut cav = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).unwrap();
        let mut m0: Array1<f64> = Array1::zeros(PS_DIM);
        m0[6] = 1.0;
        let mut state = state_with(
            vec![ion(0.2, 1.0, 0.5e6), ion(0.19, 1.0, 0.499e6)],
            m0,
            covariance(&entries),
        );
        cav.advance(&mut state).unwrap();
        for sigma in &state.moment1 {
            prop_assert!(is_symmetric(sigma, 1e-12));
            prop_assert!(is_positive_semidefinite(sigma, 1e-9));
        }
    }

    /// With growth enabled the covariance is still symmetric.
    #[test]
    fn emittance_growth_keeps_symmetry(
        entries in proptest::collection::vec(-1e-3f64..1e-3, 36),
        phi in -60.0f64..-5.0,
    ) {
        let mut cfg = generic_config("axis.json", 1.0);
        cfg.sync_phase_deg = phi;
        cfg.emittance_growth = true;
        let mut cav = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).unwrap();
        let mut state = state_with(vec![ion(0.2, 1.0, 0.5e6)], Array1::zeros(PS_DIM), covariance(&entries));
        cav.advance(&mut state).unwrap();
        prop_assert!(is_symmetric(&state.moment1[0], 1e-12));
    }
}

// ── Field-Free Limit ─────────────────────────────────────────────────

proptest! {
    /// V0 = 0: the reference energy is untouched and the transverse block
    /// is a 0.5 m drift, for any ion.
    #[test]
    fn zero_voltage_drift(
        ek in 0.2e6f64..2.0e6,
        z in 0.1f64..0.5,
    ) {
        let mut cav = RfCavity::new(generic_config("axis.json", 0.0), registry(&[("axis.json", 1.0)])).unwrap();
        let mut state = state_with(vec![ion(z, 1.0, ek)], Array1::zeros(PS_DIM), diagonal_sigma(1e-6));
        let ek_ref = state.ref_ion.ion_ek;
        cav.advance(&mut state).unwrap();
        prop_assert_eq!(state.ref_ion.ion_ek, ek_ref);
        prop_assert_eq!(state.real[0].ion_ek, ek);

        let m = &cav.transfer_matrices()[0];
        prop_assert!((m[[PS_X, PS_PX]] - 0.5).abs() < 1e-12);
        prop_assert!((m[[PS_Y, PS_PY]] - 0.5).abs() < 1e-12);
        prop_assert!((m[[PS_PX, PS_PX]] - 1.0).abs() < 1e-15);
        prop_assert!(m[[PS_PX, PS_X]].abs() < 1e-15);
        prop_assert!(m[[PS_X, PS_Y]].abs() < 1e-15);
    }
}

// ── Phase Inversion ──────────────────────────────────────────────────

proptest! {
    /// driven → synchronous reproduces the requested synchronous phase
    /// for the sinusoidal fit.
    #[test]
    fn sinusoidal_phase_roundtrip(
        a in -20.0f64..20.0,
        b in -2.0f64..2.0,
        phis in -1e3f64..1e3,
        phi_s in -1.5f64..1.5,
    ) {
        let mut cfg = generic_config("axis.json", 1.0);
        cfg.sync_fit = vec![a, b];
        let solver = SyncPhaseSolver::from_config(&cfg).unwrap();
        let mut reference = ion(0.2, 0.0, 0.8e6);
        reference.phis = phis;
        let driven = solver.driven_phase(&reference, phi_s).unwrap();
        let back = solver.synchronous_phase(&reference, driven).unwrap();
        prop_assert!((back - phi_s).abs() < 1e-9, "{} vs {}", back, phi_s);
    }

    /// Same for the complex peak-base fit, solved iteratively.
    #[test]
    fn complex_phase_roundtrip(
        base in -30.0f64..30.0,
        peak in 0.0f64..40.0,
        centre in -180.0f64..180.0,
        phis in -1e3f64..1e3,
        phi_s in -1.5f64..1.5,
    ) {
        let mut cfg = generic_config("axis.json", 1.0);
        cfg.sync_complex = Some(vec![
            base, 0.1, 0.5, 0.0,
            peak, 0.0, 0.0, 0.0,
            centre, 0.0, 0.0, 0.0,
        ]);
        cfg.ref_nrm = Some(0.2);
        let solver = SyncPhaseSolver::from_config(&cfg).unwrap();
        let mut reference = ion(0.2, 0.0, 0.8e6);
        reference.phis = phis;
        let driven = solver.driven_phase(&reference, phi_s).unwrap();
        let back = solver.synchronous_phase(&reference, driven).unwrap();
        prop_assert!((back - phi_s).abs() < 1e-9, "{} vs {}", back, phi_s);
    }
}

// ── Idempotence ──────────────────────────────────────────────────────

proptest! {
    #[test]
    fn cached_replay_matches_first_pass(
        phi in -80.0f64..0.0,
        dek in -5e3f64..5e3,
    ) {
        let mut cfg = generic_config("axis.json", 1.0);
        cfg.sync_phase_deg = phi;
        let mut cav = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).unwrap();
        let mut input = two_state_bunch();
        input.real[1].ion_ek += dek;
        input.recalc();

        let mut first = input.clone();
        cav.advance(&mut first).unwrap();
        let mut second = input.clone();
        cav.advance(&mut second).unwrap();
        prop_assert_eq!(&first.ref_ion, &second.ref_ion);
        prop_assert_eq!(&first.moment0, &second.moment0);
        prop_assert_eq!(&first.moment1, &second.moment1);
        prop_assert_eq!(cav.cache_stats(), (1, 1));
    }
}

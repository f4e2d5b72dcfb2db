// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — RF Cavity Element Integration Tests
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! End-to-end behaviour of the RF cavity element through `Element::advance`.

mod common;

use beam_core::cache::CavityCache;
use beam_core::cavity::RfCavity;
use beam_core::element::Element;
use beam_core::moments::MomentPropagator;
use beam_core::transit::{GapTransitModel, TransitModel};
use beam_types::constants::{PS_DIM, PS_PX, PS_PY, PS_S, PS_X, PS_Y};
use beam_types::error::BeamError;
use beam_types::state::MomentState;
use common::*;
use ndarray::Array1;

fn assert_same_output(a: &MomentState, b: &MomentState) {
    assert_eq!(a.ref_ion, b.ref_ion);
    assert_eq!(a.real, b.real);
    assert_eq!(a.moment0, b.moment0);
    assert_eq!(a.moment1, b.moment1);
    assert_eq!(a.moment1_env, b.moment1_env);
    assert_eq!(a.pos.to_bits(), b.pos.to_bits());
    assert_eq!(
        a.last_cavity_phase_deg.to_bits(),
        b.last_cavity_phase_deg.to_bits()
    );
}

// ── Cache ────────────────────────────────────────────────────────────

#[test]
fn repeated_input_gives_bit_identical_output() {
    init_logging();
    let mut cav = RfCavity::new(generic_config("axis.json", 1.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let input = two_state_bunch();

    let mut first = input.clone();
    cav.advance(&mut first).unwrap();
    assert!(cav.is_cached(&input));

    let mut second = input.clone();
    cav.advance(&mut second).unwrap();
    assert_eq!(cav.cache_stats(), (1, 1));
    assert_same_output(&first, &second);

    // a fresh element computes the same thing from scratch
    let mut fresh = RfCavity::new(generic_config("axis.json", 1.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let mut third = input.clone();
    fresh.advance(&mut third).unwrap();
    assert_same_output(&first, &third);
}

#[test]
fn changed_input_misses_cache() {
    let mut cav = RfCavity::new(generic_config("axis.json", 1.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let mut a = two_state_bunch();
    cav.advance(&mut a).unwrap();
    let mut b = two_state_bunch();
    b.ref_ion.phis += 1e-3;
    cav.advance(&mut b).unwrap();
    assert_eq!(cav.cache_stats(), (0, 2));
}

#[test]
fn transfer_matrix_count_tracks_bunch_size() {
    let mut cav = RfCavity::new(generic_config("axis.json", 1.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let mut two = two_state_bunch();
    cav.advance(&mut two).unwrap();
    assert_eq!(cav.transfer_matrices().len(), 2);

    let mut one = state_with(
        vec![ion(0.2, 1.0, 0.5e6)],
        Array1::zeros(PS_DIM),
        diagonal_sigma(1e-6),
    );
    cav.advance(&mut one).unwrap();
    assert_eq!(cav.transfer_matrices().len(), 1);
    assert_eq!(cav.line_tables().len(), 1);
}

// ── Field-Free Limit ─────────────────────────────────────────────────

#[test]
fn zero_voltage_is_pure_drift() {
    let mut cav = RfCavity::new(generic_config("axis.json", 0.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let mut state = two_state_bunch();
    let ref_in = state.ref_ion.clone();
    cav.advance(&mut state).unwrap();

    assert_eq!(state.ref_ion.ion_ek, ref_in.ion_ek);
    let transit = ref_in.sample_ion_k * 0.5;
    assert!(
        (state.ref_ion.phis - ref_in.phis - transit).abs() < 1e-9,
        "reference phase advanced by {} instead of {transit}",
        state.ref_ion.phis - ref_in.phis
    );

    for m in cav.transfer_matrices() {
        for i in 0..4 {
            for j in 0..4 {
                let expected = match (i, j) {
                    _ if i == j => 1.0,
                    (PS_X, PS_PX) | (PS_Y, PS_PY) => 0.5,
                    _ => 0.0,
                };
                assert!(
                    (m[[i, j]] - expected).abs() < 1e-12,
                    "M({i},{j}) = {} (expected {expected})",
                    m[[i, j]]
                );
            }
        }
    }
}

#[test]
fn field_free_single_state_scenario() {
    let mut cfg = generic_config("axis.json", 0.0);
    cfg.frequency_hz = 80.5e6;
    cfg.length = 0.5;
    cfg.multipole_level = 0;
    let mut cav = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).unwrap();

    let mut m0: Array1<f64> = Array1::zeros(PS_DIM);
    m0[6] = 1.0;
    let mut state = state_with(vec![ion(0.2, 1.0, 0.502e6)], m0, diagonal_sigma(1e-6));
    cav.advance(&mut state).unwrap();

    assert_eq!(state.moment0[0][PS_S], state.real[0].phis - state.ref_ion.phis);
    assert!(state.moment0[0][PS_S] != 0.0);

    let sigma = &state.moment1[0];
    for i in [PS_X, PS_PX] {
        for j in [PS_Y, PS_PY] {
            assert_eq!(sigma[[i, j]], 0.0, "x-y mixing at ({i},{j})");
            assert_eq!(sigma[[j, i]], 0.0, "x-y mixing at ({j},{i})");
        }
    }
    // drift: <x x> = σ + L²σ', <x x'> = Lσ'
    assert!((sigma[[PS_X, PS_X]] - 1e-6 * 1.25).abs() < 1e-18);
    assert!((sigma[[PS_X, PS_PX]] - 0.5e-6).abs() < 1e-18);
    assert!((sigma[[PS_PX, PS_PX]] - 1e-6).abs() < 1e-18);
}

// ── Reload ───────────────────────────────────────────────────────────

#[test]
fn changing_data_file_reloads_tables() {
    init_logging();
    let reg = registry(&[("a.json", 1.0), ("b.json", 0.5)]);
    let mut cav = RfCavity::new(generic_config("a.json", 1.0), reg.clone()).unwrap();
    assert_eq!(reg.borrow().load_count(), 1);

    let input = two_state_bunch();
    let ion_at_entry = input.ref_ion.clone();
    let v0_a = cav.transit_factors(0, &ion_at_entry).unwrap().v0;
    let mut out_a = input.clone();
    cav.advance(&mut out_a).unwrap();

    cav.reconfigure(generic_config("b.json", 1.0)).unwrap();
    let mut out_b = input.clone();
    cav.advance(&mut out_b).unwrap();
    assert_eq!(reg.borrow().load_count(), 2);

    let v0_b = cav.transit_factors(0, &ion_at_entry).unwrap().v0;
    assert!((v0_b - 0.5 * v0_a).abs() < 1e-9 * v0_a.abs());
    assert_ne!(out_a.ref_ion.ion_ek, out_b.ref_ion.ion_ek);
}

#[test]
fn changing_only_the_phase_keeps_tables() {
    let reg = registry(&[("a.json", 1.0)]);
    let mut cav = RfCavity::new(generic_config("a.json", 1.0), reg.clone()).unwrap();
    let input = two_state_bunch();
    cav.advance(&mut input.clone()).unwrap();

    let mut cfg = generic_config("a.json", 1.0);
    cfg.sync_phase_deg = -10.0;
    cav.reconfigure(cfg).unwrap();
    cav.advance(&mut input.clone()).unwrap();
    assert_eq!(reg.borrow().load_count(), 1);
    assert_eq!(cav.cache_stats(), (0, 2));
}

#[test]
fn changing_cavity_type_switches_model() {
    let reg = registry(&[("a.json", 1.0)]);
    let mut cav = RfCavity::new(generic_config("a.json", 1.0), reg.clone()).unwrap();
    assert!(matches!(cav.transit_model(), TransitModel::Tabulated(_)));
    cav.advance(&mut two_state_bunch()).unwrap();

    cav.reconfigure(qwr_config()).unwrap();
    cav.advance(&mut two_state_bunch()).unwrap();
    assert!(matches!(cav.transit_model(), TransitModel::Fitted(_)));
    assert_eq!(cav.transit_model().gap_count(), 2);
    assert_eq!(reg.borrow().load_count(), 2);
}

// ── Errors ───────────────────────────────────────────────────────────

#[test]
fn fitted_model_rejects_beta_outside_fit() {
    let mut cav = RfCavity::new(qwr_config(), registry(&[])).unwrap();
    let mut state = state_with(
        vec![ion(0.2, 1.0, 10.0e6)],
        Array1::zeros(PS_DIM),
        diagonal_sigma(1e-6),
    );
    let err = cav.advance(&mut state).unwrap_err();
    assert!(matches!(err, BeamError::DataRange(_)), "{err}");
}

#[test]
fn energy_outside_fit_limits_is_data_range_error() {
    let mut cfg = generic_config("axis.json", 1.0);
    cfg.ek_limits = Some(vec![1.0, 2.0]);
    let mut cav = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).unwrap();
    let err = cav.advance(&mut two_state_bunch()).unwrap_err();
    assert!(matches!(err, BeamError::DataRange(_)));
}

#[test]
fn unknown_cavity_type_is_configuration_error() {
    let mut cfg = generic_config("axis.json", 1.0);
    cfg.cavity_type = "0.9ELL".to_string();
    let err = RfCavity::new(cfg, registry(&[("axis.json", 1.0)])).err().unwrap();
    assert!(matches!(err, BeamError::Configuration(_)));
}

#[test]
fn missing_data_is_configuration_error() {
    let err = RfCavity::new(generic_config("nowhere.json", 1.0), registry(&[]))
        .err()
        .unwrap();
    assert!(matches!(err, BeamError::Configuration(_)));
}

#[test]
fn propagating_with_stale_cache_is_consistency_error() {
    let propagator = MomentPropagator {
        emittance_growth: false,
        sync_phase: 0.0,
        lambda: 3.7,
    };
    let err = propagator
        .propagate(&mut two_state_bunch(), &CavityCache::default())
        .unwrap_err();
    assert!(matches!(
        err,
        BeamError::CacheConsistency { cached: 0, incoming: 2 }
    ));
}

// ── Moments ──────────────────────────────────────────────────────────

#[test]
fn longitudinal_centroid_tracks_particle_offsets() {
    let mut cav = RfCavity::new(generic_config("axis.json", 1.0), registry(&[("axis.json", 1.0)]))
        .unwrap();
    let mut state = two_state_bunch();
    cav.advance(&mut state).unwrap();
    for i in 0..state.size() {
        assert_eq!(state.moment0[i][PS_S], state.real[i].phis - state.ref_ion.phis);
        let dw = (state.real[i].ion_ek - state.ref_ion.ion_ek) / 1e6;
        assert_eq!(state.moment0[i][5], dw);
    }
    assert!((state.pos - 0.5).abs() < 1e-15);
    assert!(state.last_cavity_phase_deg.abs() < 360.0);
}

#[test]
fn emittance_growth_only_widens_slopes() {
    let mut plain_cfg = generic_config("axis.json", 1.0);
    plain_cfg.emittance_growth = false;
    let mut grow_cfg = plain_cfg.clone();
    grow_cfg.emittance_growth = true;
    let reg = registry(&[("axis.json", 1.0)]);

    let mut plain = two_state_bunch();
    RfCavity::new(plain_cfg, reg.clone()).unwrap().advance(&mut plain).unwrap();
    let mut grown = two_state_bunch();
    RfCavity::new(grow_cfg, reg).unwrap().advance(&mut grown).unwrap();

    for i in 0..plain.size() {
        let (p, g) = (&plain.moment1[i], &grown.moment1[i]);
        for axis in [PS_PX, PS_PY, 5] {
            assert!(g[[axis, axis]] >= p[[axis, axis]] * (1.0 - 1e-12));
        }
        assert!((g[[PS_X, PS_X]] - p[[PS_X, PS_X]]).abs() <= 1e-15 * p[[PS_X, PS_X]]);
        for j in 0..PS_DIM {
            for k in 0..PS_DIM {
                assert!((g[[j, k]] - g[[k, j]]).abs() <= 1e-12 * g[[j, j]].abs().max(1e-30));
            }
        }
    }
}

#[test]
fn transverse_offset_is_invisible_in_field_free_cavity() {
    let reg = registry(&[("axis.json", 1.0)]);
    let aligned_cfg = generic_config("axis.json", 0.0);
    let mut offset_cfg = aligned_cfg.clone();
    offset_cfg.misalignment.dx = 1e-3;
    offset_cfg.misalignment.dy = -5e-4;

    let mut aligned = two_state_bunch();
    RfCavity::new(aligned_cfg, reg.clone()).unwrap().advance(&mut aligned).unwrap();
    let mut offset = two_state_bunch();
    RfCavity::new(offset_cfg, reg).unwrap().advance(&mut offset).unwrap();

    for i in 0..aligned.size() {
        for j in 0..PS_DIM {
            assert!((aligned.moment0[i][j] - offset.moment0[i][j]).abs() < 1e-15);
            for k in 0..PS_DIM {
                assert!((aligned.moment1[i][[j, k]] - offset.moment1[i][[j, k]]).abs() < 1e-18);
            }
        }
    }
}

#[test]
fn cavities_chain_through_the_element_trait() {
    let reg = registry(&[("axis.json", 1.0)]);
    let mut line: Vec<Box<dyn Element>> = vec![
        Box::new(RfCavity::new(generic_config("axis.json", 1.0), reg.clone()).unwrap()),
        Box::new(RfCavity::new(generic_config("axis.json", 1.0), reg.clone()).unwrap()),
    ];
    let mut state = two_state_bunch();
    let ek_in = state.ref_ion.ion_ek;
    for element in line.iter_mut() {
        assert_eq!(element.type_tag(), "rfcavity");
        element.advance(&mut state).unwrap();
    }
    assert!((state.pos - 1.0).abs() < 1e-15);
    assert!(state.ref_ion.ion_ek != ek_in);
    // both elements share one parsed table
    assert_eq!(reg.borrow().load_count(), 1);
}

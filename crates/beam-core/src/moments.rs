// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Moment Propagation
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! First/second moment transport through the cavity.
//!
//! Per charge state: misalign, transport, optionally widen for RF-induced
//! emittance growth, misalign back. The longitudinal centroid is then
//! replaced by the exact phase and energy offsets from the reference ion.

use crate::cache::CavityCache;
use beam_math::linalg::congruence;
use beam_types::config::MisalignmentConfig;
use beam_types::constants::{MEV_TO_EV, PS_DIM, PS_PS, PS_PX, PS_PY, PS_QQ, PS_S, PS_X, PS_Y};
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::{MomentState, ParticleState};
use ndarray::Array2;
use std::f64::consts::PI;

/// Element offsets [m], angles [rad] and roll [rad].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Misalignment {
    pub dx: f64,
    pub dy: f64,
    pub pitch: f64,
    pub yaw: f64,
    pub tilt: f64,
}

impl From<MisalignmentConfig> for Misalignment {
    fn from(cfg: MisalignmentConfig) -> Self {
        Misalignment {
            dx: cfg.dx,
            dy: cfg.dy,
            pitch: cfg.pitch,
            yaw: cfg.yaw,
            tilt: cfg.tilt,
        }
    }
}

impl Misalignment {
    fn shift(&self, sign: f64) -> Array2<f64> {
        let mut m: Array2<f64> = Array2::eye(PS_DIM);
        m[[PS_X, PS_QQ]] = -sign * self.dx;
        m[[PS_PX, PS_QQ]] = -sign * self.yaw;
        m[[PS_Y, PS_QQ]] = -sign * self.dy;
        m[[PS_PY, PS_QQ]] = -sign * self.pitch;
        m
    }

    fn roll(angle: f64) -> Array2<f64> {
        let (sin, cos) = angle.sin_cos();
        let mut m: Array2<f64> = Array2::eye(PS_DIM);
        for (u, v) in [(PS_X, PS_Y), (PS_PX, PS_PY)] {
            m[[u, u]] = cos;
            m[[u, v]] = sin;
            m[[v, u]] = -sin;
            m[[v, v]] = cos;
        }
        m
    }

    /// Beam-to-element map (shift, then roll).
    pub fn matrix(&self) -> Array2<f64> {
        Self::roll(self.tilt).dot(&self.shift(1.0))
    }

    /// Element-to-beam map, the exact inverse of [`Misalignment::matrix`].
    pub fn inverse(&self) -> Array2<f64> {
        self.shift(-1.0).dot(&Self::roll(-self.tilt))
    }
}

/// Inputs to the RF emittance-growth correction of one charge state.
#[derive(Debug, Clone, Copy)]
pub struct EmittanceGrowthInput {
    pub ion_z: f64,
    pub ion_es: f64,
    pub lambda: f64,
    /// Synchronous phase [rad].
    pub sync_phase: f64,
    /// Charge-state energy gain [eV/u].
    pub energy_gain: f64,
    pub beta_avg: f64,
    pub gamma_avg: f64,
    /// ⟨x²⟩, ⟨y²⟩ of the incoming beam and the misaligned centroid.
    pub x2: f64,
    pub y2: f64,
    pub x0: f64,
    pub y0: f64,
}

impl EmittanceGrowthInput {
    pub fn new(
        reference: &ParticleState,
        before: &ParticleState,
        after: &ParticleState,
        lambda: f64,
        sync_phase: f64,
    ) -> Self {
        EmittanceGrowthInput {
            ion_z: reference.ion_z,
            ion_es: reference.ion_es,
            lambda,
            sync_phase,
            energy_gain: after.ion_w - before.ion_w,
            beta_avg: 0.5 * (before.beta + after.beta),
            gamma_avg: 0.5 * (before.gamma + after.gamma),
            x2: 0.0,
            y2: 0.0,
            x0: 0.0,
            y0: 0.0,
        }
    }
}

/// 1 − F(x) with F(x) = 15/x²·(3/x²·(sin x/x − cos x) − sin x/x).
///
/// F tends to 1 as x → 0 and the closed form cancels badly there, so small
/// arguments use the series x²/14 − x⁴/504 + x⁶/33264 − x⁸/3459456.
fn phase_spread_deficit(x: f64) -> f64 {
    let x2 = x * x;
    if x.abs() < 0.1 {
        return x2 / 14.0 * (1.0 - x2 / 36.0 * (1.0 - x2 / 66.0 * (1.0 - x2 / 104.0)));
    }
    let sinc = x.sin() / x;
    1.0 - 15.0 / x2 * (3.0 / x2 * (sinc - x.cos()) - sinc)
}

/// Widen the slope variances of `sigma` for the RF defocusing seen across a
/// finite bunch phase spread.
pub fn rf_emittance_growth(sigma: &Array2<f64>, inp: &EmittanceGrowthInput) -> Array2<f64> {
    let (sin_s, cos_s) = inp.sync_phase.sin_cos();
    if cos_s.abs() < 1e-12 || inp.ion_z == 0.0 {
        return sigma.clone();
    }
    let delta_phi = sigma[[PS_S, PS_S]].max(0.0).sqrt();
    if delta_phi == 0.0 {
        return sigma.clone();
    }
    let e0tl = inp.energy_gain / cos_s / inp.ion_z;
    // ½(1 − cos2φs·F(2Δφ)) − (sin φs·F(Δφ))², expanded in the deficits
    let d1 = phase_spread_deficit(delta_phi);
    let d2 = phase_spread_deficit(2.0 * delta_phi);
    let cos_2s = cos_s * cos_s - sin_s * sin_s;
    let spread = 0.5 * d1 * (2.0 - d1) + 0.5 * cos_2s * (d2 - 2.0 * d1 + d1 * d1);

    let b2g = inp.beta_avg * inp.beta_avg * inp.gamma_avg;
    let kp_x = -PI * inp.ion_z.abs() * e0tl / inp.lambda / (b2g * inp.ion_es) * sin_s;

    let widen = |delta: f64, var: f64| -> f64 {
        if var > 0.0 && delta + var > 0.0 {
            ((delta + var) / var).sqrt()
        } else {
            1.0
        }
    };
    let x_fac = widen(kp_x * kp_x * spread * (inp.x2 + inp.x0 * inp.x0), sigma[[PS_PX, PS_PX]]);
    let y_fac = widen(kp_x * kp_x * spread * (inp.y2 + inp.y0 * inp.y0), sigma[[PS_PY, PS_PY]]);

    let ion_k = 2.0 * PI / (inp.beta_avg * inp.lambda);
    let ave_z2 = delta_phi * delta_phi / (ion_k * ion_k);
    let kp_z = -2.0 * kp_x * inp.gamma_avg * inp.gamma_avg;
    let dz_p2 = (kp_z * delta_phi).powi(2)
        * ave_z2
        * (cos_s * cos_s / 8.0 + delta_phi * sin_s / 576.0);
    let long_trans = MEV_TO_EV / (b2g * inp.ion_es);
    let var_z = sigma[[PS_PS, PS_PS]] * long_trans * long_trans;
    let z_fac = widen(dz_p2, var_z);

    let mut out = sigma.clone();
    for (axis, fac) in [(PS_PX, x_fac), (PS_PY, y_fac), (PS_PS, z_fac)] {
        for k in 0..PS_QQ {
            out[[axis, k]] *= fac;
            out[[k, axis]] *= fac;
        }
    }
    out
}

/// Applies cached transfer maps to the moments of every charge state.
#[derive(Debug, Clone, Copy)]
pub struct MomentPropagator {
    pub emittance_growth: bool,
    pub sync_phase: f64,
    pub lambda: f64,
}

impl MomentPropagator {
    pub fn propagate(&self, state: &mut MomentState, cache: &CavityCache) -> BeamResult<()> {
        let n = state.size();
        cache.check_consistency(n)?;
        if state.moment0.len() != n || state.moment1.len() != n {
            return Err(BeamError::Configuration(format!(
                "moment count mismatch: {n} charge states, {} / {} moments",
                state.moment0.len(),
                state.moment1.len()
            )));
        }

        for i in 0..n {
            let transfer = &cache.transfer()[i];
            let misalign = &cache.misalign()[i];
            let inverse = &cache.misalign_inverse()[i];

            let local0 = misalign.dot(&state.moment0[i]);
            let x2 = state.moment1[i][[PS_X, PS_X]];
            let y2 = state.moment1[i][[PS_Y, PS_Y]];

            let mut out0 = transfer.dot(&local0);
            out0[PS_S] = state.real[i].phis - state.ref_ion.phis;
            out0[PS_PS] = (state.real[i].ion_ek - state.ref_ion.ion_ek) / MEV_TO_EV;
            state.moment0[i] = inverse.dot(&out0);

            let mut sigma = congruence(transfer, &congruence(misalign, &state.moment1[i]));
            if self.emittance_growth {
                if let (Some(before), Some(after)) = (cache.real_in().get(i), cache.real_out().get(i)) {
                    let mut inp = EmittanceGrowthInput::new(
                        &state.ref_ion,
                        before,
                        after,
                        self.lambda,
                        self.sync_phase,
                    );
                    inp.x2 = x2;
                    inp.y2 = y2;
                    inp.x0 = local0[PS_X];
                    inp.y0 = local0[PS_Y];
                    sigma = rf_emittance_growth(&sigma, &inp);
                }
            }
            state.moment1[i] = congruence(inverse, &sigma);
        }
        Ok(())
    }
}

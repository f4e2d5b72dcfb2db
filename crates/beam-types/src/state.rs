// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — State
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{PS_DIM, SAMPLE_LAMBDA_M};
use crate::error::{BeamError, BeamResult};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Kinematic state of one ion species (the reference ion or a charge state).
///
/// Energies are per nucleon in eV. `phis` is the absolute phase at the
/// sampling frequency, so it keeps accumulating along the whole beamline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleState {
    /// Charge-to-mass ratio Q/A.
    pub ion_z: f64,
    /// Macro charge weight used for the envelope average.
    pub ion_q: f64,
    /// Rest energy [eV/u].
    pub ion_es: f64,
    /// Total energy [eV/u].
    pub ion_w: f64,
    /// Kinetic energy [eV/u].
    pub ion_ek: f64,
    pub gamma: f64,
    pub beta: f64,
    /// beta * gamma
    pub bg: f64,
    /// 2π/(β λ_sample) [1/m].
    pub sample_ion_k: f64,
    /// Absolute phase [rad].
    pub phis: f64,
}

impl ParticleState {
    pub fn new(ion_z: f64, ion_q: f64, ion_es: f64, ion_ek: f64) -> BeamResult<Self> {
        if !ion_z.is_finite() || ion_z == 0.0 {
            return Err(BeamError::Configuration(format!(
                "ion charge-to-mass ratio must be finite and non-zero, got {ion_z}"
            )));
        }
        if !ion_q.is_finite() || ion_q < 0.0 {
            return Err(BeamError::Configuration(format!(
                "ion charge weight must be finite and >= 0, got {ion_q}"
            )));
        }
        if !ion_es.is_finite() || ion_es <= 0.0 {
            return Err(BeamError::Configuration(format!(
                "ion rest energy must be finite and > 0, got {ion_es}"
            )));
        }
        if !ion_ek.is_finite() || ion_ek < 0.0 {
            return Err(BeamError::Configuration(format!(
                "ion kinetic energy must be finite and >= 0, got {ion_ek}"
            )));
        }
        let mut particle = ParticleState {
            ion_z,
            ion_q,
            ion_es,
            ion_w: 0.0,
            ion_ek,
            gamma: 1.0,
            beta: 0.0,
            bg: 0.0,
            sample_ion_k: 0.0,
            phis: 0.0,
        };
        particle.recalc();
        Ok(particle)
    }

    /// Re-derive W, γ, β, βγ and the sampling wavenumber from `ion_ek`.
    pub fn recalc(&mut self) {
        self.ion_w = self.ion_ek + self.ion_es;
        self.gamma = if self.ion_es != 0.0 {
            self.ion_w / self.ion_es
        } else {
            1.0
        };
        self.beta = (1.0 - 1.0 / (self.gamma * self.gamma)).sqrt();
        self.bg = if self.beta != 0.0 {
            self.beta * self.gamma
        } else {
            1.0
        };
        self.sample_ion_k = 2.0 * PI / (self.beta * SAMPLE_LAMBDA_M);
    }
}

/// Beam state owned by the beamline driver and updated in place by elements.
///
/// `moment0[i]` / `moment1[i]` are the centroid and covariance of charge
/// state `real[i]`; the `_env` fields are their charge-weighted combination.
#[derive(Debug, Clone)]
pub struct MomentState {
    pub ref_ion: ParticleState,
    pub real: Vec<ParticleState>,
    pub moment0: Vec<Array1<f64>>,
    pub moment1: Vec<Array2<f64>>,
    pub moment0_env: Array1<f64>,
    pub moment1_env: Array2<f64>,
    pub moment0_rms: Array1<f64>,
    /// Cumulative path length [m].
    pub pos: f64,
    /// Driven phase of the last RF cavity passed [deg].
    pub last_cavity_phase_deg: f64,
}

impl MomentState {
    pub fn new(
        ref_ion: ParticleState,
        real: Vec<ParticleState>,
        moment0: Vec<Array1<f64>>,
        moment1: Vec<Array2<f64>>,
    ) -> BeamResult<Self> {
        if real.is_empty() {
            return Err(BeamError::Configuration(
                "moment state needs at least one charge state".to_string(),
            ));
        }
        if moment0.len() != real.len() || moment1.len() != real.len() {
            return Err(BeamError::Configuration(format!(
                "moment count mismatch: {} charge states, {} first moments, {} second moments",
                real.len(),
                moment0.len(),
                moment1.len()
            )));
        }
        for (i, (m0, m1)) in moment0.iter().zip(moment1.iter()).enumerate() {
            if m0.len() != PS_DIM || m1.dim() != (PS_DIM, PS_DIM) {
                return Err(BeamError::Configuration(format!(
                    "charge state {i}: moments must be {PS_DIM} / {PS_DIM}x{PS_DIM}, got {} / {:?}",
                    m0.len(),
                    m1.dim()
                )));
            }
        }

        let mut state = MomentState {
            ref_ion,
            real,
            moment0,
            moment1,
            moment0_env: Array1::zeros(PS_DIM),
            moment1_env: Array2::zeros((PS_DIM, PS_DIM)),
            moment0_rms: Array1::zeros(PS_DIM),
            pos: 0.0,
            last_cavity_phase_deg: 0.0,
        };
        state.recalc();
        state.calc_rms();
        Ok(state)
    }

    /// Number of tracked charge states.
    pub fn size(&self) -> usize {
        self.real.len()
    }

    pub fn recalc(&mut self) {
        self.ref_ion.recalc();
        for particle in self.real.iter_mut() {
            particle.recalc();
        }
    }

    /// Rebuild the charge-weighted envelope and rms sizes.
    ///
    /// The envelope covariance adds the spread of the per-state centroids
    /// around the weighted mean. A bunch with no charge weight is averaged
    /// with equal weights.
    pub fn calc_rms(&mut self) {
        let total_q: f64 = self.real.iter().map(|p| p.ion_q).sum();
        let weights: Vec<f64> = if total_q > 0.0 {
            self.real.iter().map(|p| p.ion_q / total_q).collect()
        } else {
            vec![1.0 / self.real.len() as f64; self.real.len()]
        };

        let mut env0: Array1<f64> = Array1::zeros(PS_DIM);
        for (m0, &w) in self.moment0.iter().zip(weights.iter()) {
            env0.scaled_add(w, m0);
        }

        let mut env1: Array2<f64> = Array2::zeros((PS_DIM, PS_DIM));
        for ((m0, m1), &w) in self
            .moment0
            .iter()
            .zip(self.moment1.iter())
            .zip(weights.iter())
        {
            let d = m0 - &env0;
            for j in 0..PS_DIM {
                for k in 0..PS_DIM {
                    env1[[j, k]] += w * (m1[[j, k]] + d[j] * d[k]);
                }
            }
        }

        self.moment0_rms = Array1::from_shape_fn(PS_DIM, |j| env1[[j, j]].max(0.0).sqrt());
        self.moment0_env = env0;
        self.moment1_env = env1;
    }
}

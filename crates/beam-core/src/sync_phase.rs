// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Synchronous Phase Models
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Mapping between the requested synchronous phase φs and the driven
//! (cavity) phase φd.
//!
//! Sinusoidal fit: the offset is a sum of exponentials in the reference
//! kinetic energy Ek [MeV/u], in degrees,
//!
//!   φs = φd + h·φ_ref + Σ aᵢ exp(bᵢ Ek)
//!
//! Complex peak-base fit: three shapes (base, peak, centre), each
//! c₀ + c₁·Ek + c₂·N + c₃·Ek·N in degrees with N = Z·scale/RefNrm,
//!
//!   φs = φd + h·φ_ref + base + peak·cos(φd − centre)
//!
//! The sinusoidal form inverts in closed form; the complex form is solved
//! with Newton iteration and retried once from a second starting point.

use beam_math::fit::exp_sum;
use beam_math::roots::{newton_solve, NewtonConfig};
use beam_types::config::{CavityConfig, SYNC_COMPLEX_LEN};
use beam_types::constants::MEV_TO_EV;
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::ParticleState;
use log::warn;
use std::f64::consts::{PI, TAU};

#[derive(Debug, Clone, PartialEq)]
pub enum SyncPhaseModel {
    Sinusoidal { pairs: Vec<f64> },
    Complex { coeffs: [f64; SYNC_COMPLEX_LEN], ref_nrm: f64 },
}

/// Validity window of the phase fit.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ValidityLimits {
    /// Kinetic energy [MeV/u].
    pub ek: Option<[f64; 2]>,
    pub nrm: Option<[f64; 2]>,
}

impl ValidityLimits {
    fn from_config(cfg: &CavityConfig) -> BeamResult<Self> {
        let pair = |label: &str, v: &Option<Vec<f64>>| match v.as_deref() {
            None => Ok(None),
            Some(&[lo, hi]) => Ok(Some([lo, hi])),
            Some(other) => Err(BeamError::Configuration(format!(
                "{label} must hold exactly 2 values [min, max], got {}",
                other.len()
            ))),
        };
        Ok(ValidityLimits {
            ek: pair("EkLim", &cfg.ek_limits)?,
            nrm: pair("NrLim", &cfg.nrm_limits)?,
        })
    }

    pub fn check_energy(&self, ek_mev: f64) -> BeamResult<()> {
        match self.ek {
            Some([lo, hi]) if !(lo..=hi).contains(&ek_mev) => Err(BeamError::DataRange(format!(
                "kinetic energy {ek_mev} MeV/u outside fit range [{lo}, {hi}]"
            ))),
            _ => Ok(()),
        }
    }

    pub fn check_nrm(&self, nrm: f64) -> BeamResult<()> {
        match self.nrm {
            Some([lo, hi]) if !(lo..=hi).contains(&nrm) => Err(BeamError::DataRange(format!(
                "normalized field {nrm} outside fit range [{lo}, {hi}]"
            ))),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncPhaseSolver {
    model: SyncPhaseModel,
    limits: ValidityLimits,
    harmonic: f64,
    field_scale: f64,
    newton: NewtonConfig,
}

/// Base, peak and centre of the complex fit [rad].
#[derive(Debug, Clone, Copy)]
struct PeakBase {
    base: f64,
    peak: f64,
    centre: f64,
}

impl SyncPhaseSolver {
    pub fn from_config(cfg: &CavityConfig) -> BeamResult<Self> {
        let model = match &cfg.sync_complex {
            Some(p) => {
                let mut coeffs = [0.0; SYNC_COMPLEX_LEN];
                if p.len() != SYNC_COMPLEX_LEN {
                    return Err(BeamError::Configuration(format!(
                        "SynComplex must hold {SYNC_COMPLEX_LEN} coefficients, got {}",
                        p.len()
                    )));
                }
                coeffs.copy_from_slice(p);
                let ref_nrm = cfg.ref_nrm.ok_or_else(|| {
                    BeamError::Configuration("SynComplex requires RefNrm".to_string())
                })?;
                SyncPhaseModel::Complex { coeffs, ref_nrm }
            }
            None => SyncPhaseModel::Sinusoidal {
                pairs: cfg.sync_fit.clone(),
            },
        };
        Ok(SyncPhaseSolver {
            model,
            limits: ValidityLimits::from_config(cfg)?,
            harmonic: cfg.harmonic(),
            field_scale: cfg.field_scale,
            newton: NewtonConfig::default(),
        })
    }

    /// Replace the Newton settings of the complex-fit inversion.
    pub fn with_newton(mut self, newton: NewtonConfig) -> Self {
        self.newton = newton;
        self
    }

    pub fn model(&self) -> &SyncPhaseModel {
        &self.model
    }

    pub fn limits(&self) -> &ValidityLimits {
        &self.limits
    }

    fn reference_ek(&self, reference: &ParticleState) -> BeamResult<f64> {
        let ek = reference.ion_ek / MEV_TO_EV;
        self.limits.check_energy(ek)?;
        Ok(ek)
    }

    fn peak_base(&self, coeffs: &[f64; SYNC_COMPLEX_LEN], ref_nrm: f64, ion_z: f64, ek: f64) -> BeamResult<PeakBase> {
        let nrm = ion_z * self.field_scale / ref_nrm;
        self.limits.check_nrm(nrm)?;
        let shape = |j: usize| {
            let c = &coeffs[4 * j..4 * j + 4];
            (c[0] + c[1] * ek + c[2] * nrm + c[3] * ek * nrm).to_radians()
        };
        Ok(PeakBase {
            base: shape(0),
            peak: shape(1),
            centre: shape(2),
        })
    }

    /// Synchronous phase produced by driven phase `driven` [rad].
    pub fn synchronous_phase(&self, reference: &ParticleState, driven: f64) -> BeamResult<f64> {
        let ek = self.reference_ek(reference)?;
        let carrier = self.harmonic * reference.phis;
        match &self.model {
            SyncPhaseModel::Sinusoidal { pairs } => {
                Ok(driven + carrier + exp_sum(ek, pairs).to_radians())
            }
            SyncPhaseModel::Complex { coeffs, ref_nrm } => {
                let pb = self.peak_base(coeffs, *ref_nrm, reference.ion_z, ek)?;
                Ok(driven + carrier + pb.base + pb.peak * (driven - pb.centre).cos())
            }
        }
    }

    /// Driven phase [rad] that yields synchronous phase `sync_phase` for
    /// the reference ion.
    pub fn driven_phase(&self, reference: &ParticleState, sync_phase: f64) -> BeamResult<f64> {
        let ek = self.reference_ek(reference)?;
        let carrier = self.harmonic * reference.phis;
        match &self.model {
            SyncPhaseModel::Sinusoidal { pairs } => {
                Ok(sync_phase - exp_sum(ek, pairs).to_radians() - carrier)
            }
            SyncPhaseModel::Complex { coeffs, ref_nrm } => {
                let pb = self.peak_base(coeffs, *ref_nrm, reference.ion_z, ek)?;
                // Solve for the correction d in φd = φs − h·φ_ref + d with the
                // cosine argument reduced, so large accumulated phases do not
                // swamp the tolerance.
                let anchor = sync_phase - carrier;
                let theta = (anchor - pb.centre).rem_euclid(TAU);
                let f = |d: f64| d + pb.base + pb.peak * (theta + d).cos();
                let df = |d: f64| 1.0 - pb.peak * (theta + d).sin();

                let guess = -pb.base - pb.peak * (theta - pb.base).cos();
                Ok(anchor + solve_with_retry(f, df, guess, &self.newton)?)
            }
        }
    }
}

/// Newton from `guess`, then once more from `guess + π` if that fails.
fn solve_with_retry<F, D>(f: F, df: D, guess: f64, cfg: &NewtonConfig) -> BeamResult<f64>
where
    F: Fn(f64) -> f64,
    D: Fn(f64) -> f64,
{
    match newton_solve(&f, &df, guess, cfg) {
        Ok(res) => Ok(res.root),
        Err(err) => {
            warn!("driven phase solve failed ({err}); retrying from shifted guess");
            newton_solve(&f, &df, guess + PI, cfg).map(|res| res.root)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Phase/Energy Gap Integrator
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Gap-by-gap integration of phase and energy through a cavity.
//!
//! The integrator is an explicit state machine, `BeforeGap → InGap →
//! AfterGap` per gap and `Done` after the last one. Every completed gap
//! leaves a [`GapRecord`] that the transfer-matrix builder consumes.
//!
//! For gap i the ion wavenumber is the midpoint of a linear ramp from the
//! entrance wavenumber to the wavenumber at the (already known) exit
//! energy. With ψ = φ₀ + k·Ecen:
//!
//!   W_f = W₀ + Z·V₀·(T cos ψ − S sin ψ)
//!   φ_f = ψ + k_f·(dis − Ecen) + Z·V₀·k·(Tp sin ψ + Sp cos ψ) / (2(W₀ − Es))

use crate::transit::{GapParameters, GapTransitModel};
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::ParticleState;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapStage {
    BeforeGap(usize),
    InGap(usize),
    AfterGap(usize),
    Done,
}

/// Outcome of one gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GapRecord {
    pub gap: usize,
    pub params: GapParameters,
    /// Ion wavenumber used inside the gap [1/m].
    pub ion_k: f64,
    /// Total energy before / after the gap [eV/u].
    pub w_in: f64,
    pub w_out: f64,
    /// RF phase at segment entrance, at the field centre, at segment exit.
    pub phase_in: f64,
    pub phase_center: f64,
    pub phase_out: f64,
    /// Phase slip from the Tp/Sp terms [rad].
    pub phase_slip: f64,
}

/// Integrated passage of one ion through all gaps.
#[derive(Debug, Clone, PartialEq)]
pub struct GapTrajectory {
    pub records: Vec<GapRecord>,
    /// β at the entrance and after each gap (`gap_count + 1` values).
    pub beta: Vec<f64>,
    pub gamma: Vec<f64>,
    pub gap_length: f64,
    pub lambda: f64,
}

impl GapTrajectory {
    pub fn gap_count(&self) -> usize {
        self.records.len()
    }

    pub fn w_out(&self) -> Option<f64> {
        self.records.last().map(|r| r.w_out)
    }

    pub fn phase_out(&self) -> Option<f64> {
        self.records.last().map(|r| r.phase_out)
    }

    /// βγ at boundary `i` (0 = entrance).
    pub fn bg(&self, i: usize) -> f64 {
        self.beta[i] * self.gamma[i]
    }
}

#[derive(Debug, Clone, Copy)]
struct PendingGap {
    params: GapParameters,
    ion_k: f64,
    phase_center: f64,
    w_out: f64,
}

/// Explicit state machine over the gaps of one cavity.
pub struct PhaseEnergyIntegrator<'a, M: GapTransitModel> {
    model: &'a M,
    ion_z: f64,
    ion_es: f64,
    lambda: f64,
    field_scale: f64,
    gap_length: f64,
    k_entry: f64,
    k_exit: f64,
    stage: GapStage,
    w: f64,
    phase: f64,
    pending: Option<PendingGap>,
    records: Vec<GapRecord>,
    beta: Vec<f64>,
    gamma: Vec<f64>,
}

impl<'a, M: GapTransitModel> PhaseEnergyIntegrator<'a, M> {
    /// Start at the cavity entrance.
    ///
    /// `w_exit` is the exit energy from the field-table boost; it fixes the
    /// end point of the wavenumber ramp.
    pub fn new(
        model: &'a M,
        particle: &ParticleState,
        w_in: f64,
        phase_in: f64,
        w_exit: f64,
        lambda: f64,
        field_scale: f64,
    ) -> BeamResult<Self> {
        let gaps = model.gap_count();
        if gaps == 0 {
            return Err(BeamError::Configuration(
                "transit model has no gaps".to_string(),
            ));
        }
        let (beta_in, gamma_in) = kinematics(w_in, particle.ion_es)?;
        let (beta_out, _) = kinematics(w_exit, particle.ion_es)?;
        let mut beta = Vec::with_capacity(gaps + 1);
        let mut gamma = Vec::with_capacity(gaps + 1);
        beta.push(beta_in);
        gamma.push(gamma_in);
        Ok(PhaseEnergyIntegrator {
            model,
            ion_z: particle.ion_z,
            ion_es: particle.ion_es,
            lambda,
            field_scale,
            gap_length: model.gap_length(),
            k_entry: 2.0 * PI / (beta_in * lambda),
            k_exit: 2.0 * PI / (beta_out * lambda),
            stage: GapStage::BeforeGap(0),
            w: w_in,
            phase: phase_in,
            pending: None,
            records: Vec::with_capacity(gaps),
            beta,
            gamma,
        })
    }

    pub fn stage(&self) -> GapStage {
        self.stage
    }

    pub fn records(&self) -> &[GapRecord] {
        &self.records
    }

    fn ramp_k(&self, gap: usize) -> f64 {
        let n = self.model.gap_count() as f64;
        let at = |j: f64| self.k_entry + (self.k_exit - self.k_entry) * j / n;
        0.5 * (at(gap as f64) + at(gap as f64 + 1.0))
    }

    fn take_pending(&mut self, gap: usize) -> BeamResult<PendingGap> {
        self.pending.take().ok_or_else(|| {
            BeamError::Configuration(format!("gap {gap}: integrator stage out of order"))
        })
    }

    /// Advance one stage.
    pub fn step(&mut self) -> BeamResult<GapStage> {
        self.stage = match self.stage {
            GapStage::BeforeGap(gap) => {
                let ion_k = self.ramp_k(gap);
                let beta = self.beta[self.beta.len() - 1];
                let params = self
                    .model
                    .transit_factors(gap, beta, ion_k, self.field_scale)?;
                self.pending = Some(PendingGap {
                    params,
                    ion_k,
                    phase_center: 0.0,
                    w_out: 0.0,
                });
                GapStage::InGap(gap)
            }
            GapStage::InGap(gap) => {
                let mut pending = self.take_pending(gap)?;
                let p = pending.params;
                let psi = self.phase + pending.ion_k * p.ecen;
                let w_out = self.w + self.ion_z * p.v0 * (p.t * psi.cos() - p.s * psi.sin());
                if !w_out.is_finite() || w_out <= self.ion_es {
                    return Err(BeamError::DataRange(format!(
                        "ion brought to rest in gap {gap} (W = {w_out:e} eV/u)"
                    )));
                }
                pending.phase_center = psi;
                pending.w_out = w_out;
                self.pending = Some(pending);
                GapStage::AfterGap(gap)
            }
            GapStage::AfterGap(gap) => {
                let pending = self.take_pending(gap)?;
                let p = pending.params;
                let psi = pending.phase_center;
                let (beta_out, gamma_out) = kinematics(pending.w_out, self.ion_es)?;
                let k_out = 2.0 * PI / (beta_out * self.lambda);
                let slip = self.ion_z * p.v0 * pending.ion_k * (p.tp * psi.sin() + p.sp * psi.cos())
                    / (2.0 * (self.w - self.ion_es));
                let phase_out = psi + k_out * (self.gap_length - p.ecen) + slip;

                self.records.push(GapRecord {
                    gap,
                    params: p,
                    ion_k: pending.ion_k,
                    w_in: self.w,
                    w_out: pending.w_out,
                    phase_in: self.phase,
                    phase_center: psi,
                    phase_out,
                    phase_slip: slip,
                });
                self.beta.push(beta_out);
                self.gamma.push(gamma_out);
                self.w = pending.w_out;
                self.phase = phase_out;

                if gap + 1 < self.model.gap_count() {
                    GapStage::BeforeGap(gap + 1)
                } else {
                    GapStage::Done
                }
            }
            GapStage::Done => GapStage::Done,
        };
        Ok(self.stage)
    }

    /// Run to `Done` and hand back the trajectory.
    pub fn run(mut self) -> BeamResult<GapTrajectory> {
        while self.step()? != GapStage::Done {}
        Ok(GapTrajectory {
            records: self.records,
            beta: self.beta,
            gamma: self.gamma,
            gap_length: self.gap_length,
            lambda: self.lambda,
        })
    }
}

/// (β, γ) at total energy `w`.
fn kinematics(w: f64, es: f64) -> BeamResult<(f64, f64)> {
    if !w.is_finite() || w <= es {
        return Err(BeamError::DataRange(format!(
            "total energy {w:e} eV/u not above rest energy {es:e} eV/u"
        )));
    }
    let gamma = w / es;
    Ok(((1.0 - 1.0 / (gamma * gamma)).sqrt(), gamma))
}

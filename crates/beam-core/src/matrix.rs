// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Cavity Transfer Matrix
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! 7×7 transfer matrix of one charge state through the cavity.
//!
//! Longitudinal block (φ, ΔW): drift / gap-kick products over the gaps.
//! Transverse block: either a generic thin-lens focusing model at each gap
//! or the element-by-element thin-lens lattice when one is loaded.

use crate::integrator::GapTrajectory;
use crate::lattice::{LineEntry, LineTable, ThinLensElement, ThinLensKind};
use crate::transit::GapTransitModel;
use beam_types::constants::{
    C0, MEV_TO_EV, MU0, PS_DIM, PS_PS, PS_PX, PS_PY, PS_QQ, PS_S, PS_X, PS_Y,
};
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::ParticleState;
use ndarray::Array2;
use std::f64::consts::{FRAC_PI_2, PI};

/// Field-free drift of length `length` in both transverse planes.
pub fn drift_matrix(length: f64) -> Array2<f64> {
    let mut m: Array2<f64> = Array2::eye(PS_DIM);
    m[[PS_X, PS_PX]] = length;
    m[[PS_Y, PS_PY]] = length;
    m
}

/// Adiabatic damping βγ_in/βγ_out of both transverse slopes.
fn damping_matrix(ratio: f64) -> Array2<f64> {
    let mut m: Array2<f64> = Array2::eye(PS_DIM);
    m[[PS_PX, PS_PX]] = ratio;
    m[[PS_PY, PS_PY]] = ratio;
    m
}

type Block2 = [[f64; 2]; 2];

fn mul2(a: &Block2, b: &Block2) -> Block2 {
    [
        [
            a[0][0] * b[0][0] + a[0][1] * b[1][0],
            a[0][0] * b[0][1] + a[0][1] * b[1][1],
        ],
        [
            a[1][0] * b[0][0] + a[1][1] * b[1][0],
            a[1][0] * b[0][1] + a[1][1] * b[1][1],
        ],
    ]
}

/// Builds transfer matrices for one cavity.
pub struct TransferMatrixBuilder<'a, M: GapTransitModel> {
    model: &'a M,
    lattice: &'a [ThinLensElement],
    lattice_start: f64,
    aperture: f64,
    multipole_level: u32,
    field_scale: f64,
}

impl<'a, M: GapTransitModel> TransferMatrixBuilder<'a, M> {
    pub fn new(
        model: &'a M,
        lattice: &'a [ThinLensElement],
        lattice_start: f64,
        aperture: f64,
        multipole_level: u32,
        field_scale: f64,
    ) -> Self {
        TransferMatrixBuilder {
            model,
            lattice,
            lattice_start,
            aperture,
            multipole_level,
            field_scale,
        }
    }

    /// Full 7×7 map for `particle` along `trajectory`. `line` is refilled
    /// with the walked lattice rows (left empty on the generic path).
    pub fn build(
        &self,
        particle: &ParticleState,
        trajectory: &GapTrajectory,
        line: &mut LineTable,
    ) -> BeamResult<Array2<f64>> {
        if trajectory.gap_count() != self.model.gap_count() {
            return Err(BeamError::Configuration(format!(
                "trajectory covers {} gaps, model has {}",
                trajectory.gap_count(),
                self.model.gap_count()
            )));
        }
        line.clear();
        let mut m = if self.lattice.is_empty() {
            self.transverse_generic(particle, trajectory)
        } else {
            self.transverse_lattice(particle, trajectory, line)?
        };
        let lon = self.longitudinal(particle, trajectory);
        m[[PS_S, PS_S]] = lon[0][0];
        m[[PS_S, PS_PS]] = lon[0][1];
        m[[PS_PS, PS_S]] = lon[1][0];
        m[[PS_PS, PS_PS]] = lon[1][1];
        Ok(m)
    }

    /// Drift lengths between field centres: first, interior, last.
    fn drift_lengths(&self, trajectory: &GapTrajectory) -> Vec<f64> {
        let dis = trajectory.gap_length;
        let recs = &trajectory.records;
        let n = recs.len();
        let mut lengths = Vec::with_capacity(n + 1);
        lengths.push(recs[0].params.ecen);
        for i in 1..n {
            lengths.push((dis - recs[i - 1].params.ecen) + recs[i].params.ecen);
        }
        lengths.push(dis - recs[n - 1].params.ecen);
        lengths
    }

    /// (φ, ΔW[MeV/u]) block.
    pub fn longitudinal(&self, particle: &ParticleState, trajectory: &GapTrajectory) -> Block2 {
        let es = particle.ion_es;
        let z = particle.ion_z;
        let lambda = trajectory.lambda;
        let drift = |length: f64, i: usize| -> Block2 {
            let bg3 = (trajectory.beta[i] * trajectory.gamma[i]).powi(3);
            [[1.0, -2.0 * PI / lambda * length * MEV_TO_EV / (es * bg3)], [0.0, 1.0]]
        };

        let lengths = self.drift_lengths(trajectory);
        let mut lon: Block2 = [[1.0, 0.0], [0.0, 1.0]];
        for (i, rec) in trajectory.records.iter().enumerate() {
            lon = mul2(&drift(lengths[i], i), &lon);
            let p = rec.params;
            let psi = rec.phase_center;
            let kick: Block2 = [
                [
                    1.0 + z * p.v0 * rec.ion_k * (p.tp * psi.cos() - p.sp * psi.sin())
                        / (2.0 * (rec.w_in - es)),
                    0.0,
                ],
                [-z * p.v0 * (p.t * psi.sin() + p.s * psi.cos()) / MEV_TO_EV, 1.0],
            ];
            lon = mul2(&kick, &lon);
        }
        let n = trajectory.records.len();
        mul2(&drift(lengths[n], n), &lon)
    }

    /// Drift, focusing kick, damping and drift per gap.
    fn transverse_generic(&self, particle: &ParticleState, trajectory: &GapTrajectory) -> Array2<f64> {
        let es = particle.ion_es;
        let z = particle.ion_z;
        let lengths = self.drift_lengths(trajectory);
        let mut mt: Array2<f64> = Array2::eye(PS_DIM);

        for (i, rec) in trajectory.records.iter().enumerate() {
            mt = drift_matrix(lengths[i]).dot(&mt);

            let beta_avg = 0.5 * (trajectory.beta[i] + trajectory.beta[i + 1]);
            let gamma_avg = 0.5 * (trajectory.gamma[i] + trajectory.gamma[i + 1]);
            let p = rec.params;
            let psi = rec.phase_center;
            let kf = -PI * z * p.v0 * (p.t * psi.sin() + p.s * psi.cos())
                / (es * beta_avg * beta_avg * gamma_avg * trajectory.lambda);
            let mut kick: Array2<f64> = Array2::eye(PS_DIM);
            kick[[PS_PX, PS_X]] = kf;
            kick[[PS_PY, PS_Y]] = kf;
            mt = kick.dot(&mt);

            mt = damping_matrix(trajectory.bg(i) / trajectory.bg(i + 1)).dot(&mt);
        }
        drift_matrix(lengths[trajectory.records.len()]).dot(&mt)
    }

    /// Element-by-element walk of the thin-lens lattice.
    fn transverse_lattice(
        &self,
        particle: &ParticleState,
        trajectory: &GapTrajectory,
        line: &mut LineTable,
    ) -> BeamResult<Array2<f64>> {
        let es = particle.ion_es;
        let z = particle.ion_z;
        let lambda = trajectory.lambda;
        let n = trajectory.records.len();

        let mut mt: Array2<f64> = Array2::eye(PS_DIM);
        let mut gap = 0;
        let mut s = self.lattice_start;
        let mut phase = trajectory.records[0].phase_in;
        let mut ion_k = 2.0 * PI / (trajectory.beta[0] * lambda);
        let (mut beta, mut gamma) = (trajectory.beta[0], trajectory.gamma[0]);

        for row in self.lattice {
            let kind = row.kind()?;
            if row.length > 0.0 {
                phase += ion_k * row.length;
                mt = drift_matrix(row.length).dot(&mt);
            }
            s += row.length;

            let mut entry = LineEntry {
                s,
                kind,
                e0: row.e0 * self.field_scale,
                t: 0.0,
                s_factor: 0.0,
                accel: 1.0,
            };

            match kind {
                ThinLensKind::Drift => {}
                ThinLensKind::AccGap => {
                    if gap >= n {
                        return Err(BeamError::Configuration(format!(
                            "lattice has more AccGap rows than the {n} gaps integrated"
                        )));
                    }
                    let accel = trajectory.bg(gap) / trajectory.bg(gap + 1);
                    mt = damping_matrix(accel).dot(&mt);
                    let rec = &trajectory.records[gap];
                    entry.t = rec.params.t;
                    entry.s_factor = rec.params.s;
                    entry.accel = accel;
                    // resync to the integrated gap-centre phase
                    phase = rec.phase_center;
                    gap += 1;
                    beta = trajectory.beta[gap];
                    gamma = trajectory.gamma[gap];
                    ion_k = 2.0 * PI / (beta * lambda);
                }
                _ if self.multipole_level >= kind.required_level() => {
                    let (t, sf) = self.model.multipole_factors(row, s, ion_k)?;
                    entry.t = t;
                    entry.s_factor = sf;
                    let rm = if row.aperture > 0.0 { row.aperture } else { self.aperture };
                    let kick = multipole_kick(kind, z, es, beta, gamma, entry.e0, t, sf, phase, rm);
                    mt = kick.dot(&mt);
                }
                _ => {}
            }
            line.push(entry);
        }

        if gap != n {
            return Err(BeamError::Configuration(format!(
                "lattice has {gap} AccGap rows for {n} integrated gaps"
            )));
        }
        Ok(mt)
    }
}

/// Thin multipole kick. Electric terms use g = Z·E0/(β²γ·Es); magnetic
/// terms use the field a quarter period later.
#[allow(clippy::too_many_arguments)]
fn multipole_kick(
    kind: ThinLensKind,
    z: f64,
    es: f64,
    beta: f64,
    gamma: f64,
    e0: f64,
    t: f64,
    s: f64,
    phase: f64,
    aperture: f64,
) -> Array2<f64> {
    let mut m: Array2<f64> = Array2::eye(PS_DIM);
    let electric = z * e0 / (beta * beta * gamma * es) * (t * phase.cos() - s * phase.sin());
    let magnetic = -MU0 * C0 * z * e0 / (beta * gamma * es)
        * (t * (phase + FRAC_PI_2).cos() - s * (phase + FRAC_PI_2).sin());
    match kind {
        ThinLensKind::EFocus1 | ThinLensKind::EFocus2 => {
            m[[PS_PX, PS_X]] = electric / aperture;
            m[[PS_PY, PS_Y]] = electric / aperture;
        }
        ThinLensKind::EDipole => m[[PS_PY, PS_QQ]] = electric,
        ThinLensKind::EQuad => {
            m[[PS_PX, PS_X]] = electric / aperture;
            m[[PS_PY, PS_Y]] = -electric / aperture;
        }
        ThinLensKind::HMono => {
            m[[PS_PX, PS_X]] = magnetic / aperture;
            m[[PS_PY, PS_Y]] = magnetic / aperture;
        }
        ThinLensKind::HDipole => m[[PS_PY, PS_QQ]] = magnetic,
        ThinLensKind::HQuad => {
            m[[PS_PX, PS_X]] = magnetic / aperture;
            m[[PS_PY, PS_Y]] = -magnetic / aperture;
        }
        ThinLensKind::Drift | ThinLensKind::AccGap => {}
    }
    m
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Cavity Field Model
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! On-axis field data for RF cavities.
//!
//! A cavity is described by its sampled longitudinal field E(s), optionally a
//! thin-lens lattice, a multipole profile table and per-gap transit-factor
//! fits. The data are immutable once loaded and shared by every charge state
//! and every invocation of the element.

use crate::lattice::{ThinLensElement, ThinLensKind};
use beam_math::interp::{interp1d, trapz_weighted};
use beam_types::error::{BeamError, BeamResult};
use beam_types::state::ParticleState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::str::FromStr;

/// Relative tolerance for comparing lattice / table / element lengths.
const LENGTH_RTOL: f64 = 1e-6;

/// Cavity families with built-in fitted transit models, plus the generic
/// tabulated-field cavity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CavityType {
    Qwr041,
    Qwr085,
    Hwr029,
    Hwr053,
    Generic,
}

impl CavityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CavityType::Qwr041 => "0.041QWR",
            CavityType::Qwr085 => "0.085QWR",
            CavityType::Hwr029 => "0.29HWR",
            CavityType::Hwr053 => "0.53HWR",
            CavityType::Generic => "Generic",
        }
    }

    /// Built-in types carry fitted transit factors.
    pub fn is_builtin(&self) -> bool {
        !matches!(self, CavityType::Generic)
    }

    /// Aperture radius [m] used when the element does not set one.
    pub fn default_aperture(&self) -> Option<f64> {
        match self {
            CavityType::Qwr041 | CavityType::Qwr085 => Some(0.017),
            CavityType::Hwr029 | CavityType::Hwr053 => Some(0.020),
            CavityType::Generic => None,
        }
    }
}

impl FromStr for CavityType {
    type Err = BeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "0.041QWR" => Ok(CavityType::Qwr041),
            "0.085QWR" => Ok(CavityType::Qwr085),
            "0.29HWR" => Ok(CavityType::Hwr029),
            "0.53HWR" => Ok(CavityType::Hwr053),
            "Generic" => Ok(CavityType::Generic),
            other => Err(BeamError::Configuration(format!(
                "unknown cavity type '{other}'"
            ))),
        }
    }
}

/// Sampled on-axis longitudinal field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldTable {
    /// Longitudinal position [m], strictly increasing.
    pub s: Vec<f64>,
    /// Longitudinal electric field [V/m].
    pub e_long: Vec<f64>,
}

impl FieldTable {
    pub fn new(s: Vec<f64>, e_long: Vec<f64>) -> BeamResult<Self> {
        let table = FieldTable { s, e_long };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> BeamResult<()> {
        validate_axis("field table", &self.s)?;
        if self.e_long.len() != self.s.len() {
            return Err(BeamError::Configuration(format!(
                "field table length mismatch: s={}, Elong={}",
                self.s.len(),
                self.e_long.len()
            )));
        }
        if self.e_long.iter().any(|v| !v.is_finite()) {
            return Err(BeamError::Configuration(
                "field table contains non-finite field values".to_string(),
            ));
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.s.len()
    }

    pub fn is_empty(&self) -> bool {
        self.s.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.s[0]
    }

    pub fn end(&self) -> f64 {
        self.s[self.s.len() - 1]
    }

    pub fn span(&self) -> f64 {
        self.end() - self.start()
    }

    /// Interpolated E(s); positions outside the table are errors.
    pub fn field_at(&self, s: f64) -> BeamResult<f64> {
        interp1d(&self.s, &self.e_long, s)
    }

    /// ∫ E(s)·w(s) ds over `[a, b]`.
    pub fn integrate_weighted<W>(&self, a: f64, b: f64, weight: W) -> BeamResult<f64>
    where
        W: Fn(f64) -> f64,
    {
        trapz_weighted(&self.s, &self.e_long, a, b, weight)
    }

    /// Integrate one ion through the sampled field.
    ///
    /// Each table interval advances the RF phase by `k·ds` and the energy by
    /// `Z·scale·Ē·cos(φ̄)·ds`. The walk starts with the ion's sampling
    /// wavenumber and then uses `2π/(βλ)` at the cavity wavelength.
    /// The ion's energy fields are updated in place; the exit RF phase is
    /// returned. An ion brought to rest is a `DataRange` error.
    pub fn boost(
        &self,
        ion: &mut ParticleState,
        phase_in: f64,
        field_scale: f64,
        lambda: f64,
    ) -> BeamResult<f64> {
        let mut phase = phase_in;
        let mut ion_k = ion.sample_ion_k;
        let w_in = ion.ion_ek + ion.ion_es;
        let mut gain = 0.0;

        for i in 0..self.s.len() - 1 {
            let ds = self.s[i + 1] - self.s[i];
            let phase_last = phase;
            phase += ion_k * ds;
            gain += ion.ion_z * field_scale * 0.5 * (self.e_long[i] + self.e_long[i + 1])
                * (0.5 * (phase_last + phase)).cos()
                * ds;

            let w = w_in + gain;
            if !w.is_finite() || w <= ion.ion_es {
                return Err(BeamError::DataRange(format!(
                    "ion brought to rest inside cavity at s = {} (W = {w:e} eV/u)",
                    self.s[i + 1]
                )));
            }
            let gamma = w / ion.ion_es;
            let beta = (1.0 - 1.0 / (gamma * gamma)).sqrt();
            ion_k = 2.0 * PI / (beta * lambda);
        }

        ion.ion_ek += gain;
        ion.recalc();
        Ok(phase)
    }
}

/// Transverse multipole profiles sampled on one axis, one column per
/// thin-lens element type (`EFocus1`, `EDipole`, `HQuad`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultipoleTable {
    pub s: Vec<f64>,
    pub columns: BTreeMap<String, Vec<f64>>,
}

impl MultipoleTable {
    pub fn validate(&self) -> BeamResult<()> {
        validate_axis("multipole table", &self.s)?;
        for (label, column) in &self.columns {
            ThinLensKind::from_str(label)?;
            if column.len() != self.s.len() || column.iter().any(|v| !v.is_finite()) {
                return Err(BeamError::Configuration(format!(
                    "multipole column '{label}' must hold {} finite values",
                    self.s.len()
                )));
            }
        }
        Ok(())
    }

    pub fn profile(&self, kind: ThinLensKind) -> Option<&[f64]> {
        self.columns.get(kind.as_str()).map(|c| c.as_slice())
    }

    /// ∫ f(s)·w(s) ds over the whole profile of `kind`.
    pub fn integrate_weighted<W>(&self, kind: ThinLensKind, weight: W) -> BeamResult<f64>
    where
        W: Fn(f64) -> f64,
    {
        let column = self.profile(kind).ok_or_else(|| {
            BeamError::Configuration(format!("multipole table has no '{}' column", kind.as_str()))
        })?;
        trapz_weighted(&self.s, column, self.s[0], self.s[self.s.len() - 1], weight)
    }
}

/// Fitted transit model of one accelerating gap.
///
/// Each quantity is a polynomial in the ion wavenumber k, highest power
/// first; `v0` scales the field scale factor into the gap voltage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapFit {
    /// β range the fit is valid for.
    pub beta_range: [f64; 2],
    /// Field centre from the gap start [m].
    pub ecen: Vec<f64>,
    pub t: Vec<f64>,
    pub tp: Vec<f64>,
    pub s: Vec<f64>,
    pub sp: Vec<f64>,
    /// Gap voltage per unit field scale [V].
    pub v0: f64,
}

impl GapFit {
    pub fn validate(&self, gap: usize) -> BeamResult<()> {
        let [lo, hi] = self.beta_range;
        if !lo.is_finite() || !hi.is_finite() || lo < 0.0 || lo >= hi || hi > 1.0 {
            return Err(BeamError::Configuration(format!(
                "gap {gap}: beta range must satisfy 0 <= min < max <= 1, got [{lo}, {hi}]"
            )));
        }
        for (label, coeffs) in [
            ("Ecen", &self.ecen),
            ("T", &self.t),
            ("Tp", &self.tp),
            ("S", &self.s),
            ("Sp", &self.sp),
        ] {
            if coeffs.is_empty() || coeffs.iter().any(|c| !c.is_finite()) {
                return Err(BeamError::Configuration(format!(
                    "gap {gap}: {label} fit must hold finite coefficients"
                )));
            }
        }
        if !self.v0.is_finite() {
            return Err(BeamError::Configuration(format!(
                "gap {gap}: V0 must be finite"
            )));
        }
        Ok(())
    }
}

fn default_gap_count() -> usize {
    2
}

/// Everything loaded for one cavity type / data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityData {
    pub field: FieldTable,
    /// Thin-lens lattice (`thinlenlon` rows); empty for the tabulated path.
    #[serde(default)]
    pub lattice: Vec<ThinLensElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multipoles: Option<MultipoleTable>,
    /// Per-gap fits, required by the built-in cavity types.
    #[serde(default)]
    pub gap_fits: Vec<GapFit>,
    /// Number of accelerating gaps the field table is split into.
    #[serde(default = "default_gap_count")]
    pub gap_count: usize,
}

impl CavityData {
    pub fn from_file(path: &str) -> BeamResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let data: Self = serde_json::from_str(&contents)?;
        data.validate()?;
        Ok(data)
    }

    pub fn validate(&self) -> BeamResult<()> {
        self.field.validate()?;
        if let Some(mlp) = &self.multipoles {
            mlp.validate()?;
        }
        for (gap, fit) in self.gap_fits.iter().enumerate() {
            fit.validate(gap)?;
        }
        if self.gap_count == 0 {
            return Err(BeamError::Configuration(
                "cavity data needs at least one gap".to_string(),
            ));
        }
        if !self.gap_fits.is_empty() && self.gap_fits.len() != self.gap_count {
            return Err(BeamError::Configuration(format!(
                "{} gap fits for a {}-gap cavity",
                self.gap_fits.len(),
                self.gap_count
            )));
        }

        if !self.lattice.is_empty() {
            let mut total = 0.0;
            let mut gaps = 0;
            for element in &self.lattice {
                element.validate()?;
                total += element.length;
                if element.kind()? == ThinLensKind::AccGap {
                    gaps += 1;
                }
            }
            if gaps != self.gap_count {
                return Err(BeamError::Configuration(format!(
                    "lattice has {gaps} AccGap rows for a {}-gap cavity",
                    self.gap_count
                )));
            }
            let span = self.field.span();
            if (total - span).abs() > LENGTH_RTOL * span.max(1.0) {
                return Err(BeamError::Configuration(format!(
                    "lattice length {total} does not match field table span {span}"
                )));
            }
        }
        Ok(())
    }

    /// Check the sampled field covers exactly the element length.
    pub fn check_length(&self, length: f64) -> BeamResult<()> {
        let span = self.field.span();
        if (span - length).abs() > LENGTH_RTOL * length.max(1.0) {
            return Err(BeamError::Configuration(format!(
                "field table span {span} m does not match cavity length {length} m"
            )));
        }
        Ok(())
    }
}

fn validate_axis(label: &str, s: &[f64]) -> BeamResult<()> {
    if s.len() < 2 {
        return Err(BeamError::Configuration(format!(
            "{label} needs at least 2 samples, got {}",
            s.len()
        )));
    }
    if s.iter().any(|v| !v.is_finite()) {
        return Err(BeamError::Configuration(format!(
            "{label} positions must be finite"
        )));
    }
    if let Some(i) = s.windows(2).position(|w| w[1] <= w[0]) {
        return Err(BeamError::Configuration(format!(
            "{label} positions must be strictly increasing (index {})",
            i + 1
        )));
    }
    Ok(())
}

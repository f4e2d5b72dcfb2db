// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Thin-Lens Cavity Lattice
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Thin-lens decomposition of a cavity into drifts, multipole kicks and
//! accelerating gaps, plus the per-charge-state line table recorded while
//! walking it.

use beam_types::error::{BeamError, BeamResult};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Coefficients per transit-factor fit in a lattice row.
pub const FIT_LEN: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThinLensKind {
    Drift,
    EFocus1,
    EFocus2,
    EDipole,
    EQuad,
    HMono,
    HDipole,
    HQuad,
    AccGap,
}

impl ThinLensKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinLensKind::Drift => "drift",
            ThinLensKind::EFocus1 => "EFocus1",
            ThinLensKind::EFocus2 => "EFocus2",
            ThinLensKind::EDipole => "EDipole",
            ThinLensKind::EQuad => "EQuad",
            ThinLensKind::HMono => "HMono",
            ThinLensKind::HDipole => "HDipole",
            ThinLensKind::HQuad => "HQuad",
            ThinLensKind::AccGap => "AccGap",
        }
    }

    /// Minimum multipole level at which the kick is applied.
    pub fn required_level(&self) -> u32 {
        match self {
            ThinLensKind::EDipole | ThinLensKind::HDipole => 1,
            ThinLensKind::EQuad | ThinLensKind::HMono | ThinLensKind::HQuad => 2,
            _ => 0,
        }
    }

    /// Rows that carry a transverse multipole kick.
    pub fn is_multipole(&self) -> bool {
        !matches!(self, ThinLensKind::Drift | ThinLensKind::AccGap)
    }
}

impl FromStr for ThinLensKind {
    type Err = BeamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "drift" => Ok(ThinLensKind::Drift),
            "EFocus1" => Ok(ThinLensKind::EFocus1),
            "EFocus2" => Ok(ThinLensKind::EFocus2),
            "EDipole" => Ok(ThinLensKind::EDipole),
            "EQuad" => Ok(ThinLensKind::EQuad),
            "HMono" => Ok(ThinLensKind::HMono),
            "HDipole" => Ok(ThinLensKind::HDipole),
            "HQuad" => Ok(ThinLensKind::HQuad),
            "AccGap" => Ok(ThinLensKind::AccGap),
            other => Err(BeamError::Configuration(format!(
                "unknown thin-lens element type '{other}'"
            ))),
        }
    }
}

/// One row of the thin-lens lattice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinLensElement {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Length [m]; non-zero for drifts.
    pub length: f64,
    /// Aperture [m]; zero means "use the cavity aperture".
    #[serde(default)]
    pub aperture: f64,
    /// Field amplitude [V/m] at unit field scale.
    #[serde(rename = "E0", default)]
    pub e0: f64,
    /// T(k) fit, highest power first.
    #[serde(default = "zero_fit")]
    pub t_fit: Vec<f64>,
    /// S(k) fit, highest power first.
    #[serde(default = "zero_fit")]
    pub s_fit: Vec<f64>,
}

fn zero_fit() -> Vec<f64> {
    vec![0.0; FIT_LEN]
}

impl ThinLensElement {
    pub fn kind(&self) -> BeamResult<ThinLensKind> {
        self.kind.parse()
    }

    pub fn validate(&self) -> BeamResult<()> {
        self.kind()?;
        if !self.length.is_finite() || self.length < 0.0 {
            return Err(BeamError::Configuration(format!(
                "lattice row '{}': length must be finite and >= 0, got {}",
                self.name, self.length
            )));
        }
        if !self.aperture.is_finite() || self.aperture < 0.0 || !self.e0.is_finite() {
            return Err(BeamError::Configuration(format!(
                "lattice row '{}': aperture and E0 must be finite",
                self.name
            )));
        }
        if self.t_fit.len() != FIT_LEN || self.s_fit.len() != FIT_LEN {
            return Err(BeamError::Configuration(format!(
                "lattice row '{}': T and S fits need {FIT_LEN} coefficients each",
                self.name
            )));
        }
        if self.t_fit.iter().chain(self.s_fit.iter()).any(|c| !c.is_finite()) {
            return Err(BeamError::Configuration(format!(
                "lattice row '{}': fit coefficients must be finite",
                self.name
            )));
        }
        Ok(())
    }
}

/// One walked lattice row.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineEntry {
    /// Position at the row's exit [m].
    pub s: f64,
    pub kind: ThinLensKind,
    /// Scaled field amplitude [V/m].
    pub e0: f64,
    pub t: f64,
    pub s_factor: f64,
    /// βγ_in/βγ_out at accelerating gaps, 1 elsewhere.
    pub accel: f64,
}

/// Rows visited while building one charge state's transverse map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineTable {
    entries: Vec<LineEntry>,
}

impl LineTable {
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn push(&mut self, entry: LineEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[LineEntry] {
        &self.entries
    }

    /// Entries of one element type.
    pub fn of_kind(&self, kind: ThinLensKind) -> impl Iterator<Item = &LineEntry> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Config
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
use crate::constants::{C0, SAMPLE_FREQ_HZ};
use crate::error::{BeamError, BeamResult};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Number of coefficients in the complex (peak-base) synchronous-phase fit.
pub const SYNC_COMPLEX_LEN: usize = 12;

/// Highest supported multipole level (0 = monopole focusing only).
pub const MAX_MULTIPOLE_LEVEL: u32 = 2;

/// RF cavity element configuration.
/// Field names follow the lattice keys: `cavtype`, `f`, `L`, `Rm`,
/// `Eng_Data_Dir`, `datafile`, `phi`, `scl_fac`, `SynAccTab`, `SynComplex`,
/// `RefNrm`, `EkLim`, `NrLim`, `MpoleLevel`, `EmitGrowth`, `forcettfcalc`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CavityConfig {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "cavtype")]
    pub cavity_type: String,
    /// RF frequency [Hz].
    #[serde(rename = "f")]
    pub frequency_hz: f64,
    /// Element length [m].
    #[serde(rename = "L")]
    pub length: f64,
    /// Aperture radius [m]. Built-in cavity types fall back to their own.
    #[serde(rename = "Rm", default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<f64>,
    #[serde(rename = "Eng_Data_Dir", default = "default_data_dir")]
    pub data_dir: String,
    #[serde(rename = "datafile", default, skip_serializing_if = "Option::is_none")]
    pub data_file: Option<String>,
    /// Requested synchronous phase [deg].
    #[serde(rename = "phi")]
    pub sync_phase_deg: f64,
    /// Electric field scale factor.
    #[serde(rename = "scl_fac", default = "default_field_scale")]
    pub field_scale: f64,
    /// Sinusoidal-fit offset coefficients `[a0, b0, a1, b1, ...]`.
    #[serde(rename = "SynAccTab", default)]
    pub sync_fit: Vec<f64>,
    /// Complex (peak-base) fit coefficients; takes precedence when present.
    #[serde(rename = "SynComplex", default, skip_serializing_if = "Option::is_none")]
    pub sync_complex: Option<Vec<f64>>,
    /// Reference normalisation q*scl/m for the complex fit.
    #[serde(rename = "RefNrm", default, skip_serializing_if = "Option::is_none")]
    pub ref_nrm: Option<f64>,
    /// Incident kinetic energy validity range [MeV/u].
    #[serde(rename = "EkLim", default, skip_serializing_if = "Option::is_none")]
    pub ek_limits: Option<Vec<f64>>,
    /// Normalisation factor validity range.
    #[serde(rename = "NrLim", default, skip_serializing_if = "Option::is_none")]
    pub nrm_limits: Option<Vec<f64>>,
    #[serde(rename = "MpoleLevel", default)]
    pub multipole_level: u32,
    #[serde(rename = "EmitGrowth", default)]
    pub emittance_growth: bool,
    /// Integrate transit factors from the field table even for built-in
    /// cavity types that ship fits.
    #[serde(rename = "forcettfcalc", default)]
    pub force_ttf_calc: bool,
    #[serde(default)]
    pub misalignment: MisalignmentConfig,
}

/// Mechanical misalignment of the element relative to the design axis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MisalignmentConfig {
    #[serde(default)]
    pub dx: f64,
    #[serde(default)]
    pub dy: f64,
    #[serde(default)]
    pub pitch: f64,
    #[serde(default)]
    pub yaw: f64,
    #[serde(default)]
    pub tilt: f64,
}

fn default_data_dir() -> String {
    ".".to_string()
}
fn default_field_scale() -> f64 {
    1.0
}

fn check_range(label: &str, limits: &Option<Vec<f64>>) -> BeamResult<()> {
    if let Some(v) = limits {
        if v.len() != 2 {
            return Err(BeamError::Configuration(format!(
                "{label} must hold exactly 2 values [min, max], got {}",
                v.len()
            )));
        }
        if !v[0].is_finite() || !v[1].is_finite() || v[0] > v[1] {
            return Err(BeamError::Configuration(format!(
                "{label} must be finite with min <= max, got [{}, {}]",
                v[0], v[1]
            )));
        }
    }
    Ok(())
}

impl CavityConfig {
    /// Load from a JSON file and validate.
    pub fn from_file(path: &str) -> BeamResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BeamResult<()> {
        if self.cavity_type.trim().is_empty() {
            return Err(BeamError::Configuration(
                "cavtype must not be empty".to_string(),
            ));
        }
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(BeamError::Configuration(format!(
                "RF frequency must be finite and > 0, got {}",
                self.frequency_hz
            )));
        }
        if !self.length.is_finite() || self.length <= 0.0 {
            return Err(BeamError::Configuration(format!(
                "cavity length must be finite and > 0, got {}",
                self.length
            )));
        }
        if let Some(rm) = self.aperture {
            if !rm.is_finite() || rm <= 0.0 {
                return Err(BeamError::Configuration(format!(
                    "aperture must be finite and > 0, got {rm}"
                )));
            }
        }
        if !self.sync_phase_deg.is_finite() || !self.field_scale.is_finite() {
            return Err(BeamError::Configuration(
                "phi and scl_fac must be finite".to_string(),
            ));
        }
        if self.sync_fit.len() % 2 != 0 || self.sync_fit.iter().any(|c| !c.is_finite()) {
            return Err(BeamError::Configuration(format!(
                "SynAccTab must hold finite (amplitude, rate) pairs, got {} values",
                self.sync_fit.len()
            )));
        }
        if let Some(p) = &self.sync_complex {
            if p.len() != SYNC_COMPLEX_LEN || p.iter().any(|c| !c.is_finite()) {
                return Err(BeamError::Configuration(format!(
                    "SynComplex must hold {SYNC_COMPLEX_LEN} finite coefficients, got {}",
                    p.len()
                )));
            }
        }
        if let Some(nrm) = self.ref_nrm {
            if !nrm.is_finite() || nrm == 0.0 {
                return Err(BeamError::Configuration(format!(
                    "RefNrm must be finite and non-zero, got {nrm}"
                )));
            }
        }
        check_range("EkLim", &self.ek_limits)?;
        check_range("NrLim", &self.nrm_limits)?;
        if self.multipole_level > MAX_MULTIPOLE_LEVEL {
            return Err(BeamError::Configuration(format!(
                "MpoleLevel must be <= {MAX_MULTIPOLE_LEVEL}, got {}",
                self.multipole_level
            )));
        }
        Ok(())
    }

    /// Cavity frequency as a multiple of the phase sampling frequency.
    pub fn harmonic(&self) -> f64 {
        self.frequency_hz / SAMPLE_FREQ_HZ
    }

    /// RF wavelength [m].
    pub fn lambda(&self) -> f64 {
        C0 / self.frequency_hz
    }

    pub fn sync_phase_rad(&self) -> f64 {
        self.sync_phase_deg.to_radians()
    }

    /// `Eng_Data_Dir/datafile`, when a data file is configured.
    pub fn data_path(&self) -> Option<PathBuf> {
        self.data_file
            .as_ref()
            .map(|file| PathBuf::from(&self.data_dir).join(file))
    }
}

// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Constants
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
/// Speed of light in vacuum (m/s).
pub const C0: f64 = 2.997_924_58e8;

/// Vacuum permeability (H/m).
pub const MU0: f64 = 1.256_637_062_12e-6;

/// eV per MeV. The energy-deviation coordinate is carried in MeV/u.
pub const MEV_TO_EV: f64 = 1e6;

/// Frequency the absolute phase `phis` is sampled at (Hz).
/// Cavities at a harmonic of this frequency scale phase by `f_rf / SAMPLE_FREQ_HZ`.
pub const SAMPLE_FREQ_HZ: f64 = 80.5e6;

/// RF wavelength at the sampling frequency (m).
pub const SAMPLE_LAMBDA_M: f64 = C0 / SAMPLE_FREQ_HZ;

/// Phase-space dimension including the bookkeeping coordinate.
pub const PS_DIM: usize = 7;

/// Horizontal position [m].
pub const PS_X: usize = 0;
/// Horizontal angle [rad].
pub const PS_PX: usize = 1;
/// Vertical position [m].
pub const PS_Y: usize = 2;
/// Vertical angle [rad].
pub const PS_PY: usize = 3;
/// Longitudinal phase deviation [rad].
pub const PS_S: usize = 4;
/// Kinetic energy deviation [MeV/u].
pub const PS_PS: usize = 5;
/// Affine bookkeeping coordinate (1 for a physical orbit).
pub const PS_QQ: usize = 6;

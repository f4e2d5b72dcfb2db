//! Fixtures shared by the beam-core integration tests.
#![allow(dead_code)]

use beam_core::field::{CavityData, FieldTable, GapFit};
use beam_core::registry::{CavityRegistry, DataSourceKey, InMemorySource};
use beam_types::config::CavityConfig;
use beam_types::constants::PS_DIM;
use beam_types::state::{MomentState, ParticleState};
use ndarray::{Array1, Array2};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

pub const REST_ENERGY: f64 = 931.494e6;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Two-gap π-mode cavity, Gaussian gaps at ±3 cm, sampled every mm on
/// [-0.25, 0.25] m.
pub fn cavity_data(amplitude: f64) -> CavityData {
    let s: Vec<f64> = (0..=500).map(|i| -0.25 + i as f64 * 1e-3).collect();
    let gauss = |x: f64| (-(x / 0.008f64).powi(2)).exp();
    let e = s
        .iter()
        .map(|&x| amplitude * 4.0e6 * (gauss(x + 0.03) - gauss(x - 0.03)))
        .collect();
    CavityData {
        field: FieldTable::new(s, e).unwrap(),
        lattice: Vec::new(),
        multipoles: None,
        gap_fits: Vec::new(),
        gap_count: 2,
    }
}

pub fn fitted_cavity_data() -> CavityData {
    let gap = |ecen: f64, v0: f64| GapFit {
        beta_range: [0.01, 0.1],
        ecen: vec![ecen],
        t: vec![-1e-4, 0.95],
        tp: vec![0.0, 1e-3],
        s: vec![0.0],
        sp: vec![0.0, 1e-4],
        v0,
    };
    CavityData {
        gap_fits: vec![gap(0.22, 5.7e4), gap(0.03, -5.7e4)],
        ..cavity_data(1.0)
    }
}

pub fn generic_key(file: &str) -> DataSourceKey {
    DataSourceKey::new("Generic", Some(PathBuf::from(".").join(file)))
}

/// Registry holding generic cavities of the given amplitudes plus the
/// built-in 0.041QWR fit.
pub fn registry(files: &[(&str, f64)]) -> Rc<RefCell<CavityRegistry>> {
    let mut source = InMemorySource::default();
    for &(file, amplitude) in files {
        source.insert(generic_key(file), cavity_data(amplitude));
    }
    source.insert(DataSourceKey::new("0.041QWR", None), fitted_cavity_data());
    CavityRegistry::new(Box::new(source)).shared()
}

pub fn generic_config(data_file: &str, field_scale: f64) -> CavityConfig {
    let json = format!(
        r#"{{"name": "cav", "cavtype": "Generic", "f": 80.5e6, "L": 0.5, "Rm": 0.02,
            "datafile": "{data_file}", "phi": -30.0, "scl_fac": {field_scale},
            "MpoleLevel": 0}}"#
    );
    serde_json::from_str(&json).unwrap()
}

pub fn qwr_config() -> CavityConfig {
    let json = r#"{"name": "qwr", "cavtype": "0.041QWR", "f": 80.5e6, "L": 0.5,
        "phi": -25.0, "SynAccTab": [4.0, -0.5]}"#;
    serde_json::from_str(json).unwrap()
}

pub fn ion(z: f64, q: f64, ek: f64) -> ParticleState {
    ParticleState::new(z, q, REST_ENERGY, ek).unwrap()
}

/// Diagonal covariance with equal small transverse entries.
pub fn diagonal_sigma(var: f64) -> Array2<f64> {
    let mut m1: Array2<f64> = Array2::zeros((PS_DIM, PS_DIM));
    for j in 0..6 {
        m1[[j, j]] = var;
    }
    m1
}

pub fn state_with(real: Vec<ParticleState>, m0: Array1<f64>, m1: Array2<f64>) -> MomentState {
    let n = real.len();
    MomentState::new(ion(0.2, 0.0, 0.5e6), real, vec![m0; n], vec![m1; n]).unwrap()
}

pub fn two_state_bunch() -> MomentState {
    let mut m0: Array1<f64> = Array1::zeros(PS_DIM);
    m0[0] = 1e-4;
    m0[1] = -5e-5;
    m0[2] = 2e-4;
    m0[6] = 1.0;
    let mut m1 = diagonal_sigma(1e-6);
    m1[[4, 4]] = 1e-3;
    m1[[0, 1]] = 2e-7;
    m1[[1, 0]] = 2e-7;
    state_with(vec![ion(0.2, 10.0, 0.5e6), ion(0.21, 5.0, 0.501e6)], m0, m1)
}

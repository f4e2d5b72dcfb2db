//! Shared fixtures for unit tests: a two-gap π-mode cavity sampled on
//! [-0.25, 0.25] m and a low-energy ion.

use crate::field::{CavityData, FieldTable, GapFit};
use crate::lattice::{ThinLensElement, FIT_LEN};
use crate::registry::{CavityRegistry, DataSourceKey, InMemorySource};
use beam_types::config::CavityConfig;
use beam_types::constants::PS_DIM;
use beam_types::state::{MomentState, ParticleState};
use ndarray::{Array1, Array2};
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

pub(crate) const PEAK_FIELD: f64 = 4.0e6;
const GAP_OFFSET: f64 = 0.03;
const GAP_WIDTH: f64 = 0.008;

pub(crate) fn reference_ion() -> ParticleState {
    ParticleState::new(0.2, 0.0, 931.494e6, 0.5e6).unwrap()
}

pub(crate) fn field_table(amplitude: f64) -> FieldTable {
    let s: Vec<f64> = (0..=500).map(|i| -0.25 + i as f64 * 1e-3).collect();
    let gauss = |x: f64| (-(x / GAP_WIDTH).powi(2)).exp();
    let e = s
        .iter()
        .map(|&x| amplitude * PEAK_FIELD * (gauss(x + GAP_OFFSET) - gauss(x - GAP_OFFSET)))
        .collect();
    FieldTable::new(s, e).unwrap()
}

pub(crate) fn generic_data(amplitude: f64) -> CavityData {
    CavityData {
        field: field_table(amplitude),
        lattice: Vec::new(),
        multipoles: None,
        gap_fits: Vec::new(),
        gap_count: 2,
    }
}

pub(crate) fn fitted_data() -> CavityData {
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
        ..generic_data(1.0)
    }
}

fn lattice_row(kind: &str, length: f64) -> ThinLensElement {
    let mut t_fit = vec![0.0; FIT_LEN];
    t_fit[FIT_LEN - 1] = 0.01;
    ThinLensElement {
        name: kind.to_string(),
        kind: kind.to_string(),
        length,
        aperture: 0.0,
        e0: 1.0e6,
        t_fit,
        s_fit: vec![0.0; FIT_LEN],
    }
}

pub(crate) fn lattice_data() -> CavityData {
    let rows = [
        ("drift", 0.22),
        ("EFocus1", 0.0),
        ("EDipole", 0.0),
        ("AccGap", 0.0),
        ("EQuad", 0.0),
        ("EFocus2", 0.0),
        ("drift", 0.06),
        ("EFocus1", 0.0),
        ("HMono", 0.0),
        ("AccGap", 0.0),
        ("HDipole", 0.0),
        ("HQuad", 0.0),
        ("EFocus2", 0.0),
        ("drift", 0.22),
    ];
    CavityData {
        lattice: rows.iter().map(|&(k, l)| lattice_row(k, l)).collect(),
        ..generic_data(1.0)
    }
}

pub(crate) fn generic_config(data_file: &str) -> CavityConfig {
    let json = format!(
        r#"{{"name": "cav", "cavtype": "Generic", "f": 80.5e6, "L": 0.5, "Rm": 0.02,
            "datafile": "{data_file}", "phi": -30.0}}"#
    );
    serde_json::from_str(&json).unwrap()
}

pub(crate) fn registry_with(files: &[(&str, f64)]) -> Rc<RefCell<CavityRegistry>> {
    let mut source = InMemorySource::default();
    for &(file, amplitude) in files {
        source.insert(
            DataSourceKey::new("Generic", Some(PathBuf::from(".").join(file))),
            generic_data(amplitude),
        );
    }
    CavityRegistry::new(Box::new(source)).shared()
}

pub(crate) fn moment_state(n: usize) -> MomentState {
    let real: Vec<ParticleState> = (0..n)
        .map(|i| ParticleState::new(0.2 + 0.005 * i as f64, 1.0 + i as f64, 931.494e6, 0.5e6).unwrap())
        .collect();
    let mut m0: Array1<f64> = Array1::zeros(PS_DIM);
    m0[0] = 1e-4;
    m0[2] = -2e-4;
    let mut m1: Array2<f64> = Array2::zeros((PS_DIM, PS_DIM));
    for (j, var) in [1e-6, 1e-6, 1e-6, 1e-6, 1e-4, 1e-8].into_iter().enumerate() {
        m1[[j, j]] = var;
    }
    MomentState::new(reference_ion(), real, vec![m0; n], vec![m1; n]).unwrap()
}

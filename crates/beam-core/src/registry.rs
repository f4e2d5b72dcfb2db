// ─────────────────────────────────────────────────────────────────────
// SCPN Beamline Core — Cavity Data Registry
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Loading and sharing of cavity data across elements.
//!
//! Elements of the same cavity type and data file share one parsed
//! [`CavityData`]. The registry is handed to elements explicitly as
//! `Rc<RefCell<_>>`; there is no process-wide table.

use crate::field::CavityData;
use beam_types::config::CavityConfig;
use beam_types::error::{BeamError, BeamResult};
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataSourceKey {
    pub cavity_type: String,
    pub data_file: Option<PathBuf>,
}

impl DataSourceKey {
    pub fn new(cavity_type: &str, data_file: Option<PathBuf>) -> Self {
        DataSourceKey {
            cavity_type: cavity_type.trim().to_string(),
            data_file,
        }
    }

    pub fn from_config(cfg: &CavityConfig) -> Self {
        Self::new(&cfg.cavity_type, cfg.data_path())
    }
}

pub trait CavityDataSource {
    fn load(&self, key: &DataSourceKey) -> BeamResult<CavityData>;
}

/// Data registered in memory, keyed by type and file name.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    entries: HashMap<DataSourceKey, CavityData>,
}

impl InMemorySource {
    pub fn insert(&mut self, key: DataSourceKey, data: CavityData) {
        self.entries.insert(key, data);
    }
}

impl CavityDataSource for InMemorySource {
    fn load(&self, key: &DataSourceKey) -> BeamResult<CavityData> {
        self.entries.get(key).cloned().ok_or_else(|| {
            BeamError::Configuration(format!(
                "no cavity data registered for type '{}' file {:?}",
                key.cavity_type, key.data_file
            ))
        })
    }
}

/// JSON files on disk. Keys without a data file resolve to
/// `<root>/<cavity_type>.json`.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    root: PathBuf,
}

impl JsonFileSource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        JsonFileSource {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, key: &DataSourceKey) -> PathBuf {
        key.data_file
            .clone()
            .unwrap_or_else(|| self.root.join(format!("{}.json", key.cavity_type)))
    }
}

impl CavityDataSource for JsonFileSource {
    fn load(&self, key: &DataSourceKey) -> BeamResult<CavityData> {
        let path = self.path_for(key);
        let contents = std::fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

pub struct CavityRegistry {
    source: Box<dyn CavityDataSource>,
    loaded: HashMap<DataSourceKey, Rc<CavityData>>,
    load_count: usize,
}

impl CavityRegistry {
    pub fn new(source: Box<dyn CavityDataSource>) -> Self {
        CavityRegistry {
            source,
            loaded: HashMap::new(),
            load_count: 0,
        }
    }

    pub fn shared(self) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(self))
    }

    /// Memoized load.
    pub fn load(&mut self, key: &DataSourceKey) -> BeamResult<Rc<CavityData>> {
        if let Some(data) = self.loaded.get(key) {
            return Ok(Rc::clone(data));
        }
        self.reload(key)
    }

    /// Fresh load from the source, replacing any memoized entry.
    pub fn reload(&mut self, key: &DataSourceKey) -> BeamResult<Rc<CavityData>> {
        let data = self.source.load(key)?;
        data.validate()?;
        self.load_count += 1;
        debug!(
            "loaded cavity data '{}' ({} field samples, {} lattice rows)",
            key.cavity_type,
            data.field.len(),
            data.lattice.len()
        );
        let data = Rc::new(data);
        self.loaded.insert(key.clone(), Rc::clone(&data));
        Ok(data)
    }

    /// Number of loads that reached the source.
    pub fn load_count(&self) -> usize {
        self.load_count
    }

    pub fn len(&self) -> usize {
        self.loaded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaded.is_empty()
    }
}

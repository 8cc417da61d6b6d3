use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::index::{IndexKind, LshParams};

/// Store configuration (spec §6). Loadable from a TOML file or built programmatically;
/// every field has the default named in the spec.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub embedding_dimension: usize,
    pub index_class: IndexKind,
    pub lsh_params: LshParams,
    pub data_dir: PathBuf,
    pub save_interval_seconds: u64,
    pub check_interval_seconds: u64,
    pub seed_file: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            embedding_dimension: 1024,
            index_class: IndexKind::Lsh,
            lsh_params: LshParams::default(),
            data_dir: PathBuf::from("pickle_db"),
            save_interval_seconds: 30,
            check_interval_seconds: 5,
            seed_file: None,
        }
    }
}

impl StoreConfig {
    /// Parses a TOML config file, falling back to defaults for any field it omits.
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("vector_db.json")
    }
}

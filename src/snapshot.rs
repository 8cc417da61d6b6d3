//! Persistence to a single JSON file, replacing the source's pickle file (spec §4.5/§6):
//! indices are never serialized. Each library carries its own index class/parameters
//! (see [`crate::model::Library`]); this snapshot additionally carries the store's
//! defaults for libraries created after a restore.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::errors::{StoreError, StoreResult};
use crate::index::{IndexKind, LshParams};
use crate::model::Library;
use crate::store::VectorStore;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    pub libraries: std::collections::HashMap<String, Library>,
    pub embedding_dimension: usize,
    pub default_index_kind: IndexKind,
    pub default_lsh_params: LshParams,
}

fn snapshot_path(data_dir: &Path) -> PathBuf {
    data_dir.join("vector_db.json")
}

fn temp_path(data_dir: &Path) -> PathBuf {
    data_dir.join("vector_db.json.tmp")
}

/// Serializes `data` to `<data_dir>/vector_db.json.tmp` then renames it over the real
/// file, so a reader never observes a partially written snapshot (spec §4.5).
pub fn save_to_disk(data_dir: &Path, data: &SnapshotData) -> StoreResult<()> {
    fs::create_dir_all(data_dir)?;
    let tmp = temp_path(data_dir);
    let result = (|| -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, snapshot_path(data_dir))?;
        Ok(())
    })();
    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Loads a previously saved snapshot, if one exists. A missing file is not an error:
/// it just means there's nothing to restore yet.
pub fn load_from_disk(data_dir: &Path) -> StoreResult<Option<SnapshotData>> {
    let path = snapshot_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }
    let bytes = fs::read(&path).map_err(StoreError::Io)?;
    let data: SnapshotData = serde_json::from_slice(&bytes)?;
    Ok(Some(data))
}

/// Spawns the background save loop (spec §4.5 "periodic saving"): wakes every
/// `check_interval`, and if the store is dirty and `save_interval` has elapsed since
/// the last save, snapshots it. Runs for the process lifetime as a daemon thread.
pub fn spawn_periodic_save(
    store: Arc<VectorStore>,
    data_dir: PathBuf,
    save_interval: Duration,
    check_interval: Duration,
) {
    std::thread::spawn(move || {
        let save_interval = ChronoDuration::from_std(save_interval).unwrap_or(ChronoDuration::seconds(30));
        loop {
            std::thread::sleep(check_interval);
            if !store.is_dirty_and_due(save_interval) {
                continue;
            }
            let data = store.snapshot_view();
            match save_to_disk(&data_dir, &data) {
                Ok(()) => {
                    store.mark_saved();
                    info!("saved database to disk");
                }
                Err(err) => error!(%err, "failed to save database to disk"),
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn sample() -> SnapshotData {
        SnapshotData {
            libraries: HashMap::new(),
            embedding_dimension: 4,
            default_index_kind: IndexKind::Exact,
            default_lsh_params: LshParams::default(),
        }
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let data = sample();
        save_to_disk(dir.path(), &data).unwrap();
        let loaded = load_from_disk(dir.path()).unwrap().unwrap();
        assert_eq!(loaded.embedding_dimension, data.embedding_dimension);
        assert_eq!(loaded.default_index_kind, data.default_index_kind);
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_from_disk(dir.path()).unwrap().is_none());
    }

    #[test]
    fn no_leftover_temp_file_after_successful_save() {
        let dir = tempfile::tempdir().unwrap();
        save_to_disk(dir.path(), &sample()).unwrap();
        assert!(!temp_path(dir.path()).exists());
    }
}

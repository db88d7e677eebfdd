//! Server-side record persistence.

use crate::error::{ServerError, ServerResult};
use curve_sync_protocol::RecordMap;
use parking_lot::RwLock;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Whole-map persistence for the shared record store.
///
/// Every write replaces the full map. Callers serialize read-modify-write
/// sequences themselves.
pub trait RecordStore: Send + Sync {
    /// Returns true if the store has ever been written.
    fn exists(&self) -> bool;

    /// Loads the full map. An absent store loads as empty.
    fn load(&self) -> ServerResult<RecordMap>;

    /// Replaces the full map.
    fn save(&self, records: &RecordMap) -> ServerResult<()>;
}

/// An in-memory record store.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    records: RwLock<Option<RecordMap>>,
}

impl MemoryRecordStore {
    /// Creates an empty, never-written store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding `records`.
    pub fn with_records(records: RecordMap) -> Self {
        Self {
            records: RwLock::new(Some(records)),
        }
    }
}

impl RecordStore for MemoryRecordStore {
    fn exists(&self) -> bool {
        self.records.read().is_some()
    }

    fn load(&self) -> ServerResult<RecordMap> {
        Ok(self.records.read().clone().unwrap_or_default())
    }

    fn save(&self, records: &RecordMap) -> ServerResult<()> {
        *self.records.write() = Some(records.clone());
        Ok(())
    }
}

/// A record store kept in one pretty-printed JSON file.
///
/// A missing file loads as an empty map. A file that does not decode is an
/// error and is never overwritten by a merge.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Creates a store over `path`. Nothing is read until the first load.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path to the store file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for JsonFileStore {
    fn exists(&self) -> bool {
        self.path.exists()
    }

    fn load(&self) -> ServerResult<RecordMap> {
        if !self.path.exists() {
            return Ok(RecordMap::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        serde_json::from_str(&raw).map_err(|e| ServerError::CorruptStore(e.to_string()))
    }

    fn save(&self, records: &RecordMap) -> ServerResult<()> {
        let encoded = serde_json::to_vec_pretty(records)?;
        let tmp_path = self.path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        debug!(path = %self.path.display(), records = records.len(), "store saved");
        Ok(())
    }
}

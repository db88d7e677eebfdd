//! File-based storage backend for persistent caches.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A file-based storage backend.
///
/// All entries live in one JSON object file (`{"key": "value", ...}`) that
/// is loaded on open and rewritten after every mutation. Data survives
/// process restarts.
///
/// # Durability
///
/// Every mutation writes a sibling temporary file, syncs it, and renames it
/// over the original, so a crash leaves either the old or the new contents.
/// The in-memory view changes only after the file was written; a failed
/// mutation leaves both untouched.
///
/// # Corruption
///
/// A file that does not parse as a JSON object of strings opens as an empty
/// store (a warning is logged). The next mutation overwrites it.
///
/// # Example
///
/// ```no_run
/// use curve_storage::{StorageBackend, FileBackend};
/// use std::path::Path;
///
/// let backend = FileBackend::open(Path::new("cache.json")).unwrap();
/// backend.set("DATA_VERSION", "RESET_2026_01_04_V2").unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileBackend {
    /// Opens or creates a file backend at the given path.
    ///
    /// A missing file is not created until the first mutation.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be read.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(path)?;
            Self::parse(path, &raw)
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Opens a file backend, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot be read.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path to the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(path: &Path, raw: &str) -> BTreeMap<String, String> {
        if raw.trim().is_empty() {
            return BTreeMap::new();
        }
        match serde_json::from_str(raw) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cache file is corrupt, starting empty");
                BTreeMap::new()
            }
        }
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StorageResult<()> {
        let encoded = serde_json::to_vec_pretty(entries)?;
        let tmp_path = self.path.with_extension("tmp");

        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&encoded)?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut entries = self.entries.write();
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        let mut entries = self.entries.write();
        if !entries.contains_key(key) {
            return Ok(false);
        }
        let mut next = entries.clone();
        next.remove(key);
        self.persist(&next)?;
        *entries = next;
        Ok(true)
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> StorageResult<()> {
        let mut entries = self.entries.write();
        self.persist(&BTreeMap::new())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_open_missing_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let backend = FileBackend::open(&path).unwrap();
        assert!(backend.keys().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn file_set_and_get() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set("branch", "X3D DENTAL").unwrap();

        assert_eq!(backend.get("branch").unwrap().as_deref(), Some("X3D DENTAL"));
        assert!(path.exists());
    }

    #[test]
    fn file_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        {
            let backend = FileBackend::open(&path).unwrap();
            backend.set("appointments_BANGALORE", "[]").unwrap();
            backend.set("role", "USER").unwrap();
        }

        {
            let backend = FileBackend::open(&path).unwrap();
            assert_eq!(
                backend.keys().unwrap(),
                vec!["appointments_BANGALORE", "role"]
            );
            assert_eq!(backend.get("role").unwrap().as_deref(), Some("USER"));
        }
    }

    #[test]
    fn file_remove_and_clear_persist() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let backend = FileBackend::open(&path).unwrap();
        backend.set("a", "1").unwrap();
        backend.set("b", "2").unwrap();
        assert!(backend.remove("a").unwrap());
        assert!(!backend.remove("a").unwrap());

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.keys().unwrap(), vec!["b"]);

        reopened.clear().unwrap();
        let reopened = FileBackend::open(&path).unwrap();
        assert!(reopened.keys().unwrap().is_empty());
    }

    #[test]
    fn file_corrupt_opens_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, b"{not json").unwrap();

        let backend = FileBackend::open(&path).unwrap();
        assert!(backend.keys().unwrap().is_empty());

        backend.set("k", "v").unwrap();
        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn failed_write_leaves_state_unchanged() {
        let dir = tempdir().unwrap();
        let parent = dir.path().join("client");
        let path = parent.join("cache.json");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        backend.set("a", "1").unwrap();
        fs::remove_dir_all(&parent).unwrap();

        assert!(backend.set("b", "2").is_err());
        assert_eq!(backend.get("b").unwrap(), None);
        assert!(backend.remove("a").is_err());
        assert_eq!(backend.get("a").unwrap().as_deref(), Some("1"));
        assert!(backend.clear().is_err());
        assert_eq!(backend.keys().unwrap(), vec!["a"]);
    }

    #[test]
    fn file_create_with_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("path").join("cache.json");

        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        backend.set("k", "v").unwrap();
        assert!(path.exists());
        assert_eq!(backend.path(), path);
    }
}

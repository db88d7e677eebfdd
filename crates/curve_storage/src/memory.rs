//! In-memory storage backend for testing.

use crate::backend::StorageBackend;
use crate::error::StorageResult;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory storage backend.
///
/// This backend stores all values in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral caches that don't need persistence
///
/// # Example
///
/// ```rust
/// use curve_storage::{StorageBackend, InMemoryBackend};
///
/// let backend = InMemoryBackend::new();
/// backend.set("role", "ADMINISTRATOR").unwrap();
/// assert_eq!(backend.keys().unwrap(), vec!["role".to_string()]);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
}

impl InMemoryBackend {
    /// Creates a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a backend pre-populated with the given entries.
    ///
    /// Useful for testing migration and recovery scenarios.
    #[must_use]
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Returns a copy of every entry.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }

    /// Returns the number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl StorageBackend for InMemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> StorageResult<bool> {
        Ok(self.entries.write().remove(key).is_some())
    }

    fn keys(&self) -> StorageResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn clear(&self) -> StorageResult<()> {
        self.entries.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_new_is_empty() {
        let backend = InMemoryBackend::new();
        assert!(backend.is_empty());
        assert!(backend.keys().unwrap().is_empty());
    }

    #[test]
    fn memory_set_then_get() {
        let backend = InMemoryBackend::new();
        backend.set("branch", "BANGALORE").unwrap();
        assert_eq!(backend.get("branch").unwrap().as_deref(), Some("BANGALORE"));
        assert_eq!(backend.get("role").unwrap(), None);
    }

    #[test]
    fn memory_set_replaces() {
        let backend = InMemoryBackend::new();
        backend.set("k", "one").unwrap();
        backend.set("k", "two").unwrap();
        assert_eq!(backend.get("k").unwrap().as_deref(), Some("two"));
        assert_eq!(backend.len(), 1);
    }

    #[test]
    fn memory_remove_reports_presence() {
        let backend = InMemoryBackend::new();
        backend.set("k", "v").unwrap();
        assert!(backend.remove("k").unwrap());
        assert!(!backend.remove("k").unwrap());
    }

    #[test]
    fn memory_keys_are_sorted() {
        let backend = InMemoryBackend::with_entries([("b", "2"), ("a", "1"), ("c", "3")]);
        assert_eq!(backend.keys().unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn memory_clear() {
        let backend = InMemoryBackend::with_entries([("a", "1"), ("b", "2")]);
        backend.clear().unwrap();
        assert!(backend.is_empty());
    }
}

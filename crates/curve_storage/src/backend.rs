//! Storage backend trait definition.

use crate::error::StorageResult;

/// A client-resident key/value store.
///
/// Backends are **opaque string stores**. The sync engine decides what the
/// keys mean (`appointments_<branch>`, `DATA_VERSION`, session keys) and how
/// values are encoded.
///
/// # Invariants
///
/// - `get` returns exactly the value last passed to `set` for that key
/// - `remove` of a missing key is not an error
/// - `keys` lists every stored key exactly once
/// - After `clear`, `keys` is empty
///
/// # Implementors
///
/// - [`super::InMemoryBackend`] - For testing
/// - [`super::FileBackend`] - For persistent storage
pub trait StorageBackend: Send + Sync {
    /// Returns the value stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`. Returns true if a value was present.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn remove(&self, key: &str) -> StorageResult<bool>;

    /// Returns every stored key in ascending order.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn keys(&self) -> StorageResult<Vec<String>>;

    /// Removes every key.
    ///
    /// # Errors
    ///
    /// Returns an error if the change cannot be persisted.
    fn clear(&self) -> StorageResult<()>;
}

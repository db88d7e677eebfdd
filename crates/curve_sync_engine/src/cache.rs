//! Local cache of appointment partitions.
//!
//! Key layout inside the storage backend:
//!
//! | key | value |
//! |---|---|
//! | `appointments_<branch>` | JSON array of records |
//! | `DATA_VERSION` | version token |
//! | `role`, `branch`, `loggedIn` | session keys |
//! | `currentPatient` | scratch record being edited |
//!
//! Malformed stored values are treated as absent and logged; they never
//! surface as errors. Inside a partition, entries that do not decode as
//! records are kept aside in [`Partition::undecodable`] so that rewriting the
//! partition does not destroy them.

use crate::error::{SyncError, SyncResult};
use curve_storage::StorageBackend;
use curve_sync_protocol::Record;
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

/// Prefix of every appointment partition key.
pub const PARTITION_PREFIX: &str = "appointments_";
/// Key of the data version marker.
pub const VERSION_KEY: &str = "DATA_VERSION";
/// Key of the current-patient scratch value.
pub const CURRENT_PATIENT_KEY: &str = "currentPatient";

/// Returns the partition key for a branch.
pub fn partition_key(branch: &str) -> String {
    format!("{PARTITION_PREFIX}{branch}")
}

/// Returns the branch of a partition key, or `None` for other keys.
pub fn partition_branch(key: &str) -> Option<&str> {
    key.strip_prefix(PARTITION_PREFIX)
}

/// Session keys that identify the active user and survive version wipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionKey {
    /// `role`
    Role,
    /// `branch`
    Branch,
    /// `loggedIn`
    LoggedIn,
}

impl SessionKey {
    /// Every session key.
    pub const ALL: [SessionKey; 3] = [SessionKey::Role, SessionKey::Branch, SessionKey::LoggedIn];

    /// Storage key.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionKey::Role => "role",
            SessionKey::Branch => "branch",
            SessionKey::LoggedIn => "loggedIn",
        }
    }
}

/// A partition as stored, split into decoded records and the raw entries
/// that did not decode.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    /// Entries that decoded as records, in stored order.
    pub records: Vec<Record>,
    /// Raw entries that did not decode, in stored order.
    pub undecodable: Vec<Value>,
    /// The stored value was not a JSON array at all.
    pub malformed: bool,
}

impl Partition {
    /// Returns true if every stored entry decoded.
    pub fn is_clean(&self) -> bool {
        !self.malformed && self.undecodable.is_empty()
    }

    /// Number of stored entries that could not be used. A value that is not
    /// an array counts as one.
    pub fn lost(&self) -> usize {
        self.undecodable.len() + usize::from(self.malformed)
    }

    fn malformed() -> Self {
        Self {
            malformed: true,
            ..Self::default()
        }
    }
}

/// Typed view of the client-side cache.
#[derive(Debug)]
pub struct LocalCache<B: StorageBackend> {
    backend: B,
}

impl<B: StorageBackend> LocalCache<B> {
    /// Wraps a storage backend.
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Reads the records of a partition. Absent or unparsable partitions
    /// read as empty; undecodable entries are left out.
    pub fn read(&self, key: &str) -> Vec<Record> {
        self.read_partition(key).records
    }

    /// Reads a partition entry by entry.
    ///
    /// An absent or blank value reads as a clean empty partition.
    pub fn read_partition(&self, key: &str) -> Partition {
        let Some(raw) = self.read_string(key) else {
            return Partition::default();
        };
        if raw.trim().is_empty() {
            return Partition::default();
        }

        let entries = match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(entries)) => entries,
            Ok(_) => {
                warn!(key, "partition is not an array, treating as empty");
                return Partition::malformed();
            }
            Err(e) => {
                warn!(key, error = %e, "partition is malformed, treating as empty");
                return Partition::malformed();
            }
        };

        let mut partition = Partition::default();
        for entry in entries {
            match Record::deserialize(&entry) {
                Ok(record) => partition.records.push(record),
                Err(e) => {
                    warn!(key, error = %e, "skipping undecodable record");
                    partition.undecodable.push(entry);
                }
            }
        }
        partition
    }

    /// Reads the partition of a branch.
    pub fn read_branch(&self, branch: &str) -> Vec<Record> {
        self.read(&partition_key(branch))
    }

    /// Replaces a partition.
    pub fn write(&self, key: &str, records: &[Record]) -> SyncResult<()> {
        let encoded = serde_json::to_string(records)
            .map_err(|e| SyncError::Protocol(e.to_string()))?;
        self.backend.set(key, &encoded)?;
        Ok(())
    }

    /// Replaces a partition, writing undecodable entries back after the
    /// records.
    pub fn write_partition(&self, key: &str, partition: &Partition) -> SyncResult<()> {
        let encode = |e: serde_json::Error| SyncError::Protocol(e.to_string());
        let mut entries = Vec::with_capacity(partition.records.len() + partition.undecodable.len());
        for record in &partition.records {
            entries.push(serde_json::to_value(record).map_err(encode)?);
        }
        entries.extend(partition.undecodable.iter().cloned());
        let encoded = serde_json::to_string(&entries).map_err(encode)?;
        self.backend.set(key, &encoded)?;
        Ok(())
    }

    /// Replaces the partition of a branch.
    pub fn write_branch(&self, branch: &str, records: &[Record]) -> SyncResult<()> {
        self.write(&partition_key(branch), records)
    }

    /// Removes a key. Returns true if it existed.
    pub fn remove(&self, key: &str) -> SyncResult<bool> {
        Ok(self.backend.remove(key)?)
    }

    /// Returns every partition key in ascending order.
    pub fn enumerate_partition_keys(&self) -> Vec<String> {
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(PARTITION_PREFIX))
                .collect(),
            Err(e) => {
                warn!(error = %e, "failed to enumerate cache keys");
                Vec::new()
            }
        }
    }

    /// Returns every stored key.
    pub fn all_keys(&self) -> Vec<String> {
        self.backend.keys().unwrap_or_else(|e| {
            warn!(error = %e, "failed to enumerate cache keys");
            Vec::new()
        })
    }

    /// Reads a session key.
    pub fn read_session_key(&self, key: SessionKey) -> Option<String> {
        self.read_string(key.as_str())
    }

    /// Writes a session key.
    pub fn write_session_key(&self, key: SessionKey, value: &str) -> SyncResult<()> {
        self.backend.set(key.as_str(), value)?;
        Ok(())
    }

    /// Reads the data version marker.
    pub fn read_marker(&self) -> Option<String> {
        self.read_string(VERSION_KEY)
    }

    /// Writes the data version marker.
    pub fn write_marker(&self, version: &str) -> SyncResult<()> {
        self.backend.set(VERSION_KEY, version)?;
        Ok(())
    }

    /// Removes the current-patient scratch key.
    pub fn remove_scratch(&self) -> SyncResult<bool> {
        self.remove(CURRENT_PATIENT_KEY)
    }

    /// Removes every key.
    pub fn clear_all(&self) -> SyncResult<()> {
        self.backend.clear()?;
        Ok(())
    }

    fn read_string(&self, key: &str) -> Option<String> {
        match self.backend.get(key) {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "failed to read cache key");
                None
            }
        }
    }
}

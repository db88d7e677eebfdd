//! # CURVE Sync Engine
//!
//! Offline-first synchronization between a clinic client's local cache and
//! the shared record server.
//!
//! This crate provides:
//! - Local cache adapter over a key/value storage backend
//! - Data version gate with configurable wipe policies
//! - Legacy branch partition migration
//! - Ghost record scrubbing
//! - Remote store abstraction (HTTP, loopback and mock)
//! - The sync engine (push, strict-mirror pull, write-through operations)
//!
//! ## Architecture
//!
//! On startup [`SyncEngine::initialize`] runs the version gate, folds legacy
//! partitions into canonical ones, removes ghost records and pulls. Pull is a
//! **strict mirror**: every configured branch partition is replaced by the
//! cloud records of that branch, so server deletions reach every client.
//!
//! ## Key Invariants
//!
//! - The server is authoritative for pulled partitions
//! - Push and pull never overlap; a call while one runs is skipped
//! - Validation failures never reach the network
//! - Transport failures leave local data untouched
//! - Data-loss risks are reported as [`SyncWarning`]s

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod config;
mod error;
mod ghost;
mod http;
mod migrate;
mod report;
mod state;
mod transport;
mod version;

pub use cache::{
    partition_branch, partition_key, LocalCache, Partition, SessionKey, CURRENT_PATIENT_KEY,
    PARTITION_PREFIX, VERSION_KEY,
};
pub use config::{EmptyCloudPolicy, SyncConfig, WipePolicy};
pub use error::{SyncError, SyncResult};
pub use ghost::{GhostScrubber, ScrubReport};
pub use http::{HttpClient, HttpRemoteStore, LoopbackClient, LoopbackServer};
pub use migrate::{BranchMigrator, MigrationReport, PartitionMigration};
pub use report::{
    InitReport, OperationResult, PullOutcome, PullSummary, PushOutcome, PushSummary, SyncWarning,
};
pub use state::{SyncEngine, SyncState, SyncStats};
pub use transport::{MockRemoteStore, RemoteStore};
pub use version::{GateOutcome, VersionGate, VersionState};

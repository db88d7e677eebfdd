//! # CURVE Storage
//!
//! Client-resident key/value storage for the CURVE sync engine.
//!
//! Backends play the role a browser's local storage plays for the web
//! client: a flat namespace of string keys mapping to string values that
//! survives restarts. Backends are **opaque string stores** - they do not
//! know about appointments, partitions or version markers.
//!
//! ## Design Principles
//!
//! - Backends only get, set, remove, enumerate and clear
//! - No knowledge of record formats or key naming conventions
//! - Must be `Send + Sync`; all operations take `&self`
//! - The sync engine owns all value interpretation
//!
//! ## Available Backends
//!
//! - [`InMemoryBackend`] - For testing and ephemeral caches
//! - [`FileBackend`] - Persistent cache stored as a single JSON object file
//!
//! ## Example
//!
//! ```rust
//! use curve_storage::{StorageBackend, InMemoryBackend};
//!
//! let backend = InMemoryBackend::new();
//! backend.set("branch", "X3D DENTAL").unwrap();
//! assert_eq!(backend.get("branch").unwrap().as_deref(), Some("X3D DENTAL"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::StorageBackend;
pub use error::{StorageError, StorageResult};
pub use file::FileBackend;
pub use memory::InMemoryBackend;

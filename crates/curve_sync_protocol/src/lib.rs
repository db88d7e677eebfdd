//! # CURVE Sync Protocol
//!
//! Shared types for the CURVE appointment sync engine and its record server.
//!
//! This crate provides:
//! - [`Record`] and [`RecordMap`], the appointment data model
//! - [`BranchTable`], the declarative branch-name normalizer
//! - [`GhostDenylist`], the known-bad record matcher
//! - Wire messages and HTTP framing for the record server endpoints
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod branch;
mod error;
mod ghost;
mod messages;
mod record;

pub use branch::{BranchRule, BranchTable, UnmatchedPolicy};
pub use error::{ProtocolError, ProtocolResult};
pub use ghost::GhostDenylist;
pub use messages::{
    AckResponse, BranchResetResponse, ConfigResponse, Endpoint, ErrorResponse, HttpMethod,
    HttpRequest, HttpResponse, SaveAllResponse,
};
pub use record::{Record, RecordMap};

//! # CURVE Sync Server
//!
//! Reference record server for CURVE clinics.
//!
//! This crate provides:
//! - Request routing for every record endpoint
//! - Whole-map record persistence (memory or pretty-printed JSON file)
//! - Fuzzy branch deletion through the shared branch table
//! - A startup cleaner for denylisted ghost records
//!
//! # Architecture
//!
//! The server keeps a single `bookingId -> Record` map. Every write loads the
//! map, changes it and saves it back under one lock, so concurrent requests
//! never lose each other's writes. Writes from different clients are
//! last-writer-wins.
//!
//! # Endpoints
//!
//! | method | path | response |
//! |---|---|---|
//! | GET | `/api/config` | `{ip, port, baseUrl}` |
//! | GET | `/api/patients` | full map |
//! | GET | `/api/patient/:id` | record, or 404 |
//! | POST | `/api/share` | `{success, message}`, 400 without `bookingId` |
//! | POST | `/api/save-all` | `{success, count}`, 400 for a non-object |
//! | DELETE | `/api/patient/:id` | `{success, message}` |
//! | DELETE | `/api/branch/:name` | `{success, deleted, remaining}` |
//! | GET | `/health` | `OK` |

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod cleaner;
mod config;
mod error;
mod handler;
mod server;
mod store;

pub use cleaner::StartupCleaner;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use handler::{HandlerContext, RequestHandler};
pub use server::SyncServer;
pub use store::{JsonFileStore, MemoryRecordStore, RecordStore};

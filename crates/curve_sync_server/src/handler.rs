//! Request handlers for record endpoints.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::store::RecordStore;
use curve_sync_protocol::{
    AckResponse, BranchResetResponse, ConfigResponse, Record, RecordMap, SaveAllResponse,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Context for request handling.
pub struct HandlerContext {
    /// Server configuration.
    pub config: ServerConfig,
    /// Record store (shared across all handlers).
    pub store: Arc<dyn RecordStore>,
    /// Serializes read-modify-write sequences on the store.
    write_lock: Mutex<()>,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: ServerConfig, store: Arc<dyn RecordStore>) -> Self {
        Self {
            config,
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Loads, mutates and saves the store under the write lock.
    ///
    /// `f` returns the value to hand back and whether the map changed; an
    /// unchanged map is not written.
    pub(crate) fn modify<T>(
        &self,
        f: impl FnOnce(&mut RecordMap) -> ServerResult<(T, bool)>,
    ) -> ServerResult<T> {
        let _guard = self.write_lock.lock();
        let mut records = self.store.load()?;
        let (value, changed) = f(&mut records)?;
        if changed {
            self.store.save(&records)?;
        }
        Ok(value)
    }
}

/// Handler for record requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// `GET /api/config`
    pub fn handle_config(&self) -> ConfigResponse {
        let config = &self.context.config;
        ConfigResponse {
            ip: config.reported_ip(),
            port: config.bind_addr.port(),
            base_url: config.public_base_url.clone(),
        }
    }

    /// `GET /api/patients`
    pub fn handle_patients(&self) -> ServerResult<RecordMap> {
        self.context.store.load()
    }

    /// `GET /api/patient/:id`
    pub fn handle_patient(&self, booking_id: &str) -> ServerResult<Record> {
        if !self.context.store.exists() {
            return Err(ServerError::NotFound("No shared data found.".into()));
        }
        self.context
            .store
            .load()?
            .remove(booking_id)
            .ok_or_else(|| ServerError::NotFound("Patient not found.".into()))
    }

    /// `POST /api/share`
    pub fn handle_share(&self, body: Value) -> ServerResult<AckResponse> {
        let invalid =
            || ServerError::InvalidRequest("Invalid patient data or missing bookingId".into());
        if !body.is_object() {
            return Err(invalid());
        }
        let record: Record = serde_json::from_value(body).map_err(|_| invalid())?;
        if !record.has_booking_id() {
            return Err(invalid());
        }

        let booking_id = record.booking_id.clone();
        self.context.modify(|records| {
            records.insert(booking_id.clone(), record);
            Ok(((), true))
        })?;
        debug!(%booking_id, "record shared");
        Ok(AckResponse::ok("Patient data shared successfully."))
    }

    /// `POST /api/save-all`
    ///
    /// Merges the body into the store; entries that are not records are
    /// skipped. `count` is the number of entries received.
    pub fn handle_save_all(&self, body: Value) -> ServerResult<SaveAllResponse> {
        let Value::Object(entries) = body else {
            return Err(ServerError::InvalidRequest("Invalid data".into()));
        };
        let count = entries.len();

        let mut incoming = RecordMap::new();
        for (key, entry) in entries {
            match serde_json::from_value::<Record>(entry) {
                Ok(mut record) => {
                    if !record.has_booking_id() {
                        record.booking_id = key.clone();
                    }
                    incoming.insert(key, record);
                }
                Err(e) => warn!(booking_id = %key, error = %e, "skipping undecodable record"),
            }
        }

        self.context.modify(|records| {
            records.extend(incoming);
            Ok(((), true))
        })?;
        info!(count, "records merged");
        Ok(SaveAllResponse {
            success: true,
            count,
        })
    }

    /// `DELETE /api/patient/:id`
    pub fn handle_delete_patient(&self, booking_id: &str) -> ServerResult<AckResponse> {
        if !self.context.store.exists() {
            return Ok(AckResponse {
                success: true,
                message: None,
            });
        }

        let removed = self.context.modify(|records| {
            let removed = records.remove(booking_id).is_some();
            Ok((removed, removed))
        })?;

        let message = if removed {
            info!(%booking_id, "record deleted");
            "Patient deleted successfully."
        } else {
            "Patient not found or already deleted."
        };
        Ok(AckResponse::ok(message))
    }

    /// `DELETE /api/branch/:name`
    pub fn handle_delete_branch(&self, name: &str) -> ServerResult<BranchResetResponse> {
        if !self.context.store.exists() {
            return Ok(BranchResetResponse {
                success: true,
                deleted: 0,
                remaining: 0,
            });
        }

        let branches = &self.context.config.branches;
        let (deleted, remaining) = self.context.modify(|records| {
            let before = records.len();
            records.retain(|_, r| !branches.matches_target(r.branch_str(), name));
            let deleted = before - records.len();
            Ok(((deleted, records.len()), true))
        })?;

        warn!(branch = %name, deleted, remaining, "branch wiped");
        Ok(BranchResetResponse {
            success: true,
            deleted,
            remaining,
        })
    }
}

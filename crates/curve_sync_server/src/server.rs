//! Main record server.

use crate::cleaner::StartupCleaner;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::handler::{HandlerContext, RequestHandler};
use crate::store::{MemoryRecordStore, RecordStore};
use curve_sync_protocol::{Endpoint, HttpRequest, HttpResponse, RecordMap};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// The record server.
///
/// Routes [`HttpRequest`]s to the record handlers and turns their results
/// into [`HttpResponse`]s with the same status codes and bodies a web client
/// expects. Binding a socket is left to the embedding application.
///
/// # Example
///
/// ```
/// use curve_sync_server::{SyncServer, ServerConfig};
/// use curve_sync_protocol::Endpoint;
///
/// let server = SyncServer::new(ServerConfig::default());
/// let response = server.handle(Endpoint::Health.request());
/// assert_eq!(response.body, b"OK");
/// ```
pub struct SyncServer {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl SyncServer {
    /// Creates a server over an in-memory store.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryRecordStore::new()))
    }

    /// Creates a server over an existing store.
    ///
    /// Runs the startup cleaner when enabled. A failing cleaner is logged and
    /// does not prevent the server from starting.
    pub fn with_store(config: ServerConfig, store: Arc<dyn RecordStore>) -> Self {
        let context = Arc::new(HandlerContext::new(config, store));
        if context.config.clean_on_startup {
            if let Err(e) = StartupCleaner::new(&context.config.ghosts).run(&context) {
                error!(error = %e, "startup clean failed");
            }
        }
        let handler = RequestHandler::new(Arc::clone(&context));

        Self { handler, context }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.context.config
    }

    /// Returns the request handler.
    pub fn handler(&self) -> &RequestHandler {
        &self.handler
    }

    /// Returns a copy of every stored record.
    pub fn records(&self) -> Result<RecordMap, ServerError> {
        self.context.store.load()
    }

    /// Returns the number of stored records, or 0 if the store is unreadable.
    pub fn record_count(&self) -> usize {
        self.records().map(|r| r.len()).unwrap_or(0)
    }

    /// Handles one request.
    pub fn handle(&self, request: HttpRequest) -> HttpResponse {
        let endpoint = match Endpoint::parse(request.method, &request.path) {
            Ok(Some(endpoint)) => endpoint,
            Ok(None) => {
                debug!(method = %request.method, path = %request.path, "no route");
                return HttpResponse::error(404, "Not found.");
            }
            Err(e) => return HttpResponse::error(400, &e.to_string()),
        };
        debug!(method = %request.method, path = %request.path, "request");

        match &endpoint {
            Endpoint::Health => HttpResponse::text(200, "OK"),
            Endpoint::Config => HttpResponse::json(200, &self.handler.handle_config()),
            Endpoint::Patients => respond(&endpoint, self.handler.handle_patients()),
            Endpoint::Patient(id) => respond(&endpoint, self.handler.handle_patient(id)),
            Endpoint::Share => match body(&request, "Invalid patient data or missing bookingId") {
                Ok(value) => respond(&endpoint, self.handler.handle_share(value)),
                Err(resp) => resp,
            },
            Endpoint::SaveAll => match body(&request, "Invalid data") {
                Ok(value) => respond(&endpoint, self.handler.handle_save_all(value)),
                Err(resp) => resp,
            },
            Endpoint::DeletePatient(id) => {
                respond(&endpoint, self.handler.handle_delete_patient(id))
            }
            Endpoint::DeleteBranch(name) => {
                respond(&endpoint, self.handler.handle_delete_branch(name))
            }
        }
    }
}

fn body(request: &HttpRequest, invalid: &str) -> Result<Value, HttpResponse> {
    request.decode_json().map_err(|e| {
        warn!(path = %request.path, error = %e, "request body is not JSON");
        HttpResponse::error(400, invalid)
    })
}

/// Message reported when a route fails on the server side.
fn failure_message(endpoint: &Endpoint) -> &'static str {
    match endpoint {
        Endpoint::Patients | Endpoint::Patient(_) => "Server error reading data.",
        Endpoint::Share => "Failed to save data on server.",
        Endpoint::SaveAll => "Failed to save all data.",
        Endpoint::DeletePatient(_) => "Failed to delete patient on server.",
        Endpoint::DeleteBranch(_) => "Failed to wipe branch.",
        Endpoint::Config | Endpoint::Health => "Internal server error.",
    }
}

fn respond<T: Serialize>(endpoint: &Endpoint, result: Result<T, ServerError>) -> HttpResponse {
    match result {
        Ok(value) => HttpResponse::json(200, &value),
        Err(e) if e.is_client_error() => HttpResponse::error(e.status(), &e.to_string()),
        Err(e) => {
            error!(endpoint = ?endpoint, error = %e, "request failed");
            HttpResponse::error(e.status(), failure_message(endpoint))
        }
    }
}

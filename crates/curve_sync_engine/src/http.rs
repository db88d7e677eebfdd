//! HTTP remote store implementation.
//!
//! This module maps [`RemoteStore`] onto the record server's JSON endpoints.
//! The actual HTTP client is abstracted via a trait so that any HTTP library,
//! or an in-process loopback, can carry the requests.

use crate::error::{SyncError, SyncResult};
use crate::transport::RemoteStore;
use async_trait::async_trait;
use curve_sync_protocol::{
    AckResponse, BranchResetResponse, ConfigResponse, Endpoint, HttpRequest, HttpResponse, Record,
    RecordMap, SaveAllResponse,
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a request to `url` and returns the response.
    ///
    /// `Err` means the request never produced a response (connection
    /// refused, DNS failure, timeout).
    async fn send(&self, url: &str, request: HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

/// HTTP-based remote store.
///
/// Uses JSON request and response bodies.
pub struct HttpRemoteStore<C: HttpClient> {
    /// Base URL of the record server (e.g., "http://x3dmanagement.com").
    base_url: String,
    /// HTTP client implementation.
    client: C,
    /// Last transport error message.
    last_error: RwLock<Option<String>>,
}

impl<C: HttpClient> HttpRemoteStore<C> {
    /// Creates a new HTTP remote store.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            last_error: RwLock::new(None),
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the last transport error message.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    /// Returns true if the underlying client reports itself healthy.
    pub fn is_connected(&self) -> bool {
        self.client.is_healthy()
    }

    async fn call(&self, request: HttpRequest) -> SyncResult<HttpResponse> {
        if !self.client.is_healthy() {
            return Err(SyncError::transport_retryable("client is not connected"));
        }

        let url = format!("{}{}", self.base_url, request.path);
        debug!(method = %request.method, %url, "remote call");

        let response = self.client.send(&url, request).await.map_err(|e| {
            *self.last_error.write() = Some(e.clone());
            SyncError::transport_retryable(e)
        })?;

        *self.last_error.write() = None;
        Ok(response)
    }

    async fn call_json<T: DeserializeOwned>(&self, request: HttpRequest) -> SyncResult<T> {
        let response = self.call(request).await?;
        decode(&response)
    }
}

fn status_error(response: &HttpResponse) -> SyncError {
    let message = response
        .error_message()
        .unwrap_or_else(|| format!("unexpected status {}", response.status));
    if response.status == 400 {
        SyncError::Validation(message)
    } else {
        SyncError::Server {
            status: response.status,
            message,
        }
    }
}

fn decode<T: DeserializeOwned>(response: &HttpResponse) -> SyncResult<T> {
    if !response.is_success() {
        return Err(status_error(response));
    }
    response
        .decode_json()
        .map_err(|e| SyncError::Protocol(format!("failed to decode response: {e}")))
}

/// Decodes a `bookingId -> Record` snapshot.
///
/// A body that is not a JSON object is malformed. Entries that do not decode
/// as records are skipped; an entry without a booking id takes its map key.
fn decode_snapshot(body: &[u8]) -> SyncResult<RecordMap> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| SyncError::MalformedSnapshot(e.to_string()))?;
    let Value::Object(entries) = value else {
        return Err(SyncError::MalformedSnapshot(
            "expected an object keyed by bookingId".into(),
        ));
    };

    let mut records = RecordMap::new();
    for (key, entry) in entries {
        match serde_json::from_value::<Record>(entry) {
            Ok(mut record) => {
                if !record.has_booking_id() {
                    record.booking_id = key.clone();
                }
                records.insert(key, record);
            }
            Err(e) => warn!(booking_id = %key, error = %e, "skipping undecodable record"),
        }
    }
    Ok(records)
}

#[async_trait]
impl<C: HttpClient> RemoteStore for HttpRemoteStore<C> {
    async fn fetch_config(&self) -> SyncResult<ConfigResponse> {
        self.call_json(Endpoint::Config.request()).await
    }

    async fn get_all(&self) -> SyncResult<RecordMap> {
        let response = self.call(Endpoint::Patients.request()).await?;
        if !response.is_success() {
            return Err(status_error(&response));
        }
        decode_snapshot(&response.body)
    }

    async fn get(&self, booking_id: &str) -> SyncResult<Option<Record>> {
        let response = self
            .call(Endpoint::Patient(booking_id.to_string()).request())
            .await?;
        if response.status == 404 {
            return Ok(None);
        }
        decode(&response).map(Some)
    }

    async fn put(&self, record: &Record) -> SyncResult<AckResponse> {
        let request = Endpoint::Share.request().with_json(record)?;
        self.call_json(request).await
    }

    async fn save_all(&self, records: &RecordMap) -> SyncResult<SaveAllResponse> {
        let request = Endpoint::SaveAll.request().with_json(records)?;
        self.call_json(request).await
    }

    async fn delete(&self, booking_id: &str) -> SyncResult<AckResponse> {
        self.call_json(Endpoint::DeletePatient(booking_id.to_string()).request())
            .await
    }

    async fn delete_by_branch(&self, branch: &str) -> SyncResult<BranchResetResponse> {
        self.call_json(Endpoint::DeleteBranch(branch.to_string()).request())
            .await
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a request and returns the response.
    fn handle(&self, request: HttpRequest) -> HttpResponse;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle(&self, request: HttpRequest) -> HttpResponse {
        (**self).handle(request)
    }
}

/// A loopback HTTP client that routes requests directly to a server.
///
/// Useful for testing and for tooling that runs next to the store, without
/// network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: S,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: S) -> Self {
        Self { server }
    }

    /// Returns the server.
    pub fn server(&self) -> &S {
        &self.server
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn send(&self, url: &str, mut request: HttpRequest) -> Result<HttpResponse, String> {
        // Strip scheme and host, keep the path.
        if let Some(i) = url.find("/api/").or_else(|| url.find("/health")) {
            request.path = url[i..].to_string();
        }
        Ok(self.server.handle(request))
    }
}

//! Wire messages and HTTP framing for the record server.
//!
//! The record server speaks plain JSON over HTTP. These types describe the
//! request line, the bodies and the responses of every endpoint so that the
//! client adapter and the server share one definition.

use crate::error::{ProtocolError, ProtocolResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// HTTP method used by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    /// GET.
    Get,
    /// POST.
    Post,
    /// DELETE.
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(s)
    }
}

/// A transport-neutral HTTP request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: HttpMethod,
    /// Path including any percent-encoded segments (no scheme or host).
    pub path: String,
    /// JSON body, if any.
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// Creates a request without a body.
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    /// Attaches a JSON body.
    pub fn with_json<T: Serialize>(mut self, body: &T) -> ProtocolResult<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Decodes the body as JSON. A missing body decodes as JSON `null`.
    pub fn decode_json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        let bytes = self.body.as_deref().unwrap_or(b"null");
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A transport-neutral HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Body bytes (JSON for every endpoint except health).
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a JSON response.
    pub fn json<T: Serialize>(status: u16, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, &format!("Failed to encode response: {e}")),
        }
    }

    /// Creates an `{"error": ...}` response.
    pub fn error(status: u16, message: &str) -> Self {
        let body = serde_json::to_vec(&ErrorResponse::new(message))
            .unwrap_or_else(|_| b"{\"error\":\"internal error\"}".to_vec());
        Self { status, body }
    }

    /// Creates a plain-text response.
    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.as_bytes().to_vec(),
        }
    }

    /// Returns true for 2xx statuses.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn decode_json<T: DeserializeOwned>(&self) -> ProtocolResult<T> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Returns the `error` field of an error body, if the body is one.
    pub fn error_message(&self) -> Option<String> {
        self.decode_json::<ErrorResponse>().ok().map(|e| e.error)
    }
}

/// Record server endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// `GET /api/config`
    Config,
    /// `GET /api/patients`
    Patients,
    /// `GET /api/patient/:id`
    Patient(String),
    /// `POST /api/share`
    Share,
    /// `POST /api/save-all`
    SaveAll,
    /// `DELETE /api/patient/:id`
    DeletePatient(String),
    /// `DELETE /api/branch/:name`
    DeleteBranch(String),
    /// `GET /health`
    Health,
}

impl Endpoint {
    /// Returns the HTTP method of the endpoint.
    pub fn method(&self) -> HttpMethod {
        match self {
            Endpoint::Config | Endpoint::Patients | Endpoint::Patient(_) | Endpoint::Health => {
                HttpMethod::Get
            }
            Endpoint::Share | Endpoint::SaveAll => HttpMethod::Post,
            Endpoint::DeletePatient(_) | Endpoint::DeleteBranch(_) => HttpMethod::Delete,
        }
    }

    /// Returns the request path, percent-encoding any path parameter.
    pub fn path(&self) -> String {
        match self {
            Endpoint::Config => "/api/config".into(),
            Endpoint::Patients => "/api/patients".into(),
            Endpoint::Patient(id) | Endpoint::DeletePatient(id) => {
                format!("/api/patient/{}", urlencoding::encode(id))
            }
            Endpoint::Share => "/api/share".into(),
            Endpoint::SaveAll => "/api/save-all".into(),
            Endpoint::DeleteBranch(name) => format!("/api/branch/{}", urlencoding::encode(name)),
            Endpoint::Health => "/health".into(),
        }
    }

    /// Builds a body-less request for this endpoint.
    pub fn request(&self) -> HttpRequest {
        HttpRequest::new(self.method(), self.path())
    }

    /// Resolves a method and path to an endpoint.
    ///
    /// Returns `Ok(None)` for unknown routes. Query strings are ignored.
    pub fn parse(method: HttpMethod, path: &str) -> ProtocolResult<Option<Self>> {
        let path = path.split('?').next().unwrap_or(path);
        let path = path.strip_suffix('/').filter(|p| !p.is_empty()).unwrap_or(path);

        let endpoint = match (method, path) {
            (HttpMethod::Get, "/api/config") => Some(Endpoint::Config),
            (HttpMethod::Get, "/api/patients") => Some(Endpoint::Patients),
            (HttpMethod::Post, "/api/share") => Some(Endpoint::Share),
            (HttpMethod::Post, "/api/save-all") => Some(Endpoint::SaveAll),
            (HttpMethod::Get, "/health") => Some(Endpoint::Health),
            (HttpMethod::Get, p) => match param(p, "/api/patient/")? {
                Some(id) => Some(Endpoint::Patient(id)),
                None => None,
            },
            (HttpMethod::Delete, p) => {
                if let Some(id) = param(p, "/api/patient/")? {
                    Some(Endpoint::DeletePatient(id))
                } else {
                    param(p, "/api/branch/")?.map(Endpoint::DeleteBranch)
                }
            }
            _ => None,
        };
        Ok(endpoint)
    }
}

fn param(path: &str, prefix: &str) -> ProtocolResult<Option<String>> {
    let Some(raw) = path.strip_prefix(prefix) else {
        return Ok(None);
    };
    if raw.is_empty() || raw.contains('/') {
        return Ok(None);
    }
    urlencoding::decode(raw)
        .map(|s| Some(s.into_owned()))
        .map_err(|_| ProtocolError::InvalidPath(raw.to_string()))
}

/// `GET /api/config` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigResponse {
    /// Address the server is reachable on inside the clinic network.
    pub ip: String,
    /// Listening port.
    pub port: u16,
    /// Public base URL.
    pub base_url: String,
}

/// Generic `{success, message}` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AckResponse {
    /// Whether the operation succeeded.
    pub success: bool,
    /// Human-readable detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AckResponse {
    /// Creates a successful acknowledgement.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }
}

/// `POST /api/save-all` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAllResponse {
    /// Whether the merge succeeded.
    pub success: bool,
    /// Number of records received.
    pub count: usize,
}

/// `DELETE /api/branch/:name` response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchResetResponse {
    /// Whether the reset succeeded.
    pub success: bool,
    /// Records removed.
    #[serde(default)]
    pub deleted: usize,
    /// Records left in the store.
    #[serde(default)]
    pub remaining: usize,
}

/// `{"error": ...}` body returned with every non-2xx status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

impl ErrorResponse {
    /// Creates an error body.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

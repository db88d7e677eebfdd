//! Error types for protocol encoding and routing.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or routing messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A path segment was not valid percent-encoded UTF-8.
    #[error("invalid path segment: {0}")]
    InvalidPath(String),

    /// A record was submitted without a booking id.
    #[error("record is missing bookingId")]
    MissingBookingId,
}

//! Error types for the sync engine.

use curve_storage::StorageError;
use curve_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// A required field was missing; rejected before any I/O.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The remote snapshot was not a `bookingId -> Record` object.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The server answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Local storage failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if this error can be retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns true for validation failures.
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }

    /// Message shown to the user. Every transport failure reads the same.
    pub fn user_message(&self) -> String {
        match self {
            SyncError::Transport { .. } => "Connection failed".into(),
            SyncError::Validation(msg) => msg.clone(),
            SyncError::Server { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::MissingBookingId => SyncError::Validation(err.to_string()),
            other => SyncError::Protocol(other.to_string()),
        }
    }
}

//! Error types for the record server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the record server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request body or path.
    #[error("{0}")]
    InvalidRequest(String),

    /// The requested record does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The store file exists but cannot be decoded.
    #[error("store is corrupt: {0}")]
    CorruptStore(String),

    /// Encoding failed.
    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ServerError::InvalidRequest(_) | ServerError::NotFound(_))
    }

    /// Returns true if this is a server error (5xx).
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// HTTP status code for this error.
    pub fn status(&self) -> u16 {
        match self {
            ServerError::InvalidRequest(_) => 400,
            ServerError::NotFound(_) => 404,
            _ => 500,
        }
    }
}

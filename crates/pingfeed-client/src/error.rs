//! Error types for the backend client

use thiserror::Error;

/// Backend client error
#[derive(Debug, Error)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Row or object not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Write rejected because the row changed or already exists
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or rejected credentials
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Invalid response from server
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Client could not be constructed from its configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Base64 decode error
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, ClientError>;

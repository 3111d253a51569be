//! Error types for the pingfeed SDK

use thiserror::Error;

/// Result type for SDK operations
pub type Result<T> = std::result::Result<T, SdkError>;

/// SDK error types
#[derive(Error, Debug)]
pub enum SdkError {
    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Acting identity or target key not resolved yet
    #[error("Unresolved: {0}")]
    Unresolved(String),

    /// Input rejected before touching the store
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Concurrent writers kept winning the race for this key
    #[error("Write conflict on {key} after {attempts} attempts")]
    Conflict { key: String, attempts: u32 },

    /// Store or network error
    #[error("Storage error: {0}")]
    Store(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local file error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<pingfeed_client::ClientError> for SdkError {
    fn from(err: pingfeed_client::ClientError) -> Self {
        use pingfeed_client::ClientError;

        match err {
            ClientError::NotFound(what) => SdkError::NotFound(what),
            ClientError::Conflict(key) => SdkError::Conflict { key, attempts: 1 },
            ClientError::Unauthorized(msg) => SdkError::Unresolved(msg),
            ClientError::Config(msg) => SdkError::Config(msg),
            ClientError::Base64(e) => SdkError::Validation(e.to_string()),
            other => SdkError::Store(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

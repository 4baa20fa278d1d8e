//! Error types for storage client

use thiserror::Error;

/// Storage client error
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP request failed
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Server returned an error
    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    /// Object already exists at the destination path (uploads never upsert)
    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    /// Client could not be constructed from its configuration
    #[error("Invalid storage configuration: {0}")]
    Config(String),
}

impl StorageError {
    /// True when the failure happened before the store answered
    pub fn is_transport(&self) -> bool {
        matches!(self, StorageError::Http(e) if e.is_connect() || e.is_timeout())
    }
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

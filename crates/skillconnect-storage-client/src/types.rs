//! Types for storage client API

use serde::{Deserialize, Serialize};

/// Client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base URL of the object store (no trailing slash)
    pub base_url: String,
    /// Bucket that holds post media
    pub bucket: String,
    /// API key sent as bearer credential and `apikey` header
    pub api_key: Option<String>,
    /// Request timeout in seconds (default: 60)
    pub timeout_secs: u64,
    /// `cache-control` max-age for uploaded objects, in seconds
    pub cache_control_secs: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            bucket: "skillconnect".to_string(),
            api_key: None,
            timeout_secs: 60,
            cache_control_secs: 3600,
        }
    }
}

/// A successfully stored object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredObject {
    /// Path inside the bucket
    pub path: String,
    /// Publicly retrievable reference
    pub public_url: String,
}

/// Upload response body
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct UploadResponse {
    #[serde(rename = "Key", default)]
    pub key: Option<String>,
}

/// Error body returned by the store
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

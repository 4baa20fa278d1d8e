//! HTTP client for the media object store

use crate::error::{Result, StorageError};
use crate::store::ObjectStore;
use crate::types::*;
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

/// HTTP client for the media object store
///
/// # Example
///
/// ```rust,no_run
/// use skillconnect_storage_client::{ObjectStore, StorageClient, StorageConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = StorageClient::new(StorageConfig {
///     base_url: "http://localhost:54321".into(),
///     api_key: Some("anon-key".into()),
///     ..Default::default()
/// })?;
///
/// let stored = client
///     .upload("posts/7/1700000000000-abc.png", vec![0x89, 0x50], "image/png")
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct StorageClient {
    config: StorageConfig,
    client: Client,
}

impl StorageClient {
    /// Create a new storage client
    ///
    /// Fails when the configuration cannot produce a working HTTP client;
    /// callers treat that as "upload service unavailable".
    pub fn new(config: StorageConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(StorageError::Config("base_url is empty".into()));
        }
        if config.bucket.trim().is_empty() {
            return Err(StorageError::Config("bucket is empty".into()));
        }

        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            let bearer = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|e| StorageError::Config(format!("invalid API key: {}", e)))?;
            let raw = header::HeaderValue::from_str(api_key)
                .map_err(|e| StorageError::Config(format!("invalid API key: {}", e)))?;
            headers.insert(header::AUTHORIZATION, bearer);
            headers.insert("apikey", raw);
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StorageError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    /// Get the client configuration
    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            encode_path(path)
        )
    }

    // ==================== Helper Methods ====================

    async fn handle_error(&self, path: &str, response: reqwest::Response) -> StorageError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ErrorBody> = serde_json::from_str(&body).ok();

        let message = parsed
            .as_ref()
            .and_then(|b| b.message.clone().or_else(|| b.error.clone()))
            .unwrap_or(body);

        if status == StatusCode::CONFLICT || message.contains("already exists") {
            return StorageError::AlreadyExists(path.to_string());
        }

        StorageError::Server {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl ObjectStore for StorageClient {
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject> {
        let url = self.object_url(path);
        debug!(path, bytes = data.len(), content_type, "Uploading object");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, content_type)
            .header(
                header::CACHE_CONTROL,
                format!("max-age={}", self.config.cache_control_secs),
            )
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(self.handle_error(path, response).await);
        }

        // The body only echoes the key; a missing or odd body is not a failure.
        let text = response.text().await.unwrap_or_default();
        if let Ok(body) = serde_json::from_str::<UploadResponse>(&text) {
            debug!(key = ?body.key, "Object stored");
        }

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.bucket,
            encode_path(path)
        )
    }
}

/// Percent-encode each path segment, keeping the separators
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

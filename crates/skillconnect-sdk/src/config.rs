//! Client configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, SdkError};

/// Top-level client configuration, loaded from TOML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageSettings,
    #[serde(default)]
    pub media: MediaConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub client: LocalConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// REST service root, including the `/api` prefix
    #[serde(default = "default_api_url")]
    pub base_url: String,

    /// A call with no response after this long takes the failure path
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Object storage settings
///
/// Both `base_url` and `api_key` must be present for the uploader to be
/// constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            base_url: None,
            bucket: default_bucket(),
            api_key: None,
            timeout_secs: default_storage_timeout(),
        }
    }
}

impl StorageSettings {
    /// Storage client configuration, or `None` when the service is not
    /// configured
    pub fn client_config(&self) -> Option<skillconnect_storage_client::StorageConfig> {
        let base_url = self.base_url.as_deref().filter(|u| !u.trim().is_empty())?;
        let api_key = self.api_key.as_deref().filter(|k| !k.trim().is_empty())?;

        Some(skillconnect_storage_client::StorageConfig {
            base_url: base_url.to_string(),
            bucket: self.bucket.clone(),
            api_key: Some(api_key.to_string()),
            timeout_secs: self.timeout_secs,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Media files per post
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Longest accepted video, inclusive
    #[serde(default = "default_max_video_secs")]
    pub max_video_secs: f64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            max_files: default_max_files(),
            max_video_secs: default_max_video_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    #[serde(default = "default_poll_interval")]
    pub unread_interval_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub banner_interval_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            unread_interval_secs: default_poll_interval(),
            banner_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory holding the durable client-side key store. In-memory when
    /// unset.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

// Defaults
fn default_api_url() -> String { "http://localhost:8080/api".to_string() }
fn default_request_timeout() -> u64 { 15 }
fn default_bucket() -> String { "skillconnect".to_string() }
fn default_storage_timeout() -> u64 { 60 }
fn default_max_files() -> usize { 3 }
fn default_max_video_secs() -> f64 { 30.0 }
fn default_poll_interval() -> u64 { 60 }

impl ClientConfig {
    /// Load configuration from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|e| SdkError::Config(format!("reading {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw).map_err(|e| SdkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(self) -> Self {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup("SKILLCONNECT_API_URL") {
            self.api.base_url = url;
        }
        if let Some(url) = lookup("SKILLCONNECT_STORAGE_URL") {
            self.storage.base_url = Some(url);
        }
        if let Some(key) = lookup("SKILLCONNECT_STORAGE_KEY") {
            self.storage.api_key = Some(key);
        }
        if let Some(dir) = lookup("SKILLCONNECT_STATE_DIR") {
            self.client.state_dir = Some(PathBuf::from(dir));
        }
        self
    }

    fn validate(&self) -> Result<()> {
        if self.media.max_files == 0 {
            return Err(SdkError::Config("media.max_files must be at least 1".into()));
        }
        if !(self.media.max_video_secs > 0.0) {
            return Err(SdkError::Config("media.max_video_secs must be positive".into()));
        }
        if self.api.request_timeout_secs == 0 {
            return Err(SdkError::Config("api.request_timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

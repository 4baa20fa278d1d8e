//! Object store abstraction
//!
//! The media pipeline depends on this trait rather than on the HTTP client so
//! a session can run against an in-memory store in tests.

use crate::error::{Result, StorageError};
use crate::types::StoredObject;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

/// Destination for uploaded media
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` at `path`; never overwrites an existing object.
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject>;

    /// Public retrieval reference for `path`
    fn public_url(&self, path: &str) -> String;
}

/// In-memory object store
///
/// Can be told to fail the n-th upload (1-based) to exercise batch failure.
pub struct MemoryObjectStore {
    base_url: String,
    objects: Mutex<HashMap<String, (String, Vec<u8>)>>,
    upload_count: AtomicU32,
    fail_on: Option<u32>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self {
            base_url: "memory://objects".to_string(),
            objects: Mutex::new(HashMap::new()),
            upload_count: AtomicU32::new(0),
            fail_on: None,
        }
    }

    /// Fail the n-th upload attempt (1-based).
    pub fn failing_on(mut self, attempt: u32) -> Self {
        self.fail_on = Some(attempt);
        self
    }

    /// Number of upload attempts seen
    pub fn upload_count(&self) -> u32 {
        self.upload_count.load(Ordering::SeqCst)
    }

    /// Paths currently stored
    pub fn paths(&self) -> Vec<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<String> = objects.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Content type recorded for `path`
    pub fn content_type(&self, path: &str) -> Option<String> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        objects.get(path).map(|(ct, _)| ct.clone())
    }
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn upload(&self, path: &str, data: Vec<u8>, content_type: &str) -> Result<StoredObject> {
        let attempt = self.upload_count.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(attempt) {
            return Err(StorageError::Server {
                status: 503,
                message: format!("simulated failure on upload {}", attempt),
            });
        }

        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        if objects.contains_key(path) {
            return Err(StorageError::AlreadyExists(path.to_string()));
        }
        objects.insert(path.to_string(), (content_type.to_string(), data));

        Ok(StoredObject {
            path: path.to_string(),
            public_url: self.public_url(path),
        })
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

//! Bearer credential lookup

use std::sync::Arc;

use crate::kv::KeyValueStore;

/// Durable key holding the bearer token
pub const TOKEN_KEY: &str = "token";

/// Supplies the bearer credential attached to every gateway call
pub trait CredentialSource: Send + Sync {
    fn bearer_token(&self) -> Option<String>;

    /// Drop the credential after the service rejected it
    fn clear(&self) {}
}

/// Fixed token, for tools and tests
pub struct StaticCredential(Option<String>);

impl StaticCredential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Some(token.into()))
    }

    pub fn anonymous() -> Self {
        Self(None)
    }
}

impl CredentialSource for StaticCredential {
    fn bearer_token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Token read from the durable client-side store on every call
pub struct KeyValueCredential {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueCredential {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

impl CredentialSource for KeyValueCredential {
    fn bearer_token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }

    fn clear(&self) {
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            tracing::warn!("Failed to clear stored token: {}", e);
        }
    }
}

//! Local preview references for picked files
//!
//! A [`PreviewHandle`] stands for a locally created object URL. Handles are
//! not `Clone` and [`PreviewHandle::release`] consumes the handle, so each
//! one can be released at most once; dropping an unreleased handle is a
//! leak and shows up in [`PreviewRegistry::outstanding`].

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Default)]
struct Ledger {
    live: HashSet<Uuid>,
    created: u64,
    released: u64,
}

/// Issues and tracks preview handles
#[derive(Clone, Default)]
pub struct PreviewRegistry {
    ledger: Arc<Mutex<Ledger>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, file_name: &str) -> PreviewHandle {
        let id = Uuid::new_v4();
        let mut ledger = self.lock();
        ledger.live.insert(id);
        ledger.created += 1;
        debug!(%id, file_name, "Created preview");

        PreviewHandle {
            id,
            registry: self.clone(),
        }
    }

    /// Handles created but not yet released
    pub fn outstanding(&self) -> usize {
        self.lock().live.len()
    }

    pub fn created(&self) -> u64 {
        self.lock().created
    }

    pub fn released(&self) -> u64 {
        self.lock().released
    }

    fn release(&self, id: Uuid) {
        let mut ledger = self.lock();
        if ledger.live.remove(&id) {
            ledger.released += 1;
            debug!(%id, "Released preview");
        } else {
            warn!(%id, "Preview released twice");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A live preview reference
#[derive(Debug)]
pub struct PreviewHandle {
    id: Uuid,
    registry: PreviewRegistry,
}

impl PreviewHandle {
    /// `blob:` URL the view layer can render
    pub fn url(&self) -> String {
        format!("blob:skillconnect/{}", self.id)
    }

    pub fn release(self) {
        self.registry.release(self.id);
    }
}

impl std::fmt::Debug for PreviewRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ledger = self.lock();
        f.debug_struct("PreviewRegistry")
            .field("outstanding", &ledger.live.len())
            .field("created", &ledger.created)
            .field("released", &ledger.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_release() {
        let registry = PreviewRegistry::new();
        let a = registry.create("a.png");
        let b = registry.create("b.mp4");
        assert_ne!(a.url(), b.url());
        assert!(a.url().starts_with("blob:skillconnect/"));
        assert_eq!(registry.outstanding(), 2);

        a.release();
        assert_eq!(registry.outstanding(), 1);
        b.release();
        assert_eq!(registry.outstanding(), 0);
        assert_eq!(registry.created(), 2);
        assert_eq!(registry.released(), 2);
    }

    #[test]
    fn test_dropped_handle_is_a_leak() {
        let registry = PreviewRegistry::new();
        drop(registry.create("a.png"));
        assert_eq!(registry.outstanding(), 1);
    }
}

//! Optimistic mutation engine
//!
//! Each store owns one kind of client-side collection. A mutation is applied
//! to the collection first (readers see it before the remote call is
//! dispatched), then the matching gateway call runs with the lock released,
//! and the response is reconciled through an [`IntentLedger`]. Derived
//! values (progress, counts) are always computed from the collection.
//!
//! Remote failures never escape as `Err`: they come back as
//! [`Outcome::Reverted`] or [`Outcome::Resynced`] and are published through
//! the [`Notifier`]. `Err` is reserved for input that was rejected before
//! anything was applied.

pub mod engagement;
pub mod feed;
pub mod follows;
pub mod intent;
pub mod notifications;
pub mod plans;
pub mod updates;

pub use engagement::EngagementStore;
pub use feed::FeedStore;
pub use follows::FollowStore;
pub use intent::{Acknowledged, FieldPhase, IntentId, IntentLedger, Outcome};
pub use notifications::NotificationStore;
pub use plans::PlanStore;
pub use updates::LearningUpdateStore;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::warn;

use crate::error::{Result, SdkError};
use crate::gateway::RemoteGateway;
use crate::model::UserId;
use crate::notice::{Action, Notifier};
use crate::task::with_timeout;

/// Default deadline for a single gateway call
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(15);

/// What every store needs: the gateway, the notice channel, who is acting,
/// and how long to wait for the server
#[derive(Clone)]
pub struct StoreContext {
    pub gateway: Arc<dyn RemoteGateway>,
    pub notifier: Notifier,
    pub user_id: UserId,
    pub timeout: Duration,
}

impl StoreContext {
    pub fn new(gateway: Arc<dyn RemoteGateway>, notifier: Notifier, user_id: UserId) -> Self {
        Self {
            gateway,
            notifier,
            user_id,
            timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run a gateway call under the configured deadline
    pub(crate) async fn call<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        with_timeout(self.timeout, fut).await
    }

    /// Publish a failure notice for `action`
    pub(crate) fn report(&self, action: Action, what: &str, err: &SdkError) {
        warn!(?action, error = %err, "{}", what);
        let message = match err {
            SdkError::Unauthorized => format!("{}: your session has expired, sign in again", what),
            e if e.is_transport() => format!("{}: the server could not be reached", what),
            e => format!("{}: {}", what, e),
        };
        self.notifier.error(action, message);
    }

    /// Publish a warning for a superseded intent the server rejected
    pub(crate) fn report_stale(&self, action: Action, what: &str, err: &SdkError) {
        warn!(?action, error = %err, "{} (superseded)", what);
        self.notifier
            .warn(action, format!("{}: an earlier change was rejected ({})", what, err));
    }
}

/// Change counter the view layer can watch
pub struct Revision {
    tx: watch::Sender<u64>,
}

impl Revision {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(0);
        Self { tx }
    }

    pub fn bump(&self) {
        self.tx.send_modify(|v| *v += 1);
    }

    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }
}

impl Default for Revision {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(what: impl Into<String>) -> SdkError {
    SdkError::NotFound(what.into())
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SdkError::Validation(format!("{} cannot be empty", field)));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::notice::drain;

    #[test]
    fn test_require_text() {
        assert_eq!(require_text("comment", "  hi ").unwrap(), "hi");
        assert!(matches!(require_text("comment", "   "), Err(SdkError::Validation(_))));
    }

    #[test]
    fn test_report_distinguishes_transport() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let ctx = StoreContext::new(Arc::new(MockGateway::new()), notifier, 7);

        ctx.report(Action::Like { post_id: 1 }, "Could not like post 1", &SdkError::Timeout(15));
        ctx.report(
            Action::Like { post_id: 1 },
            "Could not like post 1",
            &SdkError::RemoteRejected { status: 400, message: "nope".into() },
        );

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 2);
        assert_ne!(notices[0].message, notices[1].message);
        assert!(notices[1].message.contains("nope"));
    }

    #[test]
    fn test_revision_counts() {
        let revision = Revision::new();
        let rx = revision.subscribe();
        revision.bump();
        revision.bump();
        assert_eq!(revision.current(), 2);
        assert_eq!(*rx.borrow(), 2);
    }
}

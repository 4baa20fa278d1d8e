//! Admin broadcast banner
//!
//! Only the newest message is shown. Dismissing it stores its id under
//! [`DISMISSED_KEY`]; the banner stays hidden while that id is still the
//! newest, and comes back as soon as a newer message arrives.

use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::Result;
use crate::gateway::RemoteGateway;
use crate::kv::KeyValueStore;
use crate::model::{BroadcastMessage, MessageId};
use crate::notice::{Action, Notifier};
use crate::task::with_timeout;

/// Durable key holding the last dismissed message id
pub const DISMISSED_KEY: &str = "lastClosedAdminMessageId";

const IMPORTANT_WORDS: [&str; 3] = ["important", "urgent", "alert"];

/// True for high-priority messages and titles that sound urgent
pub fn is_important(message: &BroadcastMessage) -> bool {
    if message
        .priority
        .as_deref()
        .is_some_and(|p| p.eq_ignore_ascii_case("high"))
    {
        return true;
    }
    let title = message.title.to_lowercase();
    IMPORTANT_WORDS.iter().any(|w| title.contains(w))
}

/// Newest message by creation time; undated messages rank last
pub fn newest(messages: &[BroadcastMessage]) -> Option<&BroadcastMessage> {
    messages
        .iter()
        .max_by_key(|m| (m.created_at.is_some(), m.created_at, m.message_id))
}

pub struct BannerTracker {
    gateway: Arc<dyn RemoteGateway>,
    kv: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    timeout: std::time::Duration,
    latest: Mutex<Option<BroadcastMessage>>,
}

impl BannerTracker {
    pub fn new(
        gateway: Arc<dyn RemoteGateway>,
        kv: Arc<dyn KeyValueStore>,
        notifier: Notifier,
        timeout: std::time::Duration,
    ) -> Self {
        Self {
            gateway,
            kv,
            notifier,
            timeout,
            latest: Mutex::new(None),
        }
    }

    /// Fetch messages and return the banner to show, if any
    pub async fn refresh(&self) -> Result<Option<BroadcastMessage>> {
        let messages = match with_timeout(self.timeout, self.gateway.admin_messages()).await {
            Ok(messages) => messages,
            Err(err) => {
                warn!(error = %err, "Could not load broadcast messages");
                self.notifier.warn(
                    Action::Refresh { what: "announcements".into() },
                    format!("Could not load announcements: {}", err),
                );
                return Err(err);
            }
        };

        let latest = newest(&messages).cloned();
        debug!(
            count = messages.len(),
            latest = ?latest.as_ref().map(|m| m.message_id),
            "Loaded broadcast messages"
        );
        *self.lock() = latest;
        Ok(self.visible())
    }

    /// The newest message unless the user already dismissed it
    pub fn visible(&self) -> Option<BroadcastMessage> {
        let latest = self.lock().clone()?;
        if self.last_dismissed() == Some(latest.message_id) {
            return None;
        }
        Some(latest)
    }

    pub fn last_dismissed(&self) -> Option<MessageId> {
        self.kv.get(DISMISSED_KEY)?.trim().parse().ok()
    }

    /// Hide the current banner, across restarts
    pub fn dismiss(&self) -> Result<()> {
        let Some(id) = self.lock().as_ref().map(|m| m.message_id) else {
            return Ok(());
        };
        self.kv.set(DISMISSED_KEY, &id.to_string())?;
        debug!(message_id = id, "Dismissed banner");
        Ok(())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<BroadcastMessage>> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

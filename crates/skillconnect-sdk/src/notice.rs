//! User-visible failure signal
//!
//! Every failed mutation and every rejected media selection is published as
//! a [`Notice`] naming the action the user took. The view layer subscribes
//! and renders them; nothing here depends on a subscriber being present.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

use crate::model::*;

/// Default channel capacity
const DEFAULT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// The user intent a notice is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    ToggleItem { plan_id: PlanId, item_id: ItemId },
    RenameItem { plan_id: PlanId, item_id: ItemId },
    AddItem { plan_id: PlanId },
    DeleteItem { plan_id: PlanId, item_id: ItemId },
    EditPlan { plan_id: PlanId },
    CreatePlan,
    DeletePlan { plan_id: PlanId },
    Like { post_id: PostId },
    Unlike { post_id: PostId },
    AddComment { post_id: PostId },
    EditComment { post_id: PostId, comment_id: CommentId },
    DeleteComment { post_id: PostId, comment_id: CommentId },
    Follow { user_id: UserId },
    Unfollow { user_id: UserId },
    ChangeStatus { update_id: UpdateId },
    DeleteUpdate { update_id: UpdateId },
    MarkRead { notification_id: NotificationId },
    MarkAllRead,
    DeleteNotification { notification_id: NotificationId },
    DeleteAllNotifications,
    CreatePost,
    DeletePost { post_id: PostId },
    SelectMedia,
    UploadMedia { file_index: usize },
    Refresh { what: String },
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub action: Action,
    pub message: String,
}

/// Broadcast publisher for notices
///
/// Cheap to clone; clones share the channel and id sequence.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Notice>,
    next_id: Arc<AtomicU64>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Publish a notice. Sending with no subscribers is not an error.
    pub fn publish(&self, level: NoticeLevel, action: Action, message: impl Into<String>) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let notice = Notice {
            id,
            level,
            action,
            message: message.into(),
        };
        if self.tx.send(notice).is_err() {
            debug!(id, "Notice published with no subscribers");
        }
        id
    }

    pub fn error(&self, action: Action, message: impl Into<String>) -> u64 {
        self.publish(NoticeLevel::Error, action, message)
    }

    pub fn warn(&self, action: Action, message: impl Into<String>) -> u64 {
        self.publish(NoticeLevel::Warning, action, message)
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain whatever notices are buffered on `rx` without waiting
pub fn drain(rx: &mut broadcast::Receiver<Notice>) -> Vec<Notice> {
    let mut notices = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(notice) => notices.push(notice),
            Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    notices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let notifier = Notifier::new();
        let id = notifier.error(Action::CreatePost, "failed");
        assert_eq!(id, 1);
    }

    #[test]
    fn test_subscriber_receives_attributed_notice() {
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();

        notifier.error(Action::ToggleItem { plan_id: 1, item_id: 2 }, "Could not update item");
        notifier.warn(Action::UploadMedia { file_index: 1 }, "slow");

        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 2);
        assert_eq!(notices[0].action, Action::ToggleItem { plan_id: 1, item_id: 2 });
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[1].id, 2);
    }
}

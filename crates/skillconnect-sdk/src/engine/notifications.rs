//! Per-user notifications
//!
//! The unread count is derived from the list. Read markers and deletions
//! use targeted revert; `refresh` replaces the list wholesale and is what
//! the unread poller calls.

use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::intent::{Acknowledged, IntentLedger, Outcome};
use super::{not_found, Revision, StoreContext};
use crate::error::Result;
use crate::model::*;
use crate::notice::Action;

#[derive(Default)]
struct NotificationState {
    items: Vec<Notification>,
    read: IntentLedger<NotificationId, bool>,
}

pub struct NotificationStore {
    ctx: StoreContext,
    state: RwLock<NotificationState>,
    revision: Revision,
}

impl NotificationStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(NotificationState::default()),
            revision: Revision::new(),
        }
    }

    pub async fn notifications(&self) -> Vec<Notification> {
        self.state.read().await.items.clone()
    }

    pub async fn unread_count(&self) -> usize {
        self.state
            .read()
            .await
            .items
            .iter()
            .filter(|n| !n.is_read)
            .count()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Replace local notifications with the server's list
    pub async fn refresh(&self) -> Result<usize> {
        let fetched = self
            .ctx
            .call(self.ctx.gateway.notifications(self.ctx.user_id))
            .await;

        match fetched {
            Ok(items) => {
                let mut state = self.state.write().await;
                state.items = items;
                state.read.clear();
                let unread = state.items.iter().filter(|n| !n.is_read).count();
                drop(state);
                self.revision.bump();
                debug!(unread, "Refreshed notifications");
                Ok(unread)
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: "notifications".into() },
                    "Could not load notifications",
                    &err,
                );
                Err(err)
            }
        }
    }

    pub async fn mark_read(&self, notification_id: NotificationId) -> Result<Outcome> {
        let intent = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let item = state
                .items
                .iter_mut()
                .find(|n| n.notification_id == notification_id)
                .ok_or_else(|| not_found(format!("notification {}", notification_id)))?;
            if item.is_read {
                return Ok(Outcome::Confirmed(()));
            }
            item.is_read = true;
            state.read.begin(notification_id, false)
        };
        self.revision.bump();

        let result = self
            .ctx
            .call(self.ctx.gateway.mark_notification_read(notification_id))
            .await;

        let action = Action::MarkRead { notification_id };
        let what = format!("Could not mark notification {} as read", notification_id);
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => Ok(match state.read.confirm(&notification_id, intent, true) {
                Acknowledged::Current => Outcome::Confirmed(()),
                Acknowledged::Stale => Outcome::Superseded,
            }),
            Err(err) => match state.read.fail(&notification_id, intent) {
                Some(baseline) => {
                    if let Some(item) = state
                        .items
                        .iter_mut()
                        .find(|n| n.notification_id == notification_id)
                    {
                        item.is_read = baseline;
                    }
                    drop(guard);
                    self.revision.bump();
                    self.ctx.report(action, &what, &err);
                    Ok(Outcome::Reverted(err))
                }
                None => {
                    drop(guard);
                    self.ctx.report_stale(action, &what, &err);
                    Ok(Outcome::Superseded)
                }
            },
        }
    }

    pub async fn mark_all_read(&self) -> Result<Outcome> {
        let intents = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let mut intents = Vec::new();
            for item in state.items.iter_mut().filter(|n| !n.is_read) {
                item.is_read = true;
                intents.push((item.notification_id, state.read.begin(item.notification_id, false)));
            }
            intents
        };
        if intents.is_empty() {
            return Ok(Outcome::Confirmed(()));
        }
        self.revision.bump();

        let result = self
            .ctx
            .call(self.ctx.gateway.mark_all_notifications_read(self.ctx.user_id))
            .await;

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => {
                for (id, intent) in intents {
                    state.read.confirm(&id, intent, true);
                }
                Ok(Outcome::Confirmed(()))
            }
            Err(err) => {
                let mut reverted = 0;
                for (id, intent) in intents {
                    if let Some(baseline) = state.read.fail(&id, intent) {
                        if let Some(item) = state.items.iter_mut().find(|n| n.notification_id == id) {
                            item.is_read = baseline;
                            reverted += 1;
                        }
                    }
                }
                drop(guard);
                self.revision.bump();
                self.ctx
                    .report(Action::MarkAllRead, "Could not mark notifications as read", &err);
                debug!(reverted, "Reverted read markers");
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn delete(&self, notification_id: NotificationId) -> Result<Outcome> {
        let (index, removed) = {
            let mut state = self.state.write().await;
            let index = state
                .items
                .iter()
                .position(|n| n.notification_id == notification_id)
                .ok_or_else(|| not_found(format!("notification {}", notification_id)))?;
            let removed = state.items.remove(index);
            state.read.forget(&notification_id);
            (index, removed)
        };
        self.revision.bump();

        match self
            .ctx
            .call(self.ctx.gateway.delete_notification(notification_id))
            .await
        {
            Ok(()) => Ok(Outcome::Confirmed(())),
            Err(err) => {
                let mut state = self.state.write().await;
                if !state.items.iter().any(|n| n.notification_id == notification_id) {
                    let at = index.min(state.items.len());
                    state.items.insert(at, removed);
                }
                drop(state);
                self.revision.bump();
                self.ctx.report(
                    Action::DeleteNotification { notification_id },
                    &format!("Could not delete notification {}", notification_id),
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn delete_all(&self) -> Result<Outcome> {
        let removed = {
            let mut state = self.state.write().await;
            state.read.clear();
            std::mem::take(&mut state.items)
        };
        self.revision.bump();

        match self
            .ctx
            .call(self.ctx.gateway.delete_all_notifications(self.ctx.user_id))
            .await
        {
            Ok(()) => Ok(Outcome::Confirmed(())),
            Err(err) => {
                let mut state = self.state.write().await;
                let arrived = std::mem::take(&mut state.items);
                let mut restored = removed;
                for item in arrived {
                    if !restored.iter().any(|n| n.notification_id == item.notification_id) {
                        restored.push(item);
                    }
                }
                state.items = restored;
                drop(state);
                self.revision.bump();
                self.ctx.report(
                    Action::DeleteAllNotifications,
                    "Could not clear notifications",
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SdkError;
    use crate::gateway::MockGateway;
    use crate::notice::Notifier;
    use std::sync::Arc;

    fn note(id: NotificationId, read: bool) -> Notification {
        Notification {
            notification_id: id,
            content: format!("notification {}", id),
            is_read: read,
            created_at: None,
        }
    }

    async fn store(gateway: Arc<MockGateway>) -> NotificationStore {
        let store = NotificationStore::new(StoreContext::new(gateway, Notifier::new(), 7));
        store.refresh().await.unwrap();
        store
    }

    fn gateway() -> Arc<MockGateway> {
        Arc::new(
            MockGateway::new()
                .with_notification(7, note(1, false))
                .with_notification(7, note(2, false))
                .with_notification(7, note(3, true)),
        )
    }

    #[tokio::test]
    async fn test_mark_read_updates_unread_count() {
        let gateway = gateway();
        let store = store(gateway.clone()).await;
        assert_eq!(store.unread_count().await, 2);

        assert!(store.mark_read(1).await.unwrap().is_confirmed());
        assert_eq!(store.unread_count().await, 1);
        assert!(gateway.server_notifications(7)[0].is_read);
    }

    #[tokio::test]
    async fn test_mark_all_failure_restores_unread() {
        let gateway = gateway();
        let store = store(gateway.clone()).await;
        let before = store.notifications().await;

        gateway.fail_next("mark_all_notifications_read", SdkError::Transport("offline".into()));
        assert!(matches!(store.mark_all_read().await.unwrap(), Outcome::Reverted(_)));
        assert_eq!(store.notifications().await, before);
        assert_eq!(store.unread_count().await, 2);
    }

    #[tokio::test]
    async fn test_delete_all_failure_restores_list() {
        let gateway = gateway();
        let store = store(gateway.clone()).await;
        let before = store.notifications().await;

        gateway.fail_next("delete_all_notifications", SdkError::Timeout(15));
        assert!(matches!(store.delete_all().await.unwrap(), Outcome::Reverted(_)));
        assert_eq!(store.notifications().await, before);
    }

    #[tokio::test]
    async fn test_delete_confirmed() {
        let gateway = gateway();
        let store = store(gateway.clone()).await;

        assert!(store.delete(2).await.unwrap().is_confirmed());
        assert_eq!(store.notifications().await.len(), 2);
        assert_eq!(gateway.server_notifications(7).len(), 2);
    }
}

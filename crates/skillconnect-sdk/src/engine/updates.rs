//! Learning updates (progress tracker entries)
//!
//! Status changes carry the completion percentage derived from the new
//! status. Status change and delete use targeted revert; creation is not
//! optimistic.

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use super::intent::{Acknowledged, IntentLedger, Outcome};
use super::{not_found, require_text, Revision, StoreContext};
use crate::error::Result;
use crate::model::*;
use crate::notice::Action;

type StatusValue = (LearningStatus, Option<u8>);

#[derive(Default)]
struct UpdateState {
    updates: Vec<LearningUpdate>,
    filter: UpdateFilter,
    statuses: IntentLedger<UpdateId, StatusValue>,
}

/// Rounded mean completion over `updates`; entries without a percentage
/// count as zero
pub fn overall_progress(updates: &[LearningUpdate]) -> u8 {
    if updates.is_empty() {
        return 0;
    }
    let total: u32 = updates
        .iter()
        .map(|u| u32::from(u.completion_percentage.unwrap_or(0)))
        .sum();
    (f64::from(total) / updates.len() as f64).round() as u8
}

pub struct LearningUpdateStore {
    ctx: StoreContext,
    state: RwLock<UpdateState>,
    revision: Revision,
}

impl LearningUpdateStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(UpdateState::default()),
            revision: Revision::new(),
        }
    }

    pub async fn updates(&self) -> Vec<LearningUpdate> {
        self.state.read().await.updates.clone()
    }

    pub async fn overall_progress(&self) -> u8 {
        overall_progress(&self.state.read().await.updates)
    }

    pub async fn filter(&self) -> UpdateFilter {
        self.state.read().await.filter.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Re-run the last load with the same filter
    pub async fn reload(&self) -> Result<()> {
        let filter = self.filter().await;
        self.load(filter).await
    }

    /// Load the current user's updates matching `filter`
    pub async fn load(&self, filter: UpdateFilter) -> Result<()> {
        let fetched = self
            .ctx
            .call(self.ctx.gateway.learning_updates(self.ctx.user_id, &filter))
            .await;

        match fetched {
            Ok(updates) => {
                info!(count = updates.len(), "Loaded learning updates");
                let mut state = self.state.write().await;
                state.updates = updates;
                state.filter = filter;
                state.statuses.clear();
                drop(state);
                self.revision.bump();
                Ok(())
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: "learning updates".into() },
                    "Could not load your learning updates",
                    &err,
                );
                Err(err)
            }
        }
    }

    pub async fn create(&self, mut update: NewLearningUpdate) -> Result<Outcome<LearningUpdate>> {
        update.title = require_text("title", &update.title)?;
        update.user = UserRef {
            user_id: self.ctx.user_id,
        };
        update.completion_percentage = update.status.completion_percentage();

        match self
            .ctx
            .call(self.ctx.gateway.create_learning_update(&update))
            .await
        {
            Ok(created) => {
                self.state.write().await.updates.push(created.clone());
                self.revision.bump();
                Ok(Outcome::Confirmed(created))
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: "new learning update".into() },
                    "Could not save the learning update",
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }

    /// Move an update to `status`, setting its percentage to match
    pub async fn change_status(&self, update_id: UpdateId, status: LearningStatus) -> Result<Outcome> {
        let percentage = status.completion_percentage();

        let intent = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let update = state
                .updates
                .iter_mut()
                .find(|u| u.update_id == update_id)
                .ok_or_else(|| not_found(format!("learning update {}", update_id)))?;
            let before = (update.status, update.completion_percentage);
            update.status = status;
            update.completion_percentage = Some(percentage);
            state.statuses.begin(update_id, before)
        };
        self.revision.bump();
        debug!(update_id, %intent, status = status.as_str(), percentage, "Applied status change");

        let result = self
            .ctx
            .call(
                self.ctx
                    .gateway
                    .update_learning_update_status(update_id, status, percentage),
            )
            .await;

        let action = Action::ChangeStatus { update_id };
        let what = format!(
            "Could not change learning update {} to \"{}\"",
            update_id,
            status.as_str()
        );
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => Ok(
                match state
                    .statuses
                    .confirm(&update_id, intent, (status, Some(percentage)))
                {
                    Acknowledged::Current => Outcome::Confirmed(()),
                    Acknowledged::Stale => Outcome::Superseded,
                },
            ),
            Err(err) => match state.statuses.fail(&update_id, intent) {
                Some((status, percentage)) => {
                    if let Some(update) = state.updates.iter_mut().find(|u| u.update_id == update_id) {
                        update.status = status;
                        update.completion_percentage = percentage;
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

    pub async fn delete(&self, update_id: UpdateId) -> Result<Outcome> {
        let (index, removed) = {
            let mut state = self.state.write().await;
            let index = state
                .updates
                .iter()
                .position(|u| u.update_id == update_id)
                .ok_or_else(|| not_found(format!("learning update {}", update_id)))?;
            let removed = state.updates.remove(index);
            state.statuses.forget(&update_id);
            (index, removed)
        };
        self.revision.bump();

        match self
            .ctx
            .call(self.ctx.gateway.delete_learning_update(update_id))
            .await
        {
            Ok(()) => Ok(Outcome::Confirmed(())),
            Err(err) => {
                let mut state = self.state.write().await;
                if !state.updates.iter().any(|u| u.update_id == update_id) {
                    let at = index.min(state.updates.len());
                    state.updates.insert(at, removed);
                }
                drop(state);
                self.revision.bump();
                self.ctx.report(
                    Action::DeleteUpdate { update_id },
                    &format!("Could not delete learning update {}", update_id),
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }
}

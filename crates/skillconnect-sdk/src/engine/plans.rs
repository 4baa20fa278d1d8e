//! Learning plans and their checklist items
//!
//! Recovery policy:
//! - toggle / mark complete / rename item / edit plan: targeted revert
//! - add item: local placeholder, swapped for the server item or removed
//! - delete item / delete plan: full resync of the user's plans, falling
//!   back to re-inserting the removed entry when the resync itself fails
//! - create plan: not optimistic

use tokio::sync::{watch, RwLock};
use tracing::{debug, info};

use super::intent::{Acknowledged, FieldPhase, IntentId, IntentLedger, Outcome};
use super::{not_found, require_text, Revision, StoreContext};
use crate::error::{Result, SdkError};
use crate::model::*;
use crate::notice::Action;

#[derive(Debug, Clone, PartialEq)]
struct PlanDetails {
    title: String,
    description: Option<String>,
}

#[derive(Default)]
struct PlanState {
    plans: Vec<LearningPlan>,
    /// Keyed per item: completion and title share one write
    items: IntentLedger<ItemId, PlanItem>,
    details: IntentLedger<PlanId, PlanDetails>,
    ids: LocalIds,
}

impl PlanState {
    fn replace(&mut self, plans: Vec<LearningPlan>) {
        self.plans = plans;
        self.items.clear();
        self.details.clear();
    }
}

fn find_plan(plans: &mut [LearningPlan], plan_id: PlanId) -> Result<&mut LearningPlan> {
    plans
        .iter_mut()
        .find(|p| p.plan_id == plan_id)
        .ok_or_else(|| not_found(format!("plan {}", plan_id)))
}

fn find_item(plans: &mut [LearningPlan], plan_id: PlanId, item_id: ItemId) -> Option<&mut PlanItem> {
    plans
        .iter_mut()
        .find(|p| p.plan_id == plan_id)
        .and_then(|p| p.item_mut(item_id))
}

fn ensure_persisted(item_id: ItemId) -> Result<()> {
    if is_local_id(item_id) {
        return Err(SdkError::Conflict(format!(
            "item {} is still being created",
            item_id
        )));
    }
    Ok(())
}

enum ItemCall {
    Update,
    MarkComplete,
}

/// Learning plans owned by the signed-in user
pub struct PlanStore {
    ctx: StoreContext,
    state: RwLock<PlanState>,
    revision: Revision,
}

impl PlanStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(PlanState::default()),
            revision: Revision::new(),
        }
    }

    /// Seed the store without a round trip
    pub async fn with_plans(self, plans: Vec<LearningPlan>) -> Self {
        self.state.write().await.replace(plans);
        self
    }

    // ==================== Reads ====================

    pub async fn plans(&self) -> Vec<LearningPlan> {
        self.state.read().await.plans.clone()
    }

    pub async fn plan(&self, plan_id: PlanId) -> Option<LearningPlan> {
        self.state
            .read()
            .await
            .plans
            .iter()
            .find(|p| p.plan_id == plan_id)
            .cloned()
    }

    /// Rounded completion percentage, computed from the current items
    pub async fn progress(&self, plan_id: PlanId) -> Option<u8> {
        self.plan(plan_id).await.map(|p| p.progress())
    }

    pub async fn item_phase(&self, item_id: ItemId) -> FieldPhase {
        self.state.read().await.items.phase(&item_id)
    }

    /// Revision counter bumped on every local change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    // ==================== Loading ====================

    /// Replace local state with the server's copy, dropping pending intents
    pub async fn load(&self) -> Result<()> {
        match self.fetch_all().await {
            Ok(count) => {
                info!(user_id = self.ctx.user_id, plans = count, "Loaded learning plans");
                Ok(())
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: "learning plans".into() },
                    "Could not load learning plans",
                    &err,
                );
                Err(err)
            }
        }
    }

    async fn fetch_all(&self) -> Result<usize> {
        let plans = self.ctx.call(self.ctx.gateway.plans(self.ctx.user_id)).await?;
        let count = plans.len();
        self.state.write().await.replace(plans);
        self.revision.bump();
        Ok(count)
    }

    // ==================== Item completion ====================

    /// Flip an item's completion flag
    pub async fn toggle_item(&self, plan_id: PlanId, item_id: ItemId) -> Result<Outcome> {
        self.change_completion(plan_id, item_id, |done| !done, ItemCall::Update)
            .await
    }

    /// Set an item's completion flag
    pub async fn set_item_complete(
        &self,
        plan_id: PlanId,
        item_id: ItemId,
        complete: bool,
    ) -> Result<Outcome> {
        self.change_completion(plan_id, item_id, move |_| complete, ItemCall::Update)
            .await
    }

    /// Mark an item complete through the dedicated completion endpoint
    pub async fn mark_item_complete(&self, plan_id: PlanId, item_id: ItemId) -> Result<Outcome> {
        self.change_completion(plan_id, item_id, |_| true, ItemCall::MarkComplete)
            .await
    }

    async fn change_completion(
        &self,
        plan_id: PlanId,
        item_id: ItemId,
        target: impl FnOnce(bool) -> bool,
        call: ItemCall,
    ) -> Result<Outcome> {
        ensure_persisted(item_id)?;

        let (intent, item) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let item = find_plan(&mut state.plans, plan_id)?
                .item_mut(item_id)
                .ok_or_else(|| not_found(format!("item {} in plan {}", item_id, plan_id)))?;
            let before = item.clone();
            item.complete = target(before.complete);
            let snapshot = item.clone();
            (state.items.begin(item_id, before), snapshot)
        };
        self.revision.bump();
        debug!(plan_id, item_id, %intent, complete = item.complete, "Applied item completion");

        let what = format!("Could not update item {} in plan {}", item_id, plan_id);
        Ok(self
            .send_item(plan_id, intent, item, call, Action::ToggleItem { plan_id, item_id }, &what)
            .await)
    }

    // ==================== Item text ====================

    pub async fn rename_item(&self, plan_id: PlanId, item_id: ItemId, title: &str) -> Result<Outcome> {
        let title = require_text("item title", title)?;
        ensure_persisted(item_id)?;

        let (intent, item) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let item = find_plan(&mut state.plans, plan_id)?
                .item_mut(item_id)
                .ok_or_else(|| not_found(format!("item {} in plan {}", item_id, plan_id)))?;
            let before = item.clone();
            item.title = title;
            let snapshot = item.clone();
            (state.items.begin(item_id, before), snapshot)
        };
        self.revision.bump();

        let what = format!("Could not rename item {} in plan {}", item_id, plan_id);
        Ok(self
            .send_item(plan_id, intent, item, ItemCall::Update, Action::RenameItem { plan_id, item_id }, &what)
            .await)
    }

    /// Send one item write and reconcile its response.
    ///
    /// Every write carries the whole item, so a success for a superseded
    /// intent may have overwritten a newer one on the server. When that
    /// happens after the item went stable, the local item is written again.
    async fn send_item(
        &self,
        plan_id: PlanId,
        mut intent: IntentId,
        mut item: PlanItem,
        mut call: ItemCall,
        action: Action,
        what: &str,
    ) -> Outcome {
        let item_id = item.item_id;
        let mut superseded = false;

        loop {
            let result = match call {
                ItemCall::Update => {
                    self.ctx
                        .call(self.ctx.gateway.update_plan_item(plan_id, &item))
                        .await
                }
                ItemCall::MarkComplete => {
                    self.ctx
                        .call(self.ctx.gateway.complete_plan_item(item_id))
                        .await
                }
            };

            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let err = match result {
                Ok(()) => match state.items.confirm(&item_id, intent, item.clone()) {
                    Acknowledged::Current if !superseded => return Outcome::Confirmed(()),
                    Acknowledged::Current => return Outcome::Superseded,
                    Acknowledged::Stale => {
                        debug!(plan_id, item_id, %intent, "Response for superseded intent");
                        superseded = true;
                        if state.items.phase(&item_id) != FieldPhase::Stable {
                            return Outcome::Superseded;
                        }
                        let current = match find_item(&mut state.plans, plan_id, item_id) {
                            Some(current) if *current != item => current.clone(),
                            _ => return Outcome::Superseded,
                        };
                        debug!(plan_id, item_id, "Rewriting item after a late write");
                        intent = state.items.begin(item_id, item);
                        item = current;
                        call = ItemCall::Update;
                        continue;
                    }
                },
                Err(err) => err,
            };

            return match state.items.fail(&item_id, intent) {
                Some(baseline) => {
                    if let Some(current) = find_item(&mut state.plans, plan_id, item_id) {
                        *current = baseline;
                    }
                    drop(guard);
                    self.revision.bump();
                    self.ctx.report(action, what, &err);
                    if superseded {
                        Outcome::Superseded
                    } else {
                        Outcome::Reverted(err)
                    }
                }
                None => {
                    drop(guard);
                    self.ctx.report_stale(action, what, &err);
                    Outcome::Superseded
                }
            };
        }
    }

    // ==================== Item membership ====================

    /// Append an item. A placeholder with a local id is visible until the
    /// server answers.
    pub async fn add_item(&self, plan_id: PlanId, title: &str) -> Result<Outcome<PlanItem>> {
        let title = require_text("item title", title)?;

        let local_id = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let plan = find_plan(&mut state.plans, plan_id)?;
            let local_id = state.ids.next_id();
            plan.items.push(PlanItem {
                item_id: local_id,
                title: title.clone(),
                complete: false,
            });
            local_id
        };
        self.revision.bump();
        debug!(plan_id, local_id, "Added placeholder item");

        let request = NewPlanItem {
            title,
            complete: false,
            learning_plan: Some(PlanRef { plan_id }),
        };
        let result = self
            .ctx
            .call(self.ctx.gateway.create_plan_item(&request))
            .await;

        let mut guard = self.state.write().await;
        match result {
            Ok(created) => {
                let outcome = match find_item(&mut guard.plans, plan_id, local_id) {
                    Some(slot) => {
                        *slot = created.clone();
                        Outcome::Confirmed(created)
                    }
                    None => Outcome::Superseded,
                };
                drop(guard);
                self.revision.bump();
                Ok(outcome)
            }
            Err(err) => {
                if let Ok(plan) = find_plan(&mut guard.plans, plan_id) {
                    plan.items.retain(|i| i.item_id != local_id);
                }
                drop(guard);
                self.revision.bump();
                self.ctx.report(
                    Action::AddItem { plan_id },
                    &format!("Could not add an item to plan {}", plan_id),
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn delete_item(&self, plan_id: PlanId, item_id: ItemId) -> Result<Outcome> {
        ensure_persisted(item_id)?;

        let (index, removed) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let plan = find_plan(&mut state.plans, plan_id)?;
            let index = plan
                .items
                .iter()
                .position(|i| i.item_id == item_id)
                .ok_or_else(|| not_found(format!("item {} in plan {}", item_id, plan_id)))?;
            let removed = plan.items.remove(index);
            state.items.forget(&item_id);
            (index, removed)
        };
        self.revision.bump();

        let result = self.ctx.call(self.ctx.gateway.delete_plan_item(item_id)).await;
        let err = match result {
            Ok(()) => return Ok(Outcome::Confirmed(())),
            Err(err) => err,
        };

        let outcome = match self.fetch_all().await {
            Ok(_) => Outcome::Resynced(err),
            Err(resync_err) => {
                debug!(plan_id, error = %resync_err, "Resync failed, restoring item locally");
                let mut guard = self.state.write().await;
                if let Ok(plan) = find_plan(&mut guard.plans, plan_id) {
                    if plan.item(item_id).is_none() {
                        let at = index.min(plan.items.len());
                        plan.items.insert(at, removed);
                    }
                }
                drop(guard);
                self.revision.bump();
                Outcome::Reverted(err)
            }
        };

        if let Some(err) = outcome.error() {
            self.ctx.report(
                Action::DeleteItem { plan_id, item_id },
                &format!("Could not delete item {} from plan {}", item_id, plan_id),
                err,
            );
        }
        Ok(outcome)
    }

    // ==================== Plans ====================

    pub async fn edit_plan(
        &self,
        plan_id: PlanId,
        title: &str,
        description: Option<&str>,
    ) -> Result<Outcome> {
        let title = require_text("plan title", title)?;
        let next = PlanDetails {
            title,
            description: description.map(str::to_string),
        };

        let (intent, snapshot) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let plan = find_plan(&mut state.plans, plan_id)?;
            let before = PlanDetails {
                title: std::mem::replace(&mut plan.title, next.title.clone()),
                description: std::mem::replace(&mut plan.description, next.description.clone()),
            };
            let snapshot = plan.clone();
            (state.details.begin(plan_id, before), snapshot)
        };
        self.revision.bump();

        let result = self.ctx.call(self.ctx.gateway.update_plan(&snapshot)).await;

        let action = Action::EditPlan { plan_id };
        let what = format!("Could not save plan {}", plan_id);
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => Ok(acknowledge(state.details.confirm(&plan_id, intent, next), intent)),
            Err(err) => match state.details.fail(&plan_id, intent) {
                Some(baseline) => {
                    if let Ok(plan) = find_plan(&mut state.plans, plan_id) {
                        plan.title = baseline.title;
                        plan.description = baseline.description;
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

    /// Create a plan; inserted only once the server returns it
    pub async fn create_plan(&self, mut plan: NewPlan) -> Result<Outcome<LearningPlan>> {
        plan.title = require_text("plan title", &plan.title)?;
        plan.user = UserRef {
            user_id: self.ctx.user_id,
        };
        plan.items.retain(|i| !i.title.trim().is_empty());

        match self.ctx.call(self.ctx.gateway.create_plan(&plan)).await {
            Ok(created) => {
                info!(plan_id = created.plan_id, "Created learning plan");
                self.state.write().await.plans.push(created.clone());
                self.revision.bump();
                Ok(Outcome::Confirmed(created))
            }
            Err(err) => {
                self.ctx
                    .report(Action::CreatePlan, "Could not create the learning plan", &err);
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn delete_plan(&self, plan_id: PlanId) -> Result<Outcome> {
        let (index, removed) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let index = state
                .plans
                .iter()
                .position(|p| p.plan_id == plan_id)
                .ok_or_else(|| not_found(format!("plan {}", plan_id)))?;
            let removed = state.plans.remove(index);
            state.details.forget(&plan_id);
            (index, removed)
        };
        self.revision.bump();

        let err = match self.ctx.call(self.ctx.gateway.delete_plan(plan_id)).await {
            Ok(()) => {
                info!(plan_id, "Deleted learning plan");
                return Ok(Outcome::Confirmed(()));
            }
            Err(err) => err,
        };

        let outcome = match self.fetch_all().await {
            Ok(_) => Outcome::Resynced(err),
            Err(_) => {
                let mut guard = self.state.write().await;
                if !guard.plans.iter().any(|p| p.plan_id == plan_id) {
                    let at = index.min(guard.plans.len());
                    guard.plans.insert(at, removed);
                }
                drop(guard);
                self.revision.bump();
                Outcome::Reverted(err)
            }
        };

        if let Some(err) = outcome.error() {
            self.ctx.report(
                Action::DeletePlan { plan_id },
                &format!("Could not delete plan {}", plan_id),
                err,
            );
        }
        Ok(outcome)
    }
}

fn acknowledge(ack: Acknowledged, intent: IntentId) -> Outcome {
    match ack {
        Acknowledged::Current => Outcome::Confirmed(()),
        Acknowledged::Stale => {
            debug!(%intent, "Response for superseded intent");
            Outcome::Superseded
        }
    }
}

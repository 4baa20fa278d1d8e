//! Follow relationships from the signed-in user to other profiles
//!
//! The follower count shown on a profile is derived from the number of
//! *other* followers plus the current user's own flag, so the flag and the
//! count move together. Follow and unfollow use targeted revert.

use std::collections::HashMap;

use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::intent::{Acknowledged, IntentLedger, Outcome};
use super::{not_found, Revision, StoreContext};
use crate::error::{Result, SdkError};
use crate::model::UserId;
use crate::notice::Action;

/// Follow state for one profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowStatus {
    /// Followers other than the current user
    pub others: u32,
    pub following: bool,
}

impl FollowStatus {
    pub fn follower_count(&self) -> u32 {
        self.others + u32::from(self.following)
    }
}

#[derive(Default)]
struct FollowState {
    profiles: HashMap<UserId, FollowStatus>,
    ledger: IntentLedger<UserId, bool>,
}

pub struct FollowStore {
    ctx: StoreContext,
    state: RwLock<FollowState>,
    revision: Revision,
}

impl FollowStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(FollowState::default()),
            revision: Revision::new(),
        }
    }

    pub async fn status(&self, user_id: UserId) -> Option<FollowStatus> {
        self.state.read().await.profiles.get(&user_id).copied()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Fetch follower count and whether the current user follows `user_id`
    pub async fn load_profile(&self, user_id: UserId) -> Result<FollowStatus> {
        let me = self.ctx.user_id;
        let fetched = self
            .ctx
            .call(async {
                futures::try_join!(
                    self.ctx.gateway.follower_count(user_id),
                    self.ctx.gateway.is_following(me, user_id)
                )
            })
            .await;

        match fetched {
            Ok((count, following)) => {
                let status = FollowStatus {
                    others: count.saturating_sub(u32::from(following)),
                    following,
                };
                let mut state = self.state.write().await;
                state.profiles.insert(user_id, status);
                state.ledger.forget(&user_id);
                drop(state);
                self.revision.bump();
                Ok(status)
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: format!("profile {}", user_id) },
                    &format!("Could not load followers of user {}", user_id),
                    &err,
                );
                Err(err)
            }
        }
    }

    /// Follow when not following, otherwise unfollow
    pub async fn toggle_follow(&self, user_id: UserId) -> Result<Outcome> {
        let me = self.ctx.user_id;
        if user_id == me {
            return Err(SdkError::Validation("you cannot follow yourself".into()));
        }

        let (intent, following) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let status = state
                .profiles
                .get_mut(&user_id)
                .ok_or_else(|| not_found(format!("profile {}", user_id)))?;
            let before = status.following;
            status.following = !before;
            (state.ledger.begin(user_id, before), !before)
        };
        self.revision.bump();
        debug!(user_id, %intent, following, "Applied follow toggle");

        let result = if following {
            self.ctx.call(self.ctx.gateway.follow(me, user_id)).await
        } else {
            self.ctx.call(self.ctx.gateway.unfollow(me, user_id)).await
        };

        let (action, what) = if following {
            (Action::Follow { user_id }, format!("Could not follow user {}", user_id))
        } else {
            (Action::Unfollow { user_id }, format!("Could not unfollow user {}", user_id))
        };

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => Ok(match state.ledger.confirm(&user_id, intent, following) {
                Acknowledged::Current => Outcome::Confirmed(()),
                Acknowledged::Stale => Outcome::Superseded,
            }),
            Err(err) => match state.ledger.fail(&user_id, intent) {
                Some(baseline) => {
                    if let Some(status) = state.profiles.get_mut(&user_id) {
                        status.following = baseline;
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::notice::Notifier;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_load_splits_own_flag_from_count() {
        let gateway = Arc::new(MockGateway::new().with_follow(7, 20).with_follow(8, 20));
        let store = FollowStore::new(StoreContext::new(gateway, Notifier::new(), 7));

        let status = store.load_profile(20).await.unwrap();
        assert_eq!(status, FollowStatus { others: 1, following: true });
        assert_eq!(status.follower_count(), 2);
    }

    #[tokio::test]
    async fn test_follow_and_failed_unfollow() {
        let gateway = Arc::new(MockGateway::new().with_follow(8, 20));
        let store = FollowStore::new(StoreContext::new(gateway.clone(), Notifier::new(), 7));
        store.load_profile(20).await.unwrap();

        assert!(store.toggle_follow(20).await.unwrap().is_confirmed());
        assert_eq!(store.status(20).await.unwrap().follower_count(), 2);
        assert!(gateway.server_follows(7, 20));

        gateway.fail_next("unfollow", SdkError::Transport("offline".into()));
        let outcome = store.toggle_follow(20).await.unwrap();
        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(
            store.status(20).await.unwrap(),
            FollowStatus { others: 1, following: true }
        );
    }

    #[tokio::test]
    async fn test_cannot_follow_self() {
        let store = FollowStore::new(StoreContext::new(
            Arc::new(MockGateway::new()),
            Notifier::new(),
            7,
        ));
        assert!(matches!(store.toggle_follow(7).await, Err(SdkError::Validation(_))));
    }
}

//! Likes and comments on posts
//!
//! The like count is the size of the liker set, so membership and count
//! cannot drift apart. Every mutation here uses targeted revert; a new
//! comment is a local placeholder until the server assigns its id.

use std::collections::{BTreeSet, HashMap};

use tokio::sync::{watch, RwLock};
use tracing::debug;

use super::intent::{Acknowledged, IntentLedger, Outcome};
use super::{not_found, require_text, Revision, StoreContext};
use crate::error::{Result, SdkError};
use crate::model::*;
use crate::notice::Action;

/// Likes and comments for one post
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostEngagement {
    pub likers: BTreeSet<UserId>,
    pub comments: Vec<Comment>,
}

impl PostEngagement {
    pub fn like_count(&self) -> usize {
        self.likers.len()
    }

    pub fn comment_count(&self) -> usize {
        self.comments.len()
    }

    pub fn is_liked_by(&self, user_id: UserId) -> bool {
        self.likers.contains(&user_id)
    }
}

#[derive(Default)]
struct EngagementState {
    posts: HashMap<PostId, PostEngagement>,
    likes: IntentLedger<PostId, bool>,
    edits: IntentLedger<CommentId, String>,
    ids: LocalIds,
}

impl EngagementState {
    fn post_mut(&mut self, post_id: PostId) -> Result<&mut PostEngagement> {
        self.posts
            .get_mut(&post_id)
            .ok_or_else(|| not_found(format!("post {}", post_id)))
    }
}

fn set_membership(post: &mut PostEngagement, user_id: UserId, liked: bool) {
    if liked {
        post.likers.insert(user_id);
    } else {
        post.likers.remove(&user_id);
    }
}

/// Engagement for the posts currently on screen
pub struct EngagementStore {
    ctx: StoreContext,
    state: RwLock<EngagementState>,
    revision: Revision,
}

impl EngagementStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(EngagementState::default()),
            revision: Revision::new(),
        }
    }

    pub async fn engagement(&self, post_id: PostId) -> Option<PostEngagement> {
        self.state.read().await.posts.get(&post_id).cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Use already-known engagement for a post without a round trip
    pub async fn insert(&self, post_id: PostId, engagement: PostEngagement) {
        let mut state = self.state.write().await;
        state.posts.insert(post_id, engagement);
        state.likes.forget(&post_id);
        drop(state);
        self.revision.bump();
    }

    /// Fetch likes and comments for a post, replacing local state
    pub async fn load_post(&self, post_id: PostId) -> Result<()> {
        let fetched = self
            .ctx
            .call(async {
                futures::try_join!(
                    self.ctx.gateway.likes(post_id),
                    self.ctx.gateway.comments(post_id)
                )
            })
            .await;

        match fetched {
            Ok((likes, comments)) => {
                let engagement = PostEngagement {
                    likers: likes.into_iter().map(|l| l.user.user_id).collect(),
                    comments,
                };
                debug!(
                    post_id,
                    likes = engagement.like_count(),
                    comments = engagement.comment_count(),
                    "Loaded engagement"
                );
                self.insert(post_id, engagement).await;
                Ok(())
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: format!("post {}", post_id) },
                    &format!("Could not load likes and comments for post {}", post_id),
                    &err,
                );
                Err(err)
            }
        }
    }

    // ==================== Likes ====================

    /// Like if the current user has not liked the post, otherwise unlike
    pub async fn toggle_like(&self, post_id: PostId) -> Result<Outcome> {
        let me = self.ctx.user_id;

        let (intent, liked) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let post = state.post_mut(post_id)?;
            let before = post.is_liked_by(me);
            set_membership(post, me, !before);
            (state.likes.begin(post_id, before), !before)
        };
        self.revision.bump();
        debug!(post_id, %intent, liked, "Applied like toggle");

        let result = if liked {
            self.ctx.call(self.ctx.gateway.like(post_id, me)).await
        } else {
            self.ctx.call(self.ctx.gateway.unlike(post_id, me)).await
        };

        let (action, what) = if liked {
            (Action::Like { post_id }, format!("Could not like post {}", post_id))
        } else {
            (Action::Unlike { post_id }, format!("Could not unlike post {}", post_id))
        };

        let mut guard = self.state.write().await;
        let state = &mut *guard;
        match result {
            Ok(()) => Ok(match state.likes.confirm(&post_id, intent, liked) {
                Acknowledged::Current => Outcome::Confirmed(()),
                Acknowledged::Stale => Outcome::Superseded,
            }),
            Err(err) => match state.likes.fail(&post_id, intent) {
                Some(baseline) => {
                    if let Some(post) = state.posts.get_mut(&post_id) {
                        set_membership(post, me, baseline);
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

    // ==================== Comments ====================

    pub async fn add_comment(&self, post_id: PostId, text: &str) -> Result<Outcome<Comment>> {
        let content = require_text("comment", text)?;
        let me = self.ctx.user_id;

        let local_id = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let local_id = state.ids.next_id();
            state.post_mut(post_id)?.comments.push(Comment {
                comment_id: local_id,
                content: content.clone(),
                user: Some(User {
                    user_id: me,
                    ..Default::default()
                }),
                post: Some(PostRef { post_id }),
                created_at: None,
            });
            local_id
        };
        self.revision.bump();

        let request = NewComment {
            content,
            user: UserRef { user_id: me },
            post: PostRef { post_id },
        };
        let result = self.ctx.call(self.ctx.gateway.create_comment(&request)).await;

        let mut guard = self.state.write().await;
        let comments = guard.posts.get_mut(&post_id).map(|p| &mut p.comments);
        match result {
            Ok(created) => {
                let slot = comments.and_then(|list| list.iter_mut().find(|c| c.comment_id == local_id));
                let outcome = match slot {
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
                if let Some(list) = comments {
                    list.retain(|c| c.comment_id != local_id);
                }
                drop(guard);
                self.revision.bump();
                self.ctx.report(
                    Action::AddComment { post_id },
                    &format!("Could not post your comment on post {}", post_id),
                    &err,
                );
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn edit_comment(
        &self,
        post_id: PostId,
        comment_id: CommentId,
        text: &str,
    ) -> Result<Outcome<Comment>> {
        let content = require_text("comment", text)?;
        if is_local_id(comment_id) {
            return Err(SdkError::Conflict(format!(
                "comment {} is still being posted",
                comment_id
            )));
        }

        let (intent, snapshot) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let comment = state
                .post_mut(post_id)?
                .comments
                .iter_mut()
                .find(|c| c.comment_id == comment_id)
                .ok_or_else(|| not_found(format!("comment {} on post {}", comment_id, post_id)))?;
            let before = std::mem::replace(&mut comment.content, content);
            let snapshot = comment.clone();
            (state.edits.begin(comment_id, before), snapshot)
        };
        self.revision.bump();

        let result = self.ctx.call(self.ctx.gateway.update_comment(&snapshot)).await;

        let action = Action::EditComment { post_id, comment_id };
        let what = format!("Could not save your edit to comment {}", comment_id);
        let mut guard = self.state.write().await;
        let state = &mut *guard;
        let stored = state
            .posts
            .get_mut(&post_id)
            .and_then(|p| p.comments.iter_mut().find(|c| c.comment_id == comment_id));
        match result {
            Ok(server) => {
                match state.edits.confirm(&comment_id, intent, server.content.clone()) {
                    Acknowledged::Current => {
                        if let Some(stored) = stored {
                            *stored = server.clone();
                        }
                        drop(guard);
                        self.revision.bump();
                        Ok(Outcome::Confirmed(server))
                    }
                    Acknowledged::Stale => Ok(Outcome::Superseded),
                }
            }
            Err(err) => match state.edits.fail(&comment_id, intent) {
                Some(baseline) => {
                    if let Some(stored) = stored {
                        stored.content = baseline;
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

    pub async fn delete_comment(&self, post_id: PostId, comment_id: CommentId) -> Result<Outcome> {
        if is_local_id(comment_id) {
            return Err(SdkError::Conflict(format!(
                "comment {} is still being posted",
                comment_id
            )));
        }

        let (index, removed) = {
            let mut guard = self.state.write().await;
            let state = &mut *guard;
            let comments = &mut state.post_mut(post_id)?.comments;
            let index = comments
                .iter()
                .position(|c| c.comment_id == comment_id)
                .ok_or_else(|| not_found(format!("comment {} on post {}", comment_id, post_id)))?;
            let removed = comments.remove(index);
            state.edits.forget(&comment_id);
            (index, removed)
        };
        self.revision.bump();

        match self.ctx.call(self.ctx.gateway.delete_comment(comment_id)).await {
            Ok(()) => Ok(Outcome::Confirmed(())),
            Err(err) => {
                let mut guard = self.state.write().await;
                if let Some(post) = guard.posts.get_mut(&post_id) {
                    if !post.comments.iter().any(|c| c.comment_id == comment_id) {
                        let at = index.min(post.comments.len());
                        post.comments.insert(at, removed);
                    }
                }
                drop(guard);
                self.revision.bump();
                self.ctx.report(
                    Action::DeleteComment { post_id, comment_id },
                    &format!("Could not delete comment {}", comment_id),
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
    use crate::gateway::MockGateway;
    use crate::notice::{drain, Notifier};
    use std::sync::Arc;

    fn comment(id: CommentId, text: &str) -> Comment {
        Comment {
            comment_id: id,
            content: text.into(),
            user: Some(User { user_id: 8, ..Default::default() }),
            post: Some(PostRef { post_id: 5 }),
            created_at: None,
        }
    }

    async fn loaded(gateway: Arc<MockGateway>, notifier: Notifier) -> EngagementStore {
        let store = EngagementStore::new(StoreContext::new(gateway, notifier, 7));
        store.load_post(5).await.unwrap();
        store
    }

    fn gateway() -> Arc<MockGateway> {
        Arc::new(
            MockGateway::new()
                .with_likes(5, vec![8, 9])
                .with_comments(5, vec![comment(1, "first"), comment(2, "second")]),
        )
    }

    #[tokio::test]
    async fn test_load_post() {
        let store = loaded(gateway(), Notifier::new()).await;
        let engagement = store.engagement(5).await.unwrap();
        assert_eq!(engagement.like_count(), 2);
        assert_eq!(engagement.comment_count(), 2);
        assert!(!engagement.is_liked_by(7));
    }

    #[tokio::test]
    async fn test_like_then_unlike() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        assert!(store.toggle_like(5).await.unwrap().is_confirmed());
        assert_eq!(store.engagement(5).await.unwrap().like_count(), 3);
        assert_eq!(gateway.server_likes(5), vec![8, 9, 7]);

        assert!(store.toggle_like(5).await.unwrap().is_confirmed());
        assert_eq!(store.engagement(5).await.unwrap().like_count(), 2);
        assert_eq!(gateway.calls_to("unlike"), 1);
    }

    #[tokio::test]
    async fn test_like_failure_reverts_count_and_membership() {
        let gateway = gateway();
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let store = loaded(gateway.clone(), notifier).await;
        let before = store.engagement(5).await.unwrap();

        gateway.fail_next("like", SdkError::Transport("offline".into()));
        let outcome = store.toggle_like(5).await.unwrap();

        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(store.engagement(5).await.unwrap(), before);
        assert_eq!(drain(&mut rx)[0].action, Action::Like { post_id: 5 });
    }

    #[tokio::test]
    async fn test_like_unloaded_post_is_not_found() {
        let store = loaded(gateway(), Notifier::new()).await;
        assert!(matches!(store.toggle_like(99).await, Err(SdkError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_comment_swaps_placeholder() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        let created = store
            .add_comment(5, "  nice post ")
            .await
            .unwrap()
            .into_confirmed()
            .unwrap();
        assert_eq!(created.content, "nice post");

        let engagement = store.engagement(5).await.unwrap();
        assert_eq!(engagement.comment_count(), 3);
        assert_eq!(engagement.comments[2], created);
        assert!(!is_local_id(created.comment_id));
    }

    #[tokio::test]
    async fn test_empty_comment_rejected_locally() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;
        let calls = gateway.call_count();

        assert!(matches!(
            store.add_comment(5, "   ").await,
            Err(SdkError::Validation(_))
        ));
        assert_eq!(gateway.call_count(), calls);
        assert_eq!(store.engagement(5).await.unwrap().comment_count(), 2);
    }

    #[tokio::test]
    async fn test_add_comment_failure_removes_placeholder() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        gateway.fail_next(
            "create_comment",
            SdkError::RemoteRejected { status: 400, message: "spam".into() },
        );
        let outcome = store.add_comment(5, "buy now").await.unwrap();
        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(store.engagement(5).await.unwrap().comment_count(), 2);
    }

    #[tokio::test]
    async fn test_edit_comment_failure_restores_text() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        gateway.fail_next("update_comment", SdkError::Timeout(15));
        let outcome = store.edit_comment(5, 2, "edited").await.unwrap();
        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(store.engagement(5).await.unwrap().comments[1].content, "second");
    }

    #[tokio::test]
    async fn test_edit_comment_confirmed() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        let saved = store
            .edit_comment(5, 2, "second, edited")
            .await
            .unwrap()
            .into_confirmed()
            .unwrap();
        assert_eq!(saved.content, "second, edited");
        assert_eq!(gateway.server_comments(5)[1].content, "second, edited");
    }

    #[tokio::test]
    async fn test_delete_comment_failure_reinserts_at_index() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;
        let before = store.engagement(5).await.unwrap();

        gateway.fail_next("delete_comment", SdkError::Transport("offline".into()));
        let outcome = store.delete_comment(5, 1).await.unwrap();
        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(store.engagement(5).await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_delete_comment_confirmed() {
        let gateway = gateway();
        let store = loaded(gateway.clone(), Notifier::new()).await;

        assert!(store.delete_comment(5, 1).await.unwrap().is_confirmed());
        assert_eq!(store.engagement(5).await.unwrap().comment_count(), 1);
        assert_eq!(gateway.server_comments(5).len(), 1);
    }
}

//! The signed-in user's home feed
//!
//! Raw posts are classified into [`PostRecord`] variants as they arrive. A
//! new post shows up at the top of the feed as a placeholder before the
//! server has stored it.

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use super::intent::Outcome;
use super::{not_found, Revision, StoreContext};
use crate::error::{Result, SdkError};
use crate::media::MediaSlots;
use crate::model::*;
use crate::notice::Action;

#[derive(Default)]
struct FeedState {
    posts: Vec<PostRecord>,
    ids: LocalIds,
}

fn ingest_all(values: Vec<serde_json::Value>) -> Vec<PostRecord> {
    values
        .into_iter()
        .filter_map(|value| match PostRecord::ingest(value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable post");
                None
            }
        })
        .collect()
}

pub struct FeedStore {
    ctx: StoreContext,
    state: RwLock<FeedState>,
    revision: Revision,
}

impl FeedStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self {
            ctx,
            state: RwLock::new(FeedState::default()),
            revision: Revision::new(),
        }
    }

    pub async fn posts(&self) -> Vec<PostRecord> {
        self.state.read().await.posts.clone()
    }

    pub async fn post(&self, post_id: PostId) -> Option<PostRecord> {
        self.state
            .read()
            .await
            .posts
            .iter()
            .find(|p| p.post_id() == post_id)
            .cloned()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    pub async fn load(&self) -> Result<usize> {
        let fetched = self
            .ctx
            .call(self.ctx.gateway.load_feed(self.ctx.user_id))
            .await;

        match fetched {
            Ok(values) => {
                let posts = ingest_all(values);
                let count = posts.len();
                self.state.write().await.posts = posts;
                self.revision.bump();
                info!(count, "Loaded feed");
                Ok(count)
            }
            Err(err) => {
                self.ctx.report(
                    Action::Refresh { what: "feed".into() },
                    "Could not load your feed",
                    &err,
                );
                Err(err)
            }
        }
    }

    /// Posts by one author, for a profile page; not kept in the feed
    pub async fn user_posts(&self, user_id: UserId) -> Result<Vec<PostRecord>> {
        let values = self.ctx.call(self.ctx.gateway.user_posts(user_id)).await?;
        Ok(ingest_all(values))
    }

    /// Publish a post with already-uploaded media
    pub async fn create_post(&self, description: &str, media: MediaSlots) -> Result<Outcome<PostRecord>> {
        let description = description.trim().to_string();
        if description.is_empty() && media.is_empty() {
            return Err(SdkError::Validation(
                "a post needs a description or at least one photo or video".into(),
            ));
        }
        let me = self.ctx.user_id;
        let [media1, media2, media3] = media.into_array();

        let local_id = {
            let mut state = self.state.write().await;
            let local_id = state.ids.next_id();
            let placeholder = BackendPost {
                post_id: local_id,
                title: None,
                description: description.clone(),
                user: User {
                    user_id: me,
                    ..Default::default()
                },
                created_at: Some(chrono::Utc::now().naive_utc()),
                media1: Some(media1.clone()),
                media2: Some(media2.clone()),
                media3: Some(media3.clone()),
                likes: Some(0),
            };
            state.posts.insert(0, PostRecord::Backend(placeholder));
            local_id
        };
        self.revision.bump();
        debug!(local_id, "Inserted post placeholder");

        let request = NewPost::new(description, me, [media1, media2, media3]);
        let result = self.ctx.call(self.ctx.gateway.create_post(&request)).await;

        let mut state = self.state.write().await;
        let slot = state.posts.iter().position(|p| p.post_id() == local_id);
        match result {
            Ok(created) => {
                let record = PostRecord::Backend(created);
                let outcome = match slot {
                    Some(index) => {
                        state.posts[index] = record.clone();
                        Outcome::Confirmed(record)
                    }
                    None => Outcome::Superseded,
                };
                drop(state);
                self.revision.bump();
                Ok(outcome)
            }
            Err(err) => {
                if let Some(index) = slot {
                    state.posts.remove(index);
                }
                drop(state);
                self.revision.bump();
                self.ctx
                    .report(Action::CreatePost, "Could not publish your post", &err);
                Ok(Outcome::Reverted(err))
            }
        }
    }

    pub async fn delete_post(&self, post_id: PostId) -> Result<Outcome> {
        if is_local_id(post_id) {
            return Err(SdkError::Conflict(format!(
                "post {} is still being published",
                post_id
            )));
        }

        let (index, removed) = {
            let mut state = self.state.write().await;
            let index = state
                .posts
                .iter()
                .position(|p| p.post_id() == post_id)
                .ok_or_else(|| not_found(format!("post {}", post_id)))?;
            (index, state.posts.remove(index))
        };
        self.revision.bump();

        match self.ctx.call(self.ctx.gateway.delete_post(post_id)).await {
            Ok(()) => Ok(Outcome::Confirmed(())),
            Err(err) => {
                let mut state = self.state.write().await;
                if !state.posts.iter().any(|p| p.post_id() == post_id) {
                    let at = index.min(state.posts.len());
                    state.posts.insert(at, removed);
                }
                drop(state);
                self.revision.bump();
                self.ctx.report(
                    Action::DeletePost { post_id },
                    &format!("Could not delete post {}", post_id),
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
    use serde_json::json;
    use std::sync::Arc;

    fn gateway() -> Arc<MockGateway> {
        Arc::new(MockGateway::new().with_feed(vec![
            json!({"postId": 1, "description": "first", "user": {"userId": 2}}),
            json!({"id": 2, "content": "sample", "author": {"name": "Sam"}}),
            json!({"nonsense": true}),
        ]))
    }

    #[tokio::test]
    async fn test_load_classifies_and_skips() {
        let store = FeedStore::new(StoreContext::new(gateway(), Notifier::new(), 7));
        assert_eq!(store.load().await.unwrap(), 2);

        let posts = store.posts().await;
        assert!(matches!(posts[0], PostRecord::Backend(_)));
        assert!(matches!(posts[1], PostRecord::Legacy(_)));
    }

    #[tokio::test]
    async fn test_create_post_swaps_placeholder() {
        let gateway = gateway();
        let store = FeedStore::new(StoreContext::new(gateway.clone(), Notifier::new(), 7));
        store.load().await.unwrap();

        let outcome = store
            .create_post("  hello  ", MediaSlots::from_urls(["https://cdn/a.png"]))
            .await
            .unwrap();
        let created = outcome.into_confirmed().unwrap();
        assert!(!is_local_id(created.post_id()));

        let posts = store.posts().await;
        assert_eq!(posts[0], created);
        assert_eq!(posts.len(), 3);

        let sent = &gateway.created_posts()[0];
        assert_eq!(sent.description, "hello");
        assert_eq!(sent.media1, "https://cdn/a.png");
        assert_eq!(sent.media2, "");
        assert_eq!(sent.media3, "");
    }

    #[tokio::test]
    async fn test_create_post_failure_removes_placeholder() {
        let gateway = gateway();
        let notifier = Notifier::new();
        let mut rx = notifier.subscribe();
        let store = FeedStore::new(StoreContext::new(gateway.clone(), notifier, 7));
        store.load().await.unwrap();
        let before = store.posts().await;

        gateway.fail_next("create_post", SdkError::Transport("offline".into()));
        let outcome = store.create_post("hello", MediaSlots::empty()).await.unwrap();

        assert!(matches!(outcome, Outcome::Reverted(_)));
        assert_eq!(store.posts().await, before);
        let notices = drain(&mut rx);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].action, Action::CreatePost);
    }

    #[tokio::test]
    async fn test_empty_post_rejected_locally() {
        let gateway = gateway();
        let store = FeedStore::new(StoreContext::new(gateway.clone(), Notifier::new(), 7));
        assert!(matches!(
            store.create_post("   ", MediaSlots::empty()).await,
            Err(SdkError::Validation(_))
        ));
        assert_eq!(gateway.calls_to("create_post"), 0);
    }

    #[tokio::test]
    async fn test_delete_failure_reinserts() {
        let gateway = gateway();
        let store = FeedStore::new(StoreContext::new(gateway.clone(), Notifier::new(), 7));
        store.load().await.unwrap();
        let before = store.posts().await;

        gateway.fail_next("delete_post", SdkError::Unauthorized);
        assert!(matches!(store.delete_post(1).await.unwrap(), Outcome::Reverted(_)));
        assert_eq!(store.posts().await, before);
    }
}

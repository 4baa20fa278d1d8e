//! In-memory gateway for testing.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::traits::RemoteGateway;
use crate::error::{Result, SdkError};
use crate::model::*;

#[derive(Default)]
struct ServerState {
    next_id: i64,
    feed: Vec<serde_json::Value>,
    created_posts: Vec<NewPost>,
    likes: HashMap<PostId, Vec<UserId>>,
    comments: HashMap<PostId, Vec<Comment>>,
    follows: HashSet<(UserId, UserId)>,
    plans: Vec<LearningPlan>,
    updates: Vec<(UserId, LearningUpdate)>,
    notifications: Vec<(UserId, Notification)>,
    messages: Vec<BroadcastMessage>,
    users: Vec<User>,
}

impl ServerState {
    fn assign_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

/// Releases a call parked by [`MockGateway::hold_next`]
pub struct Hold {
    tx: oneshot::Sender<()>,
}

impl Hold {
    pub fn release(self) {
        let _ = self.tx.send(());
    }
}

/// Mock gateway for testing.
///
/// Keeps a small in-memory copy of server state, so a successful mutation is
/// visible to later queries. Failures and response ordering are scripted per
/// operation name (the trait method name, e.g. `"update_plan_item"`).
pub struct MockGateway {
    state: Mutex<ServerState>,
    failures: Mutex<HashMap<&'static str, VecDeque<SdkError>>>,
    holds: Mutex<HashMap<&'static str, VecDeque<oneshot::Receiver<()>>>>,
    calls: Mutex<Vec<&'static str>>,
    call_count: AtomicU32,
    available: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn not_found(what: impl std::fmt::Display) -> SdkError {
    SdkError::RemoteRejected {
        status: 404,
        message: format!("{} not found", what),
    }
}

impl MockGateway {
    /// Create an empty mock gateway.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ServerState::default()),
            failures: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
            available: AtomicBool::new(true),
        }
    }

    // ==================== Seeding ====================

    pub fn with_plan(self, plan: LearningPlan) -> Self {
        lock(&self.state).plans.push(plan);
        self
    }

    pub fn with_feed(self, posts: Vec<serde_json::Value>) -> Self {
        lock(&self.state).feed.extend(posts);
        self
    }

    pub fn with_likes(self, post_id: PostId, users: Vec<UserId>) -> Self {
        lock(&self.state).likes.insert(post_id, users);
        self
    }

    pub fn with_comments(self, post_id: PostId, comments: Vec<Comment>) -> Self {
        lock(&self.state).comments.insert(post_id, comments);
        self
    }

    pub fn with_follow(self, follower_id: UserId, user_id: UserId) -> Self {
        lock(&self.state).follows.insert((follower_id, user_id));
        self
    }

    pub fn with_learning_update(self, user_id: UserId, update: LearningUpdate) -> Self {
        lock(&self.state).updates.push((user_id, update));
        self
    }

    pub fn with_notification(self, user_id: UserId, notification: Notification) -> Self {
        lock(&self.state).notifications.push((user_id, notification));
        self
    }

    pub fn with_admin_message(self, message: BroadcastMessage) -> Self {
        lock(&self.state).messages.push(message);
        self
    }

    pub fn with_user(self, user: User) -> Self {
        lock(&self.state).users.push(user);
        self
    }

    /// Replace the broadcast messages the service returns
    pub fn set_admin_messages(&self, messages: Vec<BroadcastMessage>) {
        lock(&self.state).messages = messages;
    }

    /// Set availability. An unavailable gateway fails every call as a
    /// transport error.
    pub fn with_available(self, available: bool) -> Self {
        self.set_available(available);
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    // ==================== Scripting ====================

    /// Fail the next call of `op` with `error`. Failures queue up per op.
    pub fn fail_next(&self, op: &'static str, error: SdkError) {
        lock(&self.failures).entry(op).or_default().push_back(error);
    }

    /// Park the next call of `op` until the returned [`Hold`] is released
    /// (or dropped). The call is recorded as dispatched immediately; its
    /// effect on server state and its outcome happen after release.
    pub fn hold_next(&self, op: &'static str) -> Hold {
        let (tx, rx) = oneshot::channel();
        lock(&self.holds).entry(op).or_default().push_back(rx);
        Hold { tx }
    }

    /// Wait until `op` has been dispatched at least `n` times.
    pub async fn wait_for_calls(&self, op: &'static str, n: usize) {
        while self.calls_to(op) < n {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    // ==================== Inspection ====================

    /// Get the number of calls made through the gateway.
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    pub fn calls_to(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|c| **c == op).count()
    }

    /// Operation names in dispatch order
    pub fn call_log(&self) -> Vec<&'static str> {
        lock(&self.calls).clone()
    }

    pub fn server_plan(&self, plan_id: PlanId) -> Option<LearningPlan> {
        lock(&self.state)
            .plans
            .iter()
            .find(|p| p.plan_id == plan_id)
            .cloned()
    }

    pub fn server_likes(&self, post_id: PostId) -> Vec<UserId> {
        lock(&self.state)
            .likes
            .get(&post_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn server_comments(&self, post_id: PostId) -> Vec<Comment> {
        lock(&self.state)
            .comments
            .get(&post_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn server_update(&self, update_id: UpdateId) -> Option<LearningUpdate> {
        lock(&self.state)
            .updates
            .iter()
            .find(|(_, u)| u.update_id == update_id)
            .map(|(_, u)| u.clone())
    }

    pub fn server_notifications(&self, user_id: UserId) -> Vec<Notification> {
        lock(&self.state)
            .notifications
            .iter()
            .filter(|(owner, _)| *owner == user_id)
            .map(|(_, n)| n.clone())
            .collect()
    }

    pub fn server_follows(&self, follower_id: UserId, user_id: UserId) -> bool {
        lock(&self.state).follows.contains(&(follower_id, user_id))
    }

    /// Post bodies received by `create_post`, in order
    pub fn created_posts(&self) -> Vec<NewPost> {
        lock(&self.state).created_posts.clone()
    }

    // ==================== Helper Methods ====================

    async fn enter(&self, op: &'static str) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.calls).push(op);

        let hold = lock(&self.holds).get_mut(op).and_then(|q| q.pop_front());
        if let Some(rx) = hold {
            let _ = rx.await;
        }

        if !self.available.load(Ordering::SeqCst) {
            return Err(SdkError::Transport("mock gateway unavailable".into()));
        }

        match lock(&self.failures).get_mut(op).and_then(|q| q.pop_front()) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut ServerState) -> Result<T>) -> Result<T> {
        f(&mut lock(&self.state))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

fn post_id_of(value: &serde_json::Value) -> Option<PostId> {
    value
        .get("postId")
        .or_else(|| value.get("id"))
        .and_then(|v| v.as_i64())
}

fn plan_mut(state: &mut ServerState, plan_id: PlanId) -> Result<&mut LearningPlan> {
    state
        .plans
        .iter_mut()
        .find(|p| p.plan_id == plan_id)
        .ok_or_else(|| not_found(format!("plan {}", plan_id)))
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn load_feed(&self, _user_id: UserId) -> Result<Vec<serde_json::Value>> {
        self.enter("load_feed").await?;
        self.with_state(|s| Ok(s.feed.clone()))
    }

    async fn user_posts(&self, user_id: UserId) -> Result<Vec<serde_json::Value>> {
        self.enter("user_posts").await?;
        self.with_state(|s| {
            Ok(s.feed
                .iter()
                .filter(|p| p.pointer("/user/userId").and_then(|v| v.as_i64()) == Some(user_id))
                .cloned()
                .collect())
        })
    }

    async fn create_post(&self, post: &NewPost) -> Result<BackendPost> {
        self.enter("create_post").await?;
        self.with_state(|s| {
            let created = BackendPost {
                post_id: s.assign_id(),
                title: None,
                description: post.description.clone(),
                user: User {
                    user_id: post.user.user_id,
                    ..Default::default()
                },
                created_at: Some(chrono::Utc::now().naive_utc()),
                media1: Some(post.media1.clone()),
                media2: Some(post.media2.clone()),
                media3: Some(post.media3.clone()),
                likes: None,
            };
            s.created_posts.push(post.clone());
            s.feed.insert(0, serde_json::to_value(&created)?);
            Ok(created)
        })
    }

    async fn delete_post(&self, post_id: PostId) -> Result<()> {
        self.enter("delete_post").await?;
        self.with_state(|s| {
            let before = s.feed.len();
            s.feed.retain(|p| post_id_of(p) != Some(post_id));
            if s.feed.len() == before {
                return Err(not_found(format!("post {}", post_id)));
            }
            Ok(())
        })
    }

    async fn likes(&self, post_id: PostId) -> Result<Vec<Like>> {
        self.enter("likes").await?;
        self.with_state(|s| {
            Ok(s.likes
                .get(&post_id)
                .map(|users| {
                    users
                        .iter()
                        .map(|&user_id| Like {
                            like_id: None,
                            user: UserRef { user_id },
                        })
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    async fn like(&self, post_id: PostId, user_id: UserId) -> Result<()> {
        self.enter("like").await?;
        self.with_state(|s| {
            let users = s.likes.entry(post_id).or_default();
            if !users.contains(&user_id) {
                users.push(user_id);
            }
            Ok(())
        })
    }

    async fn unlike(&self, post_id: PostId, user_id: UserId) -> Result<()> {
        self.enter("unlike").await?;
        self.with_state(|s| {
            if let Some(users) = s.likes.get_mut(&post_id) {
                users.retain(|u| *u != user_id);
            }
            Ok(())
        })
    }

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        self.enter("comments").await?;
        self.with_state(|s| Ok(s.comments.get(&post_id).cloned().unwrap_or_default()))
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.enter("create_comment").await?;
        self.with_state(|s| {
            let created = Comment {
                comment_id: s.assign_id(),
                content: comment.content.clone(),
                user: Some(User {
                    user_id: comment.user.user_id,
                    ..Default::default()
                }),
                post: Some(comment.post),
                created_at: Some(chrono::Utc::now().naive_utc()),
            };
            s.comments
                .entry(comment.post.post_id)
                .or_default()
                .push(created.clone());
            Ok(created)
        })
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment> {
        self.enter("update_comment").await?;
        self.with_state(|s| {
            let stored = s
                .comments
                .values_mut()
                .flat_map(|list| list.iter_mut())
                .find(|c| c.comment_id == comment.comment_id)
                .ok_or_else(|| not_found(format!("comment {}", comment.comment_id)))?;
            stored.content = comment.content.clone();
            Ok(stored.clone())
        })
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<()> {
        self.enter("delete_comment").await?;
        self.with_state(|s| {
            for list in s.comments.values_mut() {
                if let Some(pos) = list.iter().position(|c| c.comment_id == comment_id) {
                    list.remove(pos);
                    return Ok(());
                }
            }
            Err(not_found(format!("comment {}", comment_id)))
        })
    }

    async fn follower_count(&self, user_id: UserId) -> Result<u32> {
        self.enter("follower_count").await?;
        self.with_state(|s| Ok(s.follows.iter().filter(|(_, u)| *u == user_id).count() as u32))
    }

    async fn is_following(&self, follower_id: UserId, user_id: UserId) -> Result<bool> {
        self.enter("is_following").await?;
        self.with_state(|s| Ok(s.follows.contains(&(follower_id, user_id))))
    }

    async fn follow(&self, follower_id: UserId, user_id: UserId) -> Result<()> {
        self.enter("follow").await?;
        self.with_state(|s| {
            s.follows.insert((follower_id, user_id));
            Ok(())
        })
    }

    async fn unfollow(&self, follower_id: UserId, user_id: UserId) -> Result<()> {
        self.enter("unfollow").await?;
        self.with_state(|s| {
            s.follows.remove(&(follower_id, user_id));
            Ok(())
        })
    }

    async fn plans(&self, user_id: UserId) -> Result<Vec<LearningPlan>> {
        self.enter("plans").await?;
        self.with_state(|s| {
            Ok(s.plans
                .iter()
                .filter(|p| p.user.map(|u| u.user_id) == Some(user_id))
                .cloned()
                .collect())
        })
    }

    async fn plan(&self, plan_id: PlanId) -> Result<LearningPlan> {
        self.enter("plan").await?;
        self.with_state(|s| plan_mut(s, plan_id).map(|p| p.clone()))
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<LearningPlan> {
        self.enter("create_plan").await?;
        self.with_state(|s| {
            let plan_id = s.assign_id();
            let items = plan
                .items
                .iter()
                .map(|item| PlanItem {
                    item_id: s.assign_id(),
                    title: item.title.clone(),
                    complete: item.complete,
                })
                .collect();
            let created = LearningPlan {
                plan_id,
                title: plan.title.clone(),
                description: Some(plan.description.clone()),
                start_date: Some(plan.start_date),
                end_date: plan.end_date,
                user: Some(plan.user),
                items,
            };
            s.plans.push(created.clone());
            Ok(created)
        })
    }

    async fn update_plan(&self, plan: &LearningPlan) -> Result<()> {
        self.enter("update_plan").await?;
        self.with_state(|s| {
            let stored = plan_mut(s, plan.plan_id)?;
            stored.title = plan.title.clone();
            stored.description = plan.description.clone();
            stored.start_date = plan.start_date;
            stored.end_date = plan.end_date;
            Ok(())
        })
    }

    async fn delete_plan(&self, plan_id: PlanId) -> Result<()> {
        self.enter("delete_plan").await?;
        self.with_state(|s| {
            let before = s.plans.len();
            s.plans.retain(|p| p.plan_id != plan_id);
            if s.plans.len() == before {
                return Err(not_found(format!("plan {}", plan_id)));
            }
            Ok(())
        })
    }

    async fn create_plan_item(&self, item: &NewPlanItem) -> Result<PlanItem> {
        self.enter("create_plan_item").await?;
        self.with_state(|s| {
            let plan_id = item
                .learning_plan
                .map(|p| p.plan_id)
                .ok_or_else(|| SdkError::RemoteRejected {
                    status: 400,
                    message: "learningPlan is required".into(),
                })?;
            let item_id = s.assign_id();
            let created = PlanItem {
                item_id,
                title: item.title.clone(),
                complete: item.complete,
            };
            plan_mut(s, plan_id)?.items.push(created.clone());
            Ok(created)
        })
    }

    async fn update_plan_item(&self, plan_id: PlanId, item: &PlanItem) -> Result<()> {
        self.enter("update_plan_item").await?;
        self.with_state(|s| {
            let stored = plan_mut(s, plan_id)?
                .item_mut(item.item_id)
                .ok_or_else(|| not_found(format!("item {}", item.item_id)))?;
            *stored = item.clone();
            Ok(())
        })
    }

    async fn delete_plan_item(&self, item_id: ItemId) -> Result<()> {
        self.enter("delete_plan_item").await?;
        self.with_state(|s| {
            for plan in s.plans.iter_mut() {
                if let Some(pos) = plan.items.iter().position(|i| i.item_id == item_id) {
                    plan.items.remove(pos);
                    return Ok(());
                }
            }
            Err(not_found(format!("item {}", item_id)))
        })
    }

    async fn complete_plan_item(&self, item_id: ItemId) -> Result<()> {
        self.enter("complete_plan_item").await?;
        self.with_state(|s| {
            let item = s
                .plans
                .iter_mut()
                .find_map(|p| p.item_mut(item_id))
                .ok_or_else(|| not_found(format!("item {}", item_id)))?;
            item.complete = true;
            Ok(())
        })
    }

    async fn learning_updates(
        &self,
        user_id: UserId,
        filter: &UpdateFilter,
    ) -> Result<Vec<LearningUpdate>> {
        self.enter("learning_updates").await?;
        self.with_state(|s| {
            Ok(s.updates
                .iter()
                .filter(|(owner, _)| *owner == user_id)
                .map(|(_, u)| u)
                .filter(|u| filter.status.map_or(true, |st| u.status == st))
                .filter(|u| {
                    filter
                        .category
                        .as_ref()
                        .map_or(true, |c| u.category.as_ref() == Some(c))
                })
                .filter(|u| filter.kind.as_ref().map_or(true, |k| u.kind.as_ref() == Some(k)))
                .filter(|u| filter.level.as_ref().map_or(true, |l| u.level.as_ref() == Some(l)))
                .cloned()
                .collect())
        })
    }

    async fn create_learning_update(&self, update: &NewLearningUpdate) -> Result<LearningUpdate> {
        self.enter("create_learning_update").await?;
        self.with_state(|s| {
            let created = LearningUpdate {
                update_id: s.assign_id(),
                title: update.title.clone(),
                kind: Some(update.kind.clone()),
                category: Some(update.category.clone()),
                description: Some(update.description.clone()),
                learning_method: Some(update.learning_method.clone()),
                level: Some(update.level.clone()),
                status: update.status,
                completion_percentage: Some(update.completion_percentage),
                target_date: None,
                created_at: Some(chrono::Utc::now().naive_utc()),
            };
            s.updates.push((update.user.user_id, created.clone()));
            Ok(created)
        })
    }

    async fn update_learning_update_status(
        &self,
        update_id: UpdateId,
        status: LearningStatus,
        completion_percentage: u8,
    ) -> Result<()> {
        self.enter("update_learning_update_status").await?;
        self.with_state(|s| {
            let (_, stored) = s
                .updates
                .iter_mut()
                .find(|(_, u)| u.update_id == update_id)
                .ok_or_else(|| not_found(format!("learning update {}", update_id)))?;
            stored.status = status;
            stored.completion_percentage = Some(completion_percentage);
            Ok(())
        })
    }

    async fn delete_learning_update(&self, update_id: UpdateId) -> Result<()> {
        self.enter("delete_learning_update").await?;
        self.with_state(|s| {
            let before = s.updates.len();
            s.updates.retain(|(_, u)| u.update_id != update_id);
            if s.updates.len() == before {
                return Err(not_found(format!("learning update {}", update_id)));
            }
            Ok(())
        })
    }

    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.enter("notifications").await?;
        Ok(self.server_notifications(user_id))
    }

    async fn unread_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.enter("unread_notifications").await?;
        Ok(self
            .server_notifications(user_id)
            .into_iter()
            .filter(|n| !n.is_read)
            .collect())
    }

    async fn mark_notification_read(&self, notification_id: NotificationId) -> Result<()> {
        self.enter("mark_notification_read").await?;
        self.with_state(|s| {
            let (_, n) = s
                .notifications
                .iter_mut()
                .find(|(_, n)| n.notification_id == notification_id)
                .ok_or_else(|| not_found(format!("notification {}", notification_id)))?;
            n.is_read = true;
            Ok(())
        })
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<()> {
        self.enter("mark_all_notifications_read").await?;
        self.with_state(|s| {
            s.notifications
                .iter_mut()
                .filter(|(owner, _)| *owner == user_id)
                .for_each(|(_, n)| n.is_read = true);
            Ok(())
        })
    }

    async fn delete_notification(&self, notification_id: NotificationId) -> Result<()> {
        self.enter("delete_notification").await?;
        self.with_state(|s| {
            s.notifications
                .retain(|(_, n)| n.notification_id != notification_id);
            Ok(())
        })
    }

    async fn delete_all_notifications(&self, user_id: UserId) -> Result<()> {
        self.enter("delete_all_notifications").await?;
        self.with_state(|s| {
            s.notifications.retain(|(owner, _)| *owner != user_id);
            Ok(())
        })
    }

    async fn admin_messages(&self) -> Result<Vec<BroadcastMessage>> {
        self.enter("admin_messages").await?;
        self.with_state(|s| Ok(s.messages.clone()))
    }

    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.enter("search_users").await?;
        let needle = query.to_lowercase();
        self.with_state(|s| {
            Ok(s.users
                .iter()
                .filter(|u| {
                    [&u.username, &u.first_name, &u.last_name]
                        .into_iter()
                        .flatten()
                        .any(|field| field.to_lowercase().contains(&needle))
                })
                .cloned()
                .collect())
        })
    }
}

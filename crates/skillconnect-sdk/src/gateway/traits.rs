//! Core trait for the REST service.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::*;

/// Request/response facade over the SkillConnect REST service.
///
/// Implementations must report any non-success response as an error;
/// callers never inspect transport details.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    // Posts
    async fn load_feed(&self, user_id: UserId) -> Result<Vec<serde_json::Value>>;
    async fn user_posts(&self, user_id: UserId) -> Result<Vec<serde_json::Value>>;
    async fn create_post(&self, post: &NewPost) -> Result<BackendPost>;
    async fn delete_post(&self, post_id: PostId) -> Result<()>;

    // Likes
    async fn likes(&self, post_id: PostId) -> Result<Vec<Like>>;
    async fn like(&self, post_id: PostId, user_id: UserId) -> Result<()>;
    async fn unlike(&self, post_id: PostId, user_id: UserId) -> Result<()>;

    // Comments
    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>>;
    async fn create_comment(&self, comment: &NewComment) -> Result<Comment>;
    async fn update_comment(&self, comment: &Comment) -> Result<Comment>;
    async fn delete_comment(&self, comment_id: CommentId) -> Result<()>;

    // Follows
    async fn follower_count(&self, user_id: UserId) -> Result<u32>;
    async fn is_following(&self, follower_id: UserId, user_id: UserId) -> Result<bool>;
    async fn follow(&self, follower_id: UserId, user_id: UserId) -> Result<()>;
    async fn unfollow(&self, follower_id: UserId, user_id: UserId) -> Result<()>;

    // Learning plans
    async fn plans(&self, user_id: UserId) -> Result<Vec<LearningPlan>>;
    async fn plan(&self, plan_id: PlanId) -> Result<LearningPlan>;
    async fn create_plan(&self, plan: &NewPlan) -> Result<LearningPlan>;
    async fn update_plan(&self, plan: &LearningPlan) -> Result<()>;
    async fn delete_plan(&self, plan_id: PlanId) -> Result<()>;
    async fn create_plan_item(&self, item: &NewPlanItem) -> Result<PlanItem>;
    async fn update_plan_item(&self, plan_id: PlanId, item: &PlanItem) -> Result<()>;
    async fn delete_plan_item(&self, item_id: ItemId) -> Result<()>;
    async fn complete_plan_item(&self, item_id: ItemId) -> Result<()>;

    // Learning updates
    async fn learning_updates(
        &self,
        user_id: UserId,
        filter: &UpdateFilter,
    ) -> Result<Vec<LearningUpdate>>;
    async fn create_learning_update(&self, update: &NewLearningUpdate) -> Result<LearningUpdate>;
    async fn update_learning_update_status(
        &self,
        update_id: UpdateId,
        status: LearningStatus,
        completion_percentage: u8,
    ) -> Result<()>;
    async fn delete_learning_update(&self, update_id: UpdateId) -> Result<()>;

    // Notifications
    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>>;
    async fn unread_notifications(&self, user_id: UserId) -> Result<Vec<Notification>>;
    async fn mark_notification_read(&self, notification_id: NotificationId) -> Result<()>;
    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<()>;
    async fn delete_notification(&self, notification_id: NotificationId) -> Result<()>;
    async fn delete_all_notifications(&self, user_id: UserId) -> Result<()>;

    // Broadcasts
    async fn admin_messages(&self) -> Result<Vec<BroadcastMessage>>;

    // Users
    async fn search_users(&self, query: &str) -> Result<Vec<User>>;
}

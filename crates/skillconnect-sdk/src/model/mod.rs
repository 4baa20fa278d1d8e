//! Wire types for the SkillConnect REST service
//!
//! Field names follow the service's camelCase JSON.

mod notifications;
mod plans;
mod posts;
mod social;
mod updates;

pub use notifications::{BroadcastMessage, Notification};
pub use plans::{LearningPlan, NewPlan, NewPlanItem, PlanItem, PlanRef};
pub use posts::{BackendPost, LegacyAuthor, LegacyPost, NewPost, PostRecord};
pub use social::{Comment, FollowEdge, Like, NewComment, PostRef, User, UserRef};
pub use updates::{LearningStatus, LearningUpdate, NewLearningUpdate, UpdateFilter};

pub type UserId = i64;
pub type PostId = i64;
pub type CommentId = i64;
pub type PlanId = i64;
pub type ItemId = i64;
pub type UpdateId = i64;
pub type NotificationId = i64;
pub type MessageId = i64;

/// Allocates identifiers for entities that exist only locally until the
/// server assigns a real one. Local ids are negative so they never collide
/// with server ids.
#[derive(Debug, Default)]
pub struct LocalIds {
    next: i64,
}

impl LocalIds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&mut self) -> i64 {
        self.next -= 1;
        self.next
    }
}

/// True for ids handed out by [`LocalIds`]
pub fn is_local_id(id: i64) -> bool {
    id < 0
}

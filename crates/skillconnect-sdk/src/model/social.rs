use super::{CommentId, PostId, UserId};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// User profile as embedded in other entities
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub profile_image: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl User {
    pub fn display_name(&self) -> String {
        let first = self.first_name.as_deref().unwrap_or("");
        let last = self.last_name.as_deref().unwrap_or("");
        let name = format!("{} {}", first, last).trim().to_string();
        if name.is_empty() {
            self.username.clone().unwrap_or_else(|| "Unknown User".to_string())
        } else {
            name
        }
    }
}

/// Reference to a user by id only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub user_id: UserId,
}

/// Reference to a post by id only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostRef {
    pub post_id: PostId,
}

/// Comment on a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub comment_id: CommentId,
    pub content: String,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub post: Option<PostRef>,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

/// Body for creating a comment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    pub content: String,
    pub user: UserRef,
    pub post: PostRef,
}

/// One user's like of a post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Like {
    #[serde(default)]
    pub like_id: Option<i64>,
    pub user: UserRef,
}

/// Follow relationship body (`follower` follows `user`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowEdge {
    pub follower: UserRef,
    pub user: UserRef,
}

impl FollowEdge {
    pub fn new(follower: UserId, user: UserId) -> Self {
        Self {
            follower: UserRef { user_id: follower },
            user: UserRef { user_id: user },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_from_service_json() {
        let json = r#"{
            "commentId": 9,
            "content": "Nice!",
            "user": {"userId": 3, "firstName": "Ada", "lastName": "Lovelace"},
            "post": {"postId": 4},
            "createdAt": "2024-05-01T10:15:30"
        }"#;
        let comment: Comment = serde_json::from_str(json).unwrap();
        assert_eq!(comment.comment_id, 9);
        assert_eq!(comment.user.unwrap().display_name(), "Ada Lovelace");
        assert_eq!(comment.post, Some(PostRef { post_id: 4 }));
    }

    #[test]
    fn test_follow_edge_shape() {
        let json = serde_json::to_value(FollowEdge::new(1, 2)).unwrap();
        assert_eq!(json["follower"]["userId"], 1);
        assert_eq!(json["user"]["userId"], 2);
    }
}

use super::{PostId, User, UserRef};
use crate::error::{Result, SdkError};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Post as returned by the REST service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendPost {
    pub post_id: PostId,
    #[serde(default)]
    pub title: Option<String>,
    pub description: String,
    pub user: User,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub media1: Option<String>,
    #[serde(default)]
    pub media2: Option<String>,
    #[serde(default)]
    pub media3: Option<String>,
    #[serde(default)]
    pub likes: Option<u32>,
}

/// Author block of bundled sample posts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyAuthor {
    pub name: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Post in the older sample-data shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyPost {
    pub id: PostId,
    #[serde(default)]
    pub title: Option<String>,
    pub content: String,
    #[serde(default)]
    pub author: Option<LegacyAuthor>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub likes: Option<u32>,
}

/// A post from either source, classified once when it enters the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PostRecord {
    Backend(BackendPost),
    Legacy(LegacyPost),
}

impl PostRecord {
    /// Classify a raw JSON post.
    ///
    /// Service posts carry both `user` and `description`; anything else is
    /// treated as the legacy sample shape.
    pub fn ingest(value: serde_json::Value) -> Result<Self> {
        let is_backend = value.get("user").is_some_and(|u| !u.is_null())
            && value.get("description").is_some_and(|d| !d.is_null());

        let record = if is_backend {
            PostRecord::Backend(serde_json::from_value(value)?)
        } else {
            PostRecord::Legacy(serde_json::from_value(value).map_err(|e| {
                SdkError::Serialization(format!("unrecognised post shape: {}", e))
            })?)
        };
        Ok(record)
    }

    pub fn post_id(&self) -> PostId {
        match self {
            PostRecord::Backend(p) => p.post_id,
            PostRecord::Legacy(p) => p.id,
        }
    }

    pub fn author_name(&self) -> String {
        match self {
            PostRecord::Backend(p) => p.user.display_name(),
            PostRecord::Legacy(p) => p
                .author
                .as_ref()
                .map(|a| a.name.clone())
                .unwrap_or_else(|| "Unknown User".to_string()),
        }
    }

    pub fn author_avatar(&self) -> Option<&str> {
        match self {
            PostRecord::Backend(p) => p.user.profile_image.as_deref(),
            PostRecord::Legacy(p) => p.author.as_ref().and_then(|a| a.avatar.as_deref()),
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self {
            PostRecord::Backend(p) => p.title.as_deref(),
            PostRecord::Legacy(p) => p.title.as_deref(),
        }
        .filter(|t| !t.is_empty())
    }

    pub fn body(&self) -> &str {
        match self {
            PostRecord::Backend(p) => &p.description,
            PostRecord::Legacy(p) => &p.content,
        }
    }

    /// Non-empty media references in slot order
    pub fn media(&self) -> Vec<&str> {
        match self {
            PostRecord::Backend(p) => [&p.media1, &p.media2, &p.media3]
                .into_iter()
                .filter_map(|m| m.as_deref())
                .filter(|m| !m.is_empty())
                .collect(),
            PostRecord::Legacy(p) => p.image.as_deref().into_iter().collect(),
        }
    }

    pub fn like_count(&self) -> u32 {
        match self {
            PostRecord::Backend(p) => p.likes.unwrap_or(0),
            PostRecord::Legacy(p) => p.likes.unwrap_or(0),
        }
    }
}

/// Body for creating a post
///
/// Always carries exactly three media fields; unused ones are empty strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPost {
    pub description: String,
    pub user: UserRef,
    pub media1: String,
    pub media2: String,
    pub media3: String,
}

impl NewPost {
    pub fn new(description: impl Into<String>, user_id: i64, media: [String; 3]) -> Self {
        let [media1, media2, media3] = media;
        Self {
            description: description.into(),
            user: UserRef { user_id },
            media1,
            media2,
            media3,
        }
    }
}

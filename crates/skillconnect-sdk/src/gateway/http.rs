//! HTTP implementation of [`RemoteGateway`] for the SkillConnect REST service

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use super::credentials::CredentialSource;
use super::traits::RemoteGateway;
use crate::config::ApiConfig;
use crate::error::{Result, SdkError};
use crate::model::*;

/// Error body shape returned by the service
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

/// REST client for the SkillConnect service
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use skillconnect_sdk::config::ApiConfig;
/// use skillconnect_sdk::gateway::{HttpGateway, RemoteGateway, StaticCredential};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let gateway = HttpGateway::new(&ApiConfig::default(), Arc::new(StaticCredential::new("jwt")))?;
/// let plans = gateway.plans(7).await?;
/// # Ok(())
/// # }
/// ```
pub struct HttpGateway {
    base_url: String,
    client: Client,
    credentials: Arc<dyn CredentialSource>,
}

impl HttpGateway {
    /// Create a new gateway
    pub fn new(config: &ApiConfig, credentials: Arc<dyn CredentialSource>) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(SdkError::Config("api.base_url is empty".into()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client,
            credentials,
        })
    }

    /// Base URL requests are issued against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self
            .client
            .request(method, format!("{}{}", self.base_url, path))
            .header(header::CONTENT_TYPE, "application/json");

        match self.credentials.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    // ==================== Helper Methods ====================

    /// Send the request and return the raw body of a successful response
    async fn execute(&self, builder: RequestBuilder) -> Result<String> {
        let response = builder.send().await?;
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            warn!("Credential rejected by service, clearing it");
            self.credentials.clear();
            return Err(SdkError::Unauthorized);
        }

        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.contains("application/json"));
        let body = response.text().await?;

        if !status.is_success() {
            let message = is_json
                .then(|| serde_json::from_str::<ErrorBody>(&body).ok())
                .flatten()
                .and_then(|b| b.message)
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Something went wrong")
                        .to_string()
                });
            debug!(status = status.as_u16(), %message, "Request rejected");
            return Err(SdkError::RemoteRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
        let body = self.execute(builder).await?;
        if body.trim().is_empty() {
            return Err(SdkError::Serialization("empty response body".into()));
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Send a mutation whose response body carries nothing we use
    async fn send(&self, builder: RequestBuilder) -> Result<()> {
        self.execute(builder).await.map(|_| ())
    }
}

fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    // ==================== Posts ====================

    async fn load_feed(&self, user_id: UserId) -> Result<Vec<serde_json::Value>> {
        self.fetch(self.request(Method::GET, &format!("/posts/loadfeed/{}", user_id)))
            .await
    }

    async fn user_posts(&self, user_id: UserId) -> Result<Vec<serde_json::Value>> {
        self.fetch(self.request(Method::GET, &format!("/posts/user/{}", user_id)))
            .await
    }

    async fn create_post(&self, post: &NewPost) -> Result<BackendPost> {
        self.fetch(self.request(Method::POST, "/posts").json(post))
            .await
    }

    async fn delete_post(&self, post_id: PostId) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/posts/{}", post_id)))
            .await
    }

    // ==================== Likes ====================

    async fn likes(&self, post_id: PostId) -> Result<Vec<Like>> {
        self.fetch(self.request(Method::GET, &format!("/likes/{}", post_id)))
            .await
    }

    async fn like(&self, post_id: PostId, user_id: UserId) -> Result<()> {
        self.send(self.request(
            Method::POST,
            &format!("/likes/{}/user/{}", post_id, user_id),
        ))
        .await
    }

    async fn unlike(&self, post_id: PostId, user_id: UserId) -> Result<()> {
        self.send(self.request(
            Method::DELETE,
            &format!("/likes/{}/user/{}", post_id, user_id),
        ))
        .await
    }

    // ==================== Comments ====================

    async fn comments(&self, post_id: PostId) -> Result<Vec<Comment>> {
        self.fetch(self.request(Method::GET, &format!("/comments/post/{}", post_id)))
            .await
    }

    async fn create_comment(&self, comment: &NewComment) -> Result<Comment> {
        self.fetch(self.request(Method::POST, "/comments").json(comment))
            .await
    }

    async fn update_comment(&self, comment: &Comment) -> Result<Comment> {
        self.fetch(self.request(Method::PUT, "/comments").json(comment))
            .await
    }

    async fn delete_comment(&self, comment_id: CommentId) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/comments/{}", comment_id)))
            .await
    }

    // ==================== Follows ====================

    async fn follower_count(&self, user_id: UserId) -> Result<u32> {
        self.fetch(self.request(
            Method::GET,
            &format!("/follow/{}/followers/count", user_id),
        ))
        .await
    }

    async fn is_following(&self, follower_id: UserId, user_id: UserId) -> Result<bool> {
        self.fetch(self.request(
            Method::GET,
            &format!(
                "/follow/check?followerId={}&followingId={}",
                follower_id, user_id
            ),
        ))
        .await
    }

    async fn follow(&self, follower_id: UserId, user_id: UserId) -> Result<()> {
        let edge = FollowEdge::new(follower_id, user_id);
        self.send(self.request(Method::POST, "/follow").json(&edge))
            .await
    }

    async fn unfollow(&self, follower_id: UserId, user_id: UserId) -> Result<()> {
        let edge = FollowEdge::new(follower_id, user_id);
        self.send(self.request(Method::DELETE, "/follow").json(&edge))
            .await
    }

    // ==================== Learning plans ====================

    async fn plans(&self, user_id: UserId) -> Result<Vec<LearningPlan>> {
        self.fetch(self.request(Method::GET, &format!("/learning-plans/user/{}", user_id)))
            .await
    }

    async fn plan(&self, plan_id: PlanId) -> Result<LearningPlan> {
        self.fetch(self.request(Method::GET, &format!("/learning-plans/{}", plan_id)))
            .await
    }

    async fn create_plan(&self, plan: &NewPlan) -> Result<LearningPlan> {
        self.fetch(self.request(Method::POST, "/learning-plans").json(plan))
            .await
    }

    async fn update_plan(&self, plan: &LearningPlan) -> Result<()> {
        self.send(self.request(Method::PUT, "/learning-plans").json(plan))
            .await
    }

    async fn delete_plan(&self, plan_id: PlanId) -> Result<()> {
        self.send(self.request(Method::DELETE, &format!("/learning-plans/{}", plan_id)))
            .await
    }

    async fn create_plan_item(&self, item: &NewPlanItem) -> Result<PlanItem> {
        self.fetch(self.request(Method::POST, "/learning-plan-items").json(item))
            .await
    }

    async fn update_plan_item(&self, plan_id: PlanId, item: &PlanItem) -> Result<()> {
        let body = serde_json::json!({
            "itemId": item.item_id,
            "title": item.title,
            "complete": item.complete,
            "learningPlan": { "planId": plan_id },
        });
        self.send(self.request(Method::PUT, "/learning-plan-items").json(&body))
            .await
    }

    async fn delete_plan_item(&self, item_id: ItemId) -> Result<()> {
        self.send(self.request(
            Method::DELETE,
            &format!("/learning-plan-items/{}", item_id),
        ))
        .await
    }

    async fn complete_plan_item(&self, item_id: ItemId) -> Result<()> {
        self.send(self.request(
            Method::PUT,
            &format!("/learning-plan-items/{}/complete", item_id),
        ))
        .await
    }

    // ==================== Learning updates ====================

    async fn learning_updates(
        &self,
        user_id: UserId,
        filter: &UpdateFilter,
    ) -> Result<Vec<LearningUpdate>> {
        // The service filters on one facet at a time
        let base = format!("/learning-updates/user/{}", user_id);
        let path = if let Some(status) = filter.status {
            format!("{}/status/{}", base, encode(status.as_str()))
        } else if let Some(ref category) = filter.category {
            format!("{}/category/{}", base, encode(category))
        } else if let Some(ref kind) = filter.kind {
            format!("{}/type/{}", base, encode(kind))
        } else if let Some(ref level) = filter.level {
            format!("{}/level/{}", base, encode(level))
        } else {
            base
        };

        self.fetch(self.request(Method::GET, &path)).await
    }

    async fn create_learning_update(&self, update: &NewLearningUpdate) -> Result<LearningUpdate> {
        self.fetch(self.request(Method::POST, "/learning-updates").json(update))
            .await
    }

    async fn update_learning_update_status(
        &self,
        update_id: UpdateId,
        status: LearningStatus,
        completion_percentage: u8,
    ) -> Result<()> {
        let path = format!(
            "/learning-updates/{}/status?status={}&completionPercentage={}",
            update_id,
            encode(status.as_str()),
            completion_percentage
        );
        self.send(self.request(Method::PUT, &path)).await
    }

    async fn delete_learning_update(&self, update_id: UpdateId) -> Result<()> {
        self.send(self.request(
            Method::DELETE,
            &format!("/learning-updates/{}", update_id),
        ))
        .await
    }

    // ==================== Notifications ====================

    async fn notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.fetch(self.request(Method::GET, &format!("/notifications/user/{}", user_id)))
            .await
    }

    async fn unread_notifications(&self, user_id: UserId) -> Result<Vec<Notification>> {
        self.fetch(self.request(
            Method::GET,
            &format!("/notifications/user/{}/unread", user_id),
        ))
        .await
    }

    async fn mark_notification_read(&self, notification_id: NotificationId) -> Result<()> {
        self.send(self.request(
            Method::PUT,
            &format!("/notifications/{}/read", notification_id),
        ))
        .await
    }

    async fn mark_all_notifications_read(&self, user_id: UserId) -> Result<()> {
        self.send(self.request(
            Method::PUT,
            &format!("/notifications/user/{}/read-all", user_id),
        ))
        .await
    }

    async fn delete_notification(&self, notification_id: NotificationId) -> Result<()> {
        self.send(self.request(
            Method::DELETE,
            &format!("/notifications/{}", notification_id),
        ))
        .await
    }

    async fn delete_all_notifications(&self, user_id: UserId) -> Result<()> {
        self.send(self.request(
            Method::DELETE,
            &format!("/notifications/user/{}", user_id),
        ))
        .await
    }

    // ==================== Broadcasts ====================

    async fn admin_messages(&self) -> Result<Vec<BroadcastMessage>> {
        self.fetch(self.request(Method::GET, "/admin-messages")).await
    }

    // ==================== Users ====================

    async fn search_users(&self, query: &str) -> Result<Vec<User>> {
        self.fetch(self.request(Method::GET, &format!("/users/search/{}", encode(query))))
            .await
    }
}

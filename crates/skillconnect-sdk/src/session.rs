//! One signed-in application session
//!
//! A [`Session`] is built once at startup and owns every long-lived
//! dependency: the REST gateway, the optional object store, the durable key
//! store and the notice channel. Stores and composers are handed out from
//! it; none of them reach for process-wide state.

use std::sync::Arc;
use std::time::Duration;

use skillconnect_storage_client::{ObjectStore, StorageClient};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::banner::BannerTracker;
use crate::config::ClientConfig;
use crate::engine::{
    EngagementStore, FeedStore, FollowStore, LearningUpdateStore, NotificationStore, PlanStore,
    StoreContext,
};
use crate::error::Result;
use crate::gateway::{CredentialSource, HttpGateway, KeyValueCredential, RemoteGateway};
use crate::kv::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::media::{ContainerProbe, MediaComposer, MediaProbe, PreviewRegistry};
use crate::model::UserId;
use crate::notice::Notifier;
use crate::poll::Poller;
use crate::search::{UserSearch, DEFAULT_QUIET};

pub struct Session {
    config: ClientConfig,
    user_id: UserId,
    gateway: Arc<dyn RemoteGateway>,
    objects: Option<Arc<dyn ObjectStore>>,
    kv: Arc<dyn KeyValueStore>,
    notifier: Notifier,
    probe: Arc<dyn MediaProbe>,
    previews: PreviewRegistry,
    shutdown: CancellationToken,

    feed: Arc<FeedStore>,
    engagement: Arc<EngagementStore>,
    follows: Arc<FollowStore>,
    plans: Arc<PlanStore>,
    updates: Arc<LearningUpdateStore>,
    notifications: Arc<NotificationStore>,
    banner: Arc<BannerTracker>,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        user_id: UserId,
        gateway: Arc<dyn RemoteGateway>,
        objects: Option<Arc<dyn ObjectStore>>,
        kv: Arc<dyn KeyValueStore>,
    ) -> Self {
        let notifier = Notifier::new();
        let timeout = config.api.request_timeout();
        let ctx = StoreContext::new(gateway.clone(), notifier.clone(), user_id).with_timeout(timeout);

        Self {
            feed: Arc::new(FeedStore::new(ctx.clone())),
            engagement: Arc::new(EngagementStore::new(ctx.clone())),
            follows: Arc::new(FollowStore::new(ctx.clone())),
            plans: Arc::new(PlanStore::new(ctx.clone())),
            updates: Arc::new(LearningUpdateStore::new(ctx.clone())),
            notifications: Arc::new(NotificationStore::new(ctx)),
            banner: Arc::new(BannerTracker::new(
                gateway.clone(),
                kv.clone(),
                notifier.clone(),
                timeout,
            )),
            config,
            user_id,
            gateway,
            objects,
            kv,
            notifier,
            probe: Arc::new(ContainerProbe),
            previews: PreviewRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }

    /// Build every dependency from configuration.
    ///
    /// Without a state directory the key store is in memory. Without
    /// complete storage settings (or if the storage client cannot be
    /// built) the session has no object store and media uploads report the
    /// service as unavailable.
    pub fn from_config(
        config: ClientConfig,
        user_id: UserId,
        credentials: Option<Arc<dyn CredentialSource>>,
    ) -> Result<Self> {
        let kv: Arc<dyn KeyValueStore> = match &config.client.state_dir {
            Some(dir) => Arc::new(JsonFileStore::open_dir(dir)?),
            None => Arc::new(MemoryStore::new()),
        };

        let credentials = credentials.unwrap_or_else(|| {
            Arc::new(KeyValueCredential::new(kv.clone())) as Arc<dyn CredentialSource>
        });
        let gateway: Arc<dyn RemoteGateway> = Arc::new(HttpGateway::new(&config.api, credentials)?);

        let objects: Option<Arc<dyn ObjectStore>> = match config.storage.client_config() {
            Some(storage) => match StorageClient::new(storage) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn ObjectStore>),
                Err(e) => {
                    warn!(error = %e, "Object storage client could not be created");
                    None
                }
            },
            None => {
                info!("Object storage not configured; media uploads disabled");
                None
            }
        };

        info!(
            user_id,
            api = %config.api.base_url,
            uploads = objects.is_some(),
            "Session ready"
        );
        Ok(Self::new(config, user_id, gateway, objects, kv))
    }

    /// Replace the video duration probe
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn gateway(&self) -> &Arc<dyn RemoteGateway> {
        &self.gateway
    }

    pub fn kv(&self) -> &Arc<dyn KeyValueStore> {
        &self.kv
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn uploads_available(&self) -> bool {
        self.objects.is_some()
    }

    /// Preview accounting across every composer this session created
    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn feed(&self) -> &Arc<FeedStore> {
        &self.feed
    }

    pub fn engagement(&self) -> &Arc<EngagementStore> {
        &self.engagement
    }

    pub fn follows(&self) -> &Arc<FollowStore> {
        &self.follows
    }

    pub fn plans(&self) -> &Arc<PlanStore> {
        &self.plans
    }

    pub fn updates(&self) -> &Arc<LearningUpdateStore> {
        &self.updates
    }

    pub fn notifications(&self) -> &Arc<NotificationStore> {
        &self.notifications
    }

    pub fn banner(&self) -> &Arc<BannerTracker> {
        &self.banner
    }

    /// Start a post composition
    pub fn composer(&self) -> MediaComposer {
        MediaComposer::new(
            self.user_id.to_string(),
            self.objects.clone(),
            self.probe.clone(),
            self.notifier.clone(),
            self.config.media.clone(),
        )
        .with_previews(self.previews.clone())
    }

    /// Start a search-as-you-type session over the user directory
    pub fn user_search(&self) -> UserSearch {
        UserSearch::spawn(
            self.gateway.clone(),
            self.notifier.clone(),
            DEFAULT_QUIET,
            self.config.api.request_timeout(),
        )
    }

    /// Start the unread-count and banner refresh loops
    pub fn start_polling(&self) -> Vec<Poller> {
        let polling = &self.config.polling;

        let notifications = self.notifications.clone();
        let unread = Poller::spawn(
            "unread-notifications",
            Duration::from_secs(polling.unread_interval_secs),
            self.shutdown.child_token(),
            move || {
                let notifications = notifications.clone();
                async move { notifications.refresh().await }
            },
        );

        let banner = self.banner.clone();
        let broadcasts = Poller::spawn(
            "broadcast-banner",
            Duration::from_secs(polling.banner_interval_secs),
            self.shutdown.child_token(),
            move || {
                let banner = banner.clone();
                async move { banner.refresh().await }
            },
        );

        vec![unread, broadcasts]
    }

    /// Stop every poller started from this session
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::model::Notification;
    use skillconnect_storage_client::MemoryObjectStore;

    fn session(objects: Option<Arc<dyn ObjectStore>>) -> (Session, Arc<MockGateway>) {
        let gateway = Arc::new(MockGateway::new().with_notification(
            7,
            Notification {
                notification_id: 1,
                content: "Ada liked your post".into(),
                is_read: false,
                created_at: None,
            },
        ));
        let session = Session::new(
            ClientConfig::default(),
            7,
            gateway.clone(),
            objects,
            Arc::new(MemoryStore::new()),
        );
        (session, gateway)
    }

    #[test]
    fn test_from_config_without_storage() {
        let session = Session::from_config(ClientConfig::default(), 7, None).unwrap();
        assert!(!session.uploads_available());
        assert_eq!(session.user_id(), 7);
    }

    #[tokio::test]
    async fn test_composers_share_preview_accounting() {
        let (session, _) = session(Some(Arc::new(MemoryObjectStore::new())));
        assert!(session.uploads_available());

        let composer = session.composer();
        composer
            .select(vec![crate::media::MediaFile::new("a.png", "image/png", vec![1, 2, 3])])
            .await
            .unwrap();
        assert_eq!(session.previews().outstanding(), 1);
        drop(composer);
        assert_eq!(session.previews().outstanding(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_refreshes_unread() {
        let (session, gateway) = session(None);
        let pollers = session.start_polling();
        assert_eq!(pollers.len(), 2);

        gateway.wait_for_calls("notifications", 1).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(session.notifications().unread_count().await, 1);

        session.shutdown();
        for poller in pollers {
            poller.stop().await;
        }
    }
}

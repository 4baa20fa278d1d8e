//! SkillConnect client SDK
//!
//! Client-side state for the SkillConnect social learning platform:
//!
//! - **Optimistic mutation engine** ([`engine`]): plans, likes, comments,
//!   follows, learning updates, notifications and the feed are changed
//!   locally first, then reconciled with the REST service. Failures revert
//!   or resync and are published as [`Notice`]s.
//! - **Media pipeline** ([`media`]): validates picked files, probes video
//!   length, uploads to object storage one file at a time and produces the
//!   fixed three-slot media payload of a post.
//! - **Broadcast banner** ([`banner`]), periodic refresh ([`poll`]) and
//!   debounced user search ([`search`]).
//!
//! Everything is reached through a [`Session`], built once per sign-in.
//!
//! # Example
//!
//! ```rust,no_run
//! use skillconnect_sdk::{ClientConfig, Session};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::load("skillconnect.toml".as_ref())?.apply_env();
//! let session = Session::from_config(config, 42, None)?;
//!
//! session.plans().load().await?;
//! let outcome = session.plans().toggle_item(1, 7).await?;
//! if let Some(err) = outcome.error() {
//!     eprintln!("reverted: {}", err);
//! }
//! # Ok(())
//! # }
//! ```

pub mod banner;
pub mod config;
pub mod engine;
pub mod error;
pub mod format;
pub mod gateway;
pub mod kv;
pub mod logging;
pub mod media;
pub mod model;
pub mod notice;
pub mod poll;
pub mod search;
pub mod session;
pub mod task;

pub use banner::BannerTracker;
pub use config::ClientConfig;
pub use engine::{
    EngagementStore, FeedStore, FollowStore, LearningUpdateStore, NotificationStore, Outcome,
    PlanStore, StoreContext,
};
pub use error::{MediaError, Result, SdkError};
pub use gateway::{HttpGateway, MockGateway, RemoteGateway};
pub use kv::{JsonFileStore, KeyValueStore, MemoryStore};
pub use media::{MediaComposer, MediaFile, MediaSlots};
pub use notice::{Action, Notice, NoticeLevel, Notifier};
pub use poll::Poller;
pub use search::UserSearch;
pub use session::Session;

pub use skillconnect_storage_client as storage;

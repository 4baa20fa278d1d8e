//! Broadcast banner suppression across restarts

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use skillconnect_sdk::banner::DISMISSED_KEY;
use skillconnect_sdk::model::BroadcastMessage;
use skillconnect_sdk::{BannerTracker, JsonFileStore, KeyValueStore, MockGateway, Notifier};

fn message(id: i64, day: u32) -> BroadcastMessage {
    BroadcastMessage {
        message_id: id,
        title: format!("Update {}", id),
        content: "Scheduled maintenance".into(),
        created_at: NaiveDate::from_ymd_opt(2024, 6, day).and_then(|d| d.and_hms_opt(12, 0, 0)),
        priority: None,
    }
}

fn tracker(gateway: &Arc<MockGateway>, dir: &std::path::Path) -> BannerTracker {
    let kv = Arc::new(JsonFileStore::open_dir(dir).unwrap());
    BannerTracker::new(gateway.clone(), kv, Notifier::new(), Duration::from_secs(5))
}

#[tokio::test]
async fn dismissed_banner_stays_hidden_until_newer_message() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(
        MockGateway::new()
            .with_admin_message(message(4, 1))
            .with_admin_message(message(5, 2)),
    );

    let first = tracker(&gateway, dir.path());
    let shown = first.refresh().await.unwrap().unwrap();
    assert_eq!(shown.message_id, 5);
    first.dismiss().unwrap();
    drop(first);

    // Same newest message after a restart: still hidden
    let reloaded = tracker(&gateway, dir.path());
    assert_eq!(reloaded.last_dismissed(), Some(5));
    assert!(reloaded.refresh().await.unwrap().is_none());

    // A newer message shows even though 5 is still recorded
    gateway.set_admin_messages(vec![message(5, 2), message(6, 3)]);
    let shown = reloaded.refresh().await.unwrap().unwrap();
    assert_eq!(shown.message_id, 6);

    let kv = JsonFileStore::open_dir(dir.path()).unwrap();
    assert_eq!(kv.get(DISMISSED_KEY).as_deref(), Some("5"));
}

#[tokio::test]
async fn no_messages_means_no_banner() {
    let dir = tempfile::tempdir().unwrap();
    let gateway = Arc::new(MockGateway::new());
    let tracker = tracker(&gateway, dir.path());

    assert!(tracker.refresh().await.unwrap().is_none());
    tracker.dismiss().unwrap();
    assert_eq!(tracker.last_dismissed(), None);
}

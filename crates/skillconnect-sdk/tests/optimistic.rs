//! Behaviour of the optimistic stores against a scripted gateway

use std::sync::Arc;

use skillconnect_sdk::engine::{EngagementStore, FieldPhase, PlanStore, StoreContext};
use skillconnect_sdk::model::{LearningPlan, PlanItem, UserRef};
use skillconnect_sdk::notice::{drain, NoticeLevel};
use skillconnect_sdk::{Action, MockGateway, Notifier, Outcome, SdkError};

const ME: i64 = 7;

fn plan(plan_id: i64, done: &[bool]) -> LearningPlan {
    LearningPlan {
        plan_id,
        title: "Rust in practice".into(),
        description: None,
        start_date: None,
        end_date: None,
        user: Some(UserRef { user_id: ME }),
        items: done
            .iter()
            .enumerate()
            .map(|(i, complete)| PlanItem {
                item_id: plan_id * 10 + i as i64 + 1,
                title: format!("Chapter {}", i + 1),
                complete: *complete,
            })
            .collect(),
    }
}

fn expected_progress(plan: &LearningPlan) -> u8 {
    if plan.items.is_empty() {
        return 0;
    }
    let done = plan.items.iter().filter(|i| i.complete).count();
    (done as f64 / plan.items.len() as f64 * 100.0).round() as u8
}

async fn assert_progress_consistent(store: &PlanStore, plan_id: i64) {
    let plan = store.plan(plan_id).await.unwrap();
    assert_eq!(store.progress(plan_id).await, Some(expected_progress(&plan)));
}

#[tokio::test]
async fn progress_tracks_items_through_every_mutation() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[true, false, false])));
    let store = PlanStore::new(StoreContext::new(gateway.clone(), Notifier::new(), ME));
    store.load().await.unwrap();
    assert_eq!(store.progress(1).await, Some(33));

    store.toggle_item(1, 12).await.unwrap();
    assert_progress_consistent(&store, 1).await;
    assert_eq!(store.progress(1).await, Some(67));

    gateway.fail_next("update_plan_item", SdkError::Transport("offline".into()));
    store.toggle_item(1, 13).await.unwrap();
    assert_progress_consistent(&store, 1).await;
    assert_eq!(store.progress(1).await, Some(67));

    store.add_item(1, "Chapter 4").await.unwrap();
    assert_progress_consistent(&store, 1).await;
    assert_eq!(store.progress(1).await, Some(50));

    gateway.fail_next("create_plan_item", SdkError::Timeout(15));
    store.add_item(1, "Chapter 5").await.unwrap();
    assert_progress_consistent(&store, 1).await;

    store.delete_item(1, 11).await.unwrap();
    assert_progress_consistent(&store, 1).await;
    assert_eq!(store.progress(1).await, Some(33));
}

#[tokio::test]
async fn revert_restores_exact_previous_state() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[true, false])));
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let store = PlanStore::new(StoreContext::new(gateway.clone(), notifier, ME));
    store.load().await.unwrap();

    let before = store.plans().await;
    let progress_before = store.progress(1).await;

    for op in ["update_plan_item", "update_plan_item", "update_plan"] {
        gateway.fail_next(op, SdkError::RemoteRejected { status: 500, message: "boom".into() });
    }
    let toggled = store.toggle_item(1, 12).await.unwrap();
    let renamed = store.rename_item(1, 11, "Ownership").await.unwrap();
    let edited = store.edit_plan(1, "New title", Some("desc")).await.unwrap();

    assert!(matches!(toggled, Outcome::Reverted(_)));
    assert!(matches!(renamed, Outcome::Reverted(_)));
    assert!(matches!(edited, Outcome::Reverted(_)));
    assert_eq!(store.plans().await, before);
    assert_eq!(store.progress(1).await, progress_before);

    let published = drain(&mut notices);
    assert_eq!(published.len(), 3);
    assert!(published.iter().all(|n| n.level == NoticeLevel::Error));
    assert_eq!(published[0].action, Action::ToggleItem { plan_id: 1, item_id: 12 });
}

#[tokio::test]
async fn late_response_does_not_override_last_intent() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[false, false])));
    let store = Arc::new(PlanStore::new(StoreContext::new(gateway.clone(), Notifier::new(), ME)));
    store.load().await.unwrap();

    let hold = gateway.hold_next("update_plan_item");
    let first = tokio::spawn({
        let store = store.clone();
        async move { store.toggle_item(1, 11).await }
    });
    gateway.wait_for_calls("update_plan_item", 1).await;
    assert!(store.plan(1).await.unwrap().items[0].complete);

    let second = store.toggle_item(1, 11).await.unwrap();
    assert!(second.is_confirmed());

    hold.release();
    let first = first.await.unwrap().unwrap();
    assert!(matches!(first, Outcome::Superseded));

    let plan = store.plan(1).await.unwrap();
    assert!(!plan.items[0].complete);
    assert_eq!(store.progress(1).await, Some(0));
}

#[tokio::test]
async fn late_failure_of_superseded_intent_is_ignored() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[false])));
    let notifier = Notifier::new();
    let mut notices = notifier.subscribe();
    let store = Arc::new(PlanStore::new(StoreContext::new(gateway.clone(), notifier, ME)));
    store.load().await.unwrap();

    let hold = gateway.hold_next("update_plan_item");
    let first = tokio::spawn({
        let store = store.clone();
        async move { store.toggle_item(1, 11).await }
    });
    gateway.wait_for_calls("update_plan_item", 1).await;

    let second = store.toggle_item(1, 11).await.unwrap();
    assert!(second.is_confirmed());

    gateway.fail_next("update_plan_item", SdkError::Transport("reset".into()));
    hold.release();
    assert!(matches!(first.await.unwrap().unwrap(), Outcome::Superseded));
    assert!(!store.plan(1).await.unwrap().items[0].complete);

    let published = drain(&mut notices);
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].level, NoticeLevel::Warning);
}

#[tokio::test]
async fn toggle_and_rename_of_one_item_both_reach_server() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[false, false])));
    let store = Arc::new(PlanStore::new(StoreContext::new(gateway.clone(), Notifier::new(), ME)));
    store.load().await.unwrap();

    let hold = gateway.hold_next("update_plan_item");
    let toggled = tokio::spawn({
        let store = store.clone();
        async move { store.toggle_item(1, 11).await }
    });
    gateway.wait_for_calls("update_plan_item", 1).await;

    let renamed = store.rename_item(1, 11, "Borrow checker").await.unwrap();
    assert!(renamed.is_confirmed());

    hold.release();
    assert!(matches!(toggled.await.unwrap().unwrap(), Outcome::Superseded));

    let local = store.plan(1).await.unwrap().items[0].clone();
    assert_eq!(local.title, "Borrow checker");
    assert!(local.complete);
    assert_eq!(gateway.server_plan(1).unwrap().items[0], local);
    assert_eq!(store.item_phase(11).await, FieldPhase::Stable);
}

#[tokio::test]
async fn late_toggle_write_does_not_leave_server_behind() {
    let gateway = Arc::new(MockGateway::new().with_plan(plan(1, &[false])));
    let store = Arc::new(PlanStore::new(StoreContext::new(gateway.clone(), Notifier::new(), ME)));
    store.load().await.unwrap();

    let hold = gateway.hold_next("update_plan_item");
    let first = tokio::spawn({
        let store = store.clone();
        async move { store.toggle_item(1, 11).await }
    });
    gateway.wait_for_calls("update_plan_item", 1).await;
    assert!(store.toggle_item(1, 11).await.unwrap().is_confirmed());

    hold.release();
    first.await.unwrap().unwrap();

    assert!(!store.plan(1).await.unwrap().items[0].complete);
    assert!(!gateway.server_plan(1).unwrap().items[0].complete);
}

#[tokio::test]
async fn like_toggles_stay_symmetric() {
    let gateway = Arc::new(MockGateway::new().with_likes(5, vec![1, 2, 3]));
    let store = EngagementStore::new(StoreContext::new(gateway.clone(), Notifier::new(), ME));
    store.load_post(5).await.unwrap();

    let initial = store.engagement(5).await.unwrap();
    assert_eq!(initial.like_count(), 3);
    assert!(!initial.is_liked_by(ME));

    // Every third toggle fails; the rest succeed
    for round in 0..10 {
        if round % 3 == 2 {
            let liked = store.engagement(5).await.unwrap().is_liked_by(ME);
            let op = if liked { "unlike" } else { "like" };
            gateway.fail_next(op, SdkError::Transport("offline".into()));
        }
        store.toggle_like(5).await.unwrap();

        let now = store.engagement(5).await.unwrap();
        let liked = now.is_liked_by(ME);
        assert_eq!(now.like_count(), initial.like_count() + usize::from(liked), "round {}", round);
        assert_eq!(gateway.server_likes(5).contains(&ME), liked, "round {}", round);
    }

    // Rounds 2, 5 and 8 failed, so seven toggles landed: an odd number
    assert!(store.engagement(5).await.unwrap().is_liked_by(ME));
}

//! Inbox store integration tests
//!
//! Drives an `InboxStore` over a seeded `MemoryGateway` and checks the
//! published snapshots.

mod common;

use common::*;
use pretty_assertions::assert_eq;
use roamly_inbox::gateway::MemoryGateway;
use roamly_inbox::inbox::{InboxHandle, InboxStore, ListState, LiveStatus};
use roamly_inbox::shared::{ChangeKind, GatewayError, InboxConfig, RealtimeEvent, Viewer};
use serde_json::json;
use std::time::Duration;

async fn live_inbox(gateway: &MemoryGateway, viewer: Viewer) -> InboxHandle {
    let inbox = InboxStore::spawn(shared(gateway), &InboxConfig::default());
    assert_ok!(inbox.sign_in(viewer).await);
    wait_snapshot(&inbox, |s| s.live == LiveStatus::Live).await;
    inbox
}

#[tokio::test]
async fn test_tourist_inbox_is_sorted_and_enriched() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    let snapshot = inbox.snapshot();
    assert_ids!(snapshot, ["c2", "c1"]);
    assert_eq!(snapshot.unread, 1);

    let newest = &snapshot.list.summaries()[0];
    assert_eq!(newest.counterpart_name.as_deref(), Some("Alfama Stays"));
    assert_eq!(newest.listing_title.as_deref(), Some("Rooftop loft"));
}

#[tokio::test]
async fn test_provider_badge_counts_provider_side_only() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::provider("p1")).await;

    let snapshot = inbox.snapshot();
    assert_ids!(snapshot, ["c1", "c3"]);
    assert_eq!(snapshot.unread, 3);
    assert_eq!(
        snapshot.list.summaries()[1].counterpart_name.as_deref(),
        Some("Jonas Berg")
    );
}

#[tokio::test]
async fn test_update_patches_and_resorts() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    assert_ok!(
        gateway
            .update(
                "conversations",
                "c1",
                json!({"last_message": "See you at 6", "last_message_at": "2024-04-01T08:00:00.000+00:00", "tourist_unread": 2}),
            )
            .await
    );

    let snapshot = wait_snapshot(&inbox, |s| s.unread == 2).await;
    assert_ids!(snapshot, ["c1", "c2"]);
    let c1 = &snapshot.list.summaries()[0];
    assert_eq!(c1.conversation.last_message.as_deref(), Some("See you at 6"));
    assert_eq!(c1.counterpart_name.as_deref(), Some("Fjord Kayaks"));
}

#[tokio::test]
async fn test_unread_scenario_one_to_zero() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    assert_eq!(inbox.snapshot().unread, 1);

    assert_ok!(gateway.update("conversations", "c1", json!({"tourist_unread": 0})).await);

    let snapshot = wait_snapshot(&inbox, |s| s.unread == 0).await;
    assert_eq!(snapshot.list.summaries().len(), 2);
}

#[tokio::test]
async fn test_delete_of_unknown_id_is_noop() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    let channel = gateway.channel("conversations");
    gateway.emit(
        &channel,
        RealtimeEvent::for_document(&channel, ChangeKind::Delete, json!({"$id": "ghost", "tourist_id": "t1"})),
    );
    // A later event proves the delete was processed first
    assert_ok!(gateway.update("conversations", "c2", json!({"tourist_unread": 5})).await);

    let snapshot = wait_snapshot(&inbox, |s| s.unread == 6).await;
    assert_ids!(snapshot, ["c2", "c1"]);
}

#[tokio::test]
async fn test_delete_removes_row() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let calls = gateway.list_calls();

    assert_ok!(gateway.delete("conversations", "c1").await);

    let snapshot = wait_snapshot(&inbox, |s| s.list.summaries().len() == 1).await;
    assert_ids!(snapshot, ["c2"]);
    assert_eq!(snapshot.unread, 0);
    assert_eq!(gateway.list_calls(), calls, "delete must not refetch");
}

#[tokio::test]
async fn test_create_for_viewer_refetches_with_joins() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    gateway
        .insert("conversations", conversation("c4", "t1", "p1", "l2", Some("2024-05-01T00:00:00.000+00:00"), 3, 0))
        .await;

    let snapshot = wait_snapshot(&inbox, |s| s.list.summaries().len() == 3).await;
    assert_ids!(snapshot, ["c4", "c2", "c1"]);
    assert_eq!(snapshot.unread, 4);
    let c4 = &snapshot.list.summaries()[0];
    assert_eq!(c4.counterpart_name.as_deref(), Some("Fjord Kayaks"));
    assert_eq!(c4.listing_title.as_deref(), Some("Rooftop loft"));
}

#[tokio::test]
async fn test_changes_during_refetch_are_reapplied() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let channel = gateway.channel("conversations");

    gateway.delay_next_list(Duration::from_millis(300)).await;
    gateway
        .insert("conversations", conversation("c4", "t1", "p1", "l2", Some("2024-05-01T00:00:00.000+00:00"), 3, 0))
        .await;

    // Emitted without touching storage, so the held fetch still returns the
    // old c1 and c2; only a replay can make the fresh rows reflect them
    gateway.emit(
        &channel,
        RealtimeEvent::for_document(
            &channel,
            ChangeKind::Update,
            json!({
                "$id": "c1",
                "$updatedAt": "2030-01-01T00:00:00.000+00:00",
                "tourist_id": "t1",
                "provider_id": "p1",
                "tourist_unread": 9,
            }),
        ),
    );
    gateway.emit(
        &channel,
        RealtimeEvent::for_document(&channel, ChangeKind::Delete, json!({"$id": "c2", "tourist_id": "t1"})),
    );

    let snapshot = wait_snapshot(&inbox, |s| s.list.summaries().iter().any(|row| row.id() == "c4")).await;
    assert_ids!(snapshot, ["c4", "c1"]);
    assert_eq!(snapshot.list.summaries()[1].conversation.tourist_unread, 9);
    assert_eq!(snapshot.unread, 12);
    assert_eq!(gateway.list_calls(), 2);
}

#[tokio::test]
async fn test_create_for_someone_else_is_ignored() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let calls = gateway.list_calls();

    gateway
        .insert("conversations", conversation("c5", "t2", "p2", "l2", None, 1, 0))
        .await;
    assert_ok!(gateway.update("conversations", "c1", json!({"tourist_unread": 7})).await);

    let snapshot = wait_snapshot(&inbox, |s| s.unread == 7).await;
    assert_ids!(snapshot, ["c2", "c1"]);
    assert_eq!(gateway.list_calls(), calls);
}

#[tokio::test]
async fn test_fetch_error_then_retry() {
    let gateway = seeded_gateway().await;
    gateway.fail_next_list(GatewayError::transport("connection reset")).await;

    let inbox = InboxStore::spawn(shared(&gateway), &InboxConfig::default());
    assert_ok!(inbox.sign_in(Viewer::tourist("t1")).await);

    let failed = wait_snapshot(&inbox, |s| s.list.error().is_some()).await;
    assert_contains!(failed.list.error().unwrap_or_default(), "connection reset");
    assert_eq!(failed.unread, 0);
    assert_eq!(failed.live, LiveStatus::Offline);

    assert_ok!(inbox.retry().await);
    let ready = wait_snapshot(&inbox, |s| s.list.is_ready()).await;
    assert_ids!(ready, ["c2", "c1"]);
    assert_eq!(ready.unread, 1);
    assert_eq!(gateway.list_calls(), 2);
}

#[tokio::test]
async fn test_sign_out_zeroes_badge_and_ignores_old_subscription() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let calls = gateway.list_calls();

    assert_ok!(inbox.sign_out().await);
    let snapshot = wait_snapshot(&inbox, |s| s.viewer.is_none()).await;
    assert_eq!(snapshot.unread, 0);
    assert_eq!(snapshot.list, ListState::Idle);
    assert_eq!(snapshot.live, LiveStatus::Offline);

    assert_ok!(gateway.update("conversations", "c1", json!({"tourist_unread": 9})).await);
    gateway
        .insert("conversations", conversation("c6", "t1", "p2", "l1", None, 1, 0))
        .await;
    settle().await;

    let after = inbox.snapshot();
    assert_eq!(after.unread, 0);
    assert_eq!(after.list, ListState::Idle);
    assert_eq!(gateway.list_calls(), calls);
}

#[tokio::test]
async fn test_switching_viewer_drops_previous_rows() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    assert_ok!(inbox.sign_in(Viewer::tourist("t2")).await);
    let snapshot = wait_snapshot(&inbox, |s| {
        s.viewer == Some(Viewer::tourist("t2")) && s.live == LiveStatus::Live
    })
    .await;
    assert_ids!(snapshot, ["c3"]);
    assert_eq!(snapshot.unread, 4);
    eventually(|| gateway.subscriber_count() == 1).await;
}

#[tokio::test]
async fn test_same_viewer_sign_in_is_noop() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let calls = gateway.list_calls();

    assert_ok!(inbox.sign_in(Viewer::tourist("t1")).await);
    settle().await;
    assert_eq!(gateway.list_calls(), calls);
    assert_eq!(gateway.subscribe_calls(), 1);
}

#[tokio::test]
async fn test_malformed_counter_in_update_leaves_row_counter() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;

    assert_ok!(
        gateway
            .update("conversations", "c1", json!({"tourist_unread": "lots", "last_message": "hello?"}))
            .await
    );

    let snapshot = wait_snapshot(&inbox, |s| {
        s.list
            .summaries()
            .iter()
            .any(|r| r.conversation.last_message.as_deref() == Some("hello?"))
    })
    .await;
    assert_eq!(snapshot.unread, 1);
}

#[tokio::test]
async fn test_badge_always_matches_list() {
    let gateway = seeded_gateway().await;
    let inbox = live_inbox(&gateway, Viewer::tourist("t1")).await;
    let mut snapshots = inbox.watch();

    let checker = tokio::spawn(async move {
        let mut seen = 0usize;
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            let sum: u32 = snapshot
                .list
                .summaries()
                .iter()
                .map(|s| s.conversation.tourist_unread)
                .sum();
            assert_eq!(snapshot.unread, sum);
            seen += 1;
            if snapshot.viewer.is_none() {
                break;
            }
        }
        seen
    });

    for n in 1..=5u32 {
        assert_ok!(gateway.update("conversations", "c2", json!({"tourist_unread": n})).await);
    }
    gateway
        .insert("conversations", conversation("c7", "t1", "p1", "l1", None, 2, 0))
        .await;
    assert_ok!(gateway.delete("conversations", "c1").await);
    wait_snapshot(&inbox, |s| {
        s.list.summaries().len() == 2 && s.list.summaries().iter().all(|r| r.id() != "c1")
    })
    .await;
    assert_ok!(inbox.sign_out().await);

    let seen = assert_ok!(tokio::time::timeout(WAIT, checker).await).expect("checker panicked");
    assert!(seen > 0);
}

#[tokio::test]
async fn test_subscribe_failure_keeps_list_without_live_updates() {
    let gateway = seeded_gateway().await;
    gateway
        .fail_next_subscribe(GatewayError::subscription("realtime unavailable"))
        .await;

    let inbox = InboxStore::spawn(shared(&gateway), &InboxConfig::default());
    assert_ok!(inbox.sign_in(Viewer::tourist("t1")).await);
    let snapshot = wait_snapshot(&inbox, |s| matches!(s.live, LiveStatus::Failed(_))).await;
    assert_ids!(snapshot, ["c2", "c1"]);

    assert_ok!(gateway.update("conversations", "c1", json!({"tourist_unread": 0})).await);
    settle().await;
    assert_eq!(inbox.snapshot().unread, 1);
}

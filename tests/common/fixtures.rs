//! Test fixtures
//!
//! A small marketplace seeded into a [`MemoryGateway`]:
//!
//! | id   | tourist | provider | listing | last message | tourist_unread | provider_unread |
//! |------|---------|----------|---------|--------------|----------------|-----------------|
//! | `c1` | `t1`    | `p1`     | `l1`    | 2024-03-01   | 1              | 0               |
//! | `c2` | `t1`    | `p2`     | `l2`    | 2024-03-05   | 0              | 2               |
//! | `c3` | `t2`    | `p1`     | `l1`    | 2024-02-20   | 4              | 3               |

use std::sync::Arc;
use std::time::Duration;

use roamly_inbox::gateway::{MemoryGateway, RemoteGateway};
use roamly_inbox::inbox::{InboxHandle, InboxSnapshot};
use serde_json::json;

/// Upper bound for any wait in the tests
pub const WAIT: Duration = Duration::from_secs(5);

/// Gateway with profiles, listings and three conversations
pub async fn seeded_gateway() -> MemoryGateway {
    let gateway = MemoryGateway::new("main");

    gateway
        .insert("users", json!({"$id": "t1", "full_name": "Ana Pereira", "avatar_url": "https://img/t1.png"}))
        .await;
    gateway
        .insert("users", json!({"$id": "t2", "full_name": "Jonas Berg"}))
        .await;
    gateway
        .insert("providers", json!({"$id": "p1", "business_name": "Fjord Kayaks"}))
        .await;
    gateway
        .insert("providers", json!({"$id": "p2", "business_name": "Alfama Stays"}))
        .await;
    gateway
        .insert("listings", json!({"$id": "l1", "title": "Sunset paddle"}))
        .await;
    gateway
        .insert("listings", json!({"$id": "l2", "title": "Rooftop loft"}))
        .await;

    gateway
        .insert("conversations", conversation("c1", "t1", "p1", "l1", Some("2024-03-01T10:00:00.000+00:00"), 1, 0))
        .await;
    gateway
        .insert("conversations", conversation("c2", "t1", "p2", "l2", Some("2024-03-05T09:30:00.000+00:00"), 0, 2))
        .await;
    gateway
        .insert("conversations", conversation("c3", "t2", "p1", "l1", Some("2024-02-20T18:15:00.000+00:00"), 4, 3))
        .await;

    gateway
}

/// Conversation document body
pub fn conversation(
    id: &str,
    tourist_id: &str,
    provider_id: &str,
    listing_id: &str,
    last_message_at: Option<&str>,
    tourist_unread: u32,
    provider_unread: u32,
) -> serde_json::Value {
    json!({
        "$id": id,
        "tourist_id": tourist_id,
        "provider_id": provider_id,
        "listing_id": listing_id,
        "last_message": last_message_at.map(|_| format!("message in {}", id)),
        "last_message_at": last_message_at,
        "tourist_unread": tourist_unread,
        "provider_unread": provider_unread,
    })
}

/// Share a memory gateway behind the trait object the inbox takes
pub fn shared(gateway: &MemoryGateway) -> Arc<dyn RemoteGateway> {
    Arc::new(gateway.clone())
}

/// Wait for a snapshot matching `predicate`, failing the test after [`WAIT`]
pub async fn wait_snapshot(
    inbox: &InboxHandle,
    predicate: impl FnMut(&InboxSnapshot) -> bool,
) -> InboxSnapshot {
    tokio::time::timeout(WAIT, inbox.wait_for(predicate))
        .await
        .expect("timed out waiting for inbox snapshot")
        .expect("inbox store closed")
}

/// Wait until `condition` holds, polling every few milliseconds
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(WAIT, async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

/// Let queued events drain through the store
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

/**
 * Roamly Inbox Watcher Entry Point
 *
 * Watches one viewer's inbox against the configured backend and logs every
 * snapshot until Ctrl-C.
 *
 * Environment:
 * - `ROAMLY_VIEWER_ID`   - viewer id (required)
 * - `ROAMLY_VIEWER_ROLE` - `tourist` or `provider` (default `tourist`)
 * - `ROAMLY_*`           - backend configuration, see `InboxConfig::load`
 */

use std::sync::Arc;

use roamly_inbox::gateway::HttpGateway;
use roamly_inbox::inbox::{InboxSnapshot, InboxStore, ListState};
use roamly_inbox::shared::{InboxConfig, Role, Viewer};

/// Rows shown per snapshot
const PREVIEW_ROWS: usize = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenv::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&env_filter))
        .init();

    let config = InboxConfig::load()?;
    let viewer_id = std::env::var("ROAMLY_VIEWER_ID")
        .map_err(|_| "ROAMLY_VIEWER_ID must be set to the viewer's id")?;
    let role: Role = std::env::var("ROAMLY_VIEWER_ROLE")
        .unwrap_or_else(|_| "tourist".to_string())
        .parse()?;
    let viewer = Viewer::new(viewer_id, role);

    tracing::info!("[STARTUP] Watching inbox of {} {} at {}", viewer.role, viewer.id, config.endpoint);

    let gateway = Arc::new(HttpGateway::new(config.clone()));
    let inbox = InboxStore::spawn(gateway, &config);
    inbox.sign_in(viewer).await?;

    let mut snapshots = inbox.watch();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    tracing::warn!("[Inbox] Store stopped");
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                log_snapshot(&snapshot);
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("[STARTUP] Ctrl-C received, shutting down");
                inbox.shutdown().await.ok();
                break;
            }
        }
    }

    Ok(())
}

fn log_snapshot(snapshot: &InboxSnapshot) {
    match &snapshot.list {
        ListState::Idle => tracing::info!("[Inbox] Idle"),
        ListState::Loading => tracing::info!("[Inbox] Loading..."),
        ListState::Error(reason) => tracing::warn!("[Inbox] Error: {}", reason),
        ListState::Ready(summaries) => {
            tracing::info!(
                "[Inbox] {} conversations, {} unread ({:?})",
                summaries.len(),
                snapshot.unread,
                snapshot.live
            );
            for summary in summaries.iter().take(PREVIEW_ROWS) {
                tracing::info!(
                    "  {} | {} | {} | {}",
                    summary.counterpart_name.as_deref().unwrap_or("(unknown)"),
                    summary.listing_title.as_deref().unwrap_or("-"),
                    summary.conversation.last_message.as_deref().unwrap_or(""),
                    summary.conversation.last_message_at.as_deref().unwrap_or("")
                );
            }
        }
    }
}

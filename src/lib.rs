//! Roamly Inbox - Main Library
//!
//! Realtime conversation inbox and unread badge for the Roamly travel
//! marketplace, where tourists talk to providers about a listing.
//!
//! # Overview
//!
//! This library provides:
//! - An ordered, enriched conversation list for one viewer
//! - A single unread count for the navigation badge
//! - Realtime reconciliation of create, update and delete events
//! - Idempotent conversation opening and message bookkeeping
//!
//! # Module Structure
//!
//! - **`shared`** - Types used everywhere
//!   - Conversations, summaries, roles and viewers
//!   - Realtime event envelopes
//!   - Error types, configuration, timestamp parsing
//!
//! - **`gateway`** - Seam to the hosted document backend
//!   - `RemoteGateway` trait
//!   - `MemoryGateway` (in-process, failure injection)
//!   - `HttpGateway` (REST + Server-Sent Events)
//!
//! - **`inbox`** - State machines built on the gateway
//!   - Conversation fetcher, list state, unread aggregation
//!   - `InboxStore` reconciliation loop
//!   - `UnreadBadge` standalone badge
//!   - `ThreadService` writes
//!
//! # Usage
//!
//! ```rust,no_run
//! use roamly_inbox::gateway::HttpGateway;
//! use roamly_inbox::inbox::InboxStore;
//! use roamly_inbox::shared::{InboxConfig, Viewer};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = InboxConfig::load()?;
//! let inbox = InboxStore::spawn(Arc::new(HttpGateway::new(config.clone())), &config);
//!
//! inbox.sign_in(Viewer::provider("prov_42")).await?;
//! let mut snapshots = inbox.watch();
//! while snapshots.changed().await.is_ok() {
//!     let snapshot = snapshots.borrow().clone();
//!     println!("{} conversations, {} unread", snapshot.list.summaries().len(), snapshot.unread);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! - The store and the badge each own their state inside one tokio task
//! - Handles are cheap to clone and only send commands or read snapshots
//! - Gateways are shared as `Arc<dyn RemoteGateway>`
//!
//! # Error Handling
//!
//! - `GatewayError` for backend failures
//! - `InboxError` for store, validation and decoding failures
//! - `ConfigError` for configuration loading
//!
//! Fetch failures inside the store surface as `ListState::Error`, never as
//! a panic or a returned error.

/// Shared types and data structures
pub mod shared;

/// Remote document backend seam and adapters
pub mod gateway;

/// Inbox state machines
pub mod inbox;

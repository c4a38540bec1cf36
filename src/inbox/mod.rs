//! Inbox Module
//!
//! Keeps one viewer's conversation list and unread badge consistent with the
//! document backend.
//!
//! # Module Structure
//!
//! ```text
//! inbox/
//! ├── fetcher.rs  - Role-aware query plus display joins
//! ├── list.rs     - List state machine and event reconciliation
//! ├── unread.rs   - Unread sums and requery aggregator
//! ├── store.rs    - Unified reconciliation loop (list + badge)
//! ├── badge.rs    - Standalone badge task
//! └── threads.rs  - Open, record message, mark read
//! ```
//!
//! # Data Flow
//!
//! ```text
//! sign_in ──▶ fetch ──▶ Ready ──▶ subscribe
//!                          ▲           │
//!                          │   create  │ update / delete
//!                          └─ refetch ◀┴──▶ patch in place
//! ```

pub mod badge;
pub mod fetcher;
pub mod list;
pub mod store;
pub mod threads;
pub mod unread;

pub use badge::{BadgeHandle, UnreadBadge};
pub use fetcher::ConversationFetcher;
pub use list::{ConversationList, ListEffect, ListState};
pub use store::{InboxHandle, InboxSnapshot, InboxStore, LiveStatus};
pub use threads::ThreadService;
pub use unread::{unread_total, UnreadAggregator};

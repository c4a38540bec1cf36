//! Messaging Module
//!
//! Data structures for the inbox:
//!
//! - `Role` / `Viewer` - Which side of a thread a party is on
//! - `Conversation` - A conversation document
//! - `ConversationPatch` - Fields carried by an update event
//! - `ConversationSummary` - A conversation joined with display fields
//!
//! # Usage
//!
//! ```rust
//! use roamly_inbox::shared::messaging::{Conversation, Role};
//!
//! let conversation = Conversation::new("c1", "t1", "p1", "l1");
//! assert_eq!(conversation.counterpart_id(Role::Tourist), "p1");
//! assert_eq!(conversation.unread_for(Role::Provider), 0);
//! ```

pub mod conversation;
pub mod summary;

pub use conversation::{count_value, Conversation, ConversationPatch, Role, Viewer};
pub use summary::{sort_by_recent, ConversationSummary};

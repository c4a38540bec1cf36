//! Shared Module
//!
//! This module contains the types shared by the gateway adapters and the
//! inbox state machines: documents, change events, errors and configuration.
//!
//! # Overview
//!
//! Nothing in here performs I/O except configuration loading. All document
//! types serialize to the attribute names the backend stores.

/// Conversation and summary data structures
pub mod messaging;

/// Realtime change events
pub mod event;

/// Shared error types
pub mod error;

/// Timestamp parsing
pub mod time;

/// Inbox configuration
pub mod config;

/// Re-export commonly used types for convenience
pub use config::{CollectionIds, ConfigError, InboxConfig, InboxConfigBuilder};
pub use error::{GatewayError, InboxError};
pub use event::{ChangeEvent, ChangeKind, RealtimeEvent};
pub use messaging::{Conversation, ConversationPatch, ConversationSummary, Role, Viewer};

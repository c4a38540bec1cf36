//! Remote Data Gateway
//!
//! This module defines the seam between the inbox and the hosted document
//! backend. The inbox never talks to a backend directly; it goes through a
//! [`RemoteGateway`], which provides document queries, document writes and a
//! realtime subscription per channel.
//!
//! # Adapters
//!
//! - **`memory`** - In-process collections with a broadcast change feed
//! - **`http`** - REST documents plus a Server-Sent Events realtime stream
//!
//! # Module Structure
//!
//! ```text
//! gateway/
//! ├── mod.rs     - Trait, query types, subscription handle
//! ├── memory.rs  - In-process gateway
//! ├── http.rs    - reqwest-based gateway
//! └── sse.rs     - Line-buffered SSE decoder
//! ```

pub mod http;
pub mod memory;
pub mod sse;

pub use http::HttpGateway;
pub use memory::MemoryGateway;

use async_trait::async_trait;
use std::cmp::Ordering as CmpOrdering;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::shared::error::GatewayError;
use crate::shared::event::RealtimeEvent;
use crate::shared::time::parse_timestamp;

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Document backend consumed by the inbox
///
/// Documents are raw JSON snapshots carrying `$id`, `$createdAt` and
/// `$updatedAt` metadata next to their attributes.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// List documents of a collection matching `query`
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<serde_json::Value>>;

    /// Fetch one document; `Ok(None)` when it does not exist
    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>>;

    /// Create a document with the given id and attributes
    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Update attributes of an existing document
    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Subscribe to change events on a channel
    async fn subscribe(&self, channel: &str) -> Result<Subscription>;
}

/// Attribute filter
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Attribute equals value
    Equal {
        attribute: String,
        value: serde_json::Value,
    },
}

impl Filter {
    /// Attribute equals value
    pub fn equal(attribute: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::Equal {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    /// Whether a document satisfies the filter
    pub fn matches(&self, document: &serde_json::Value) -> bool {
        match self {
            Filter::Equal { attribute, value } => document.get(attribute) == Some(value),
        }
    }
}

/// Sort order on one attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ordering {
    Asc(String),
    Desc(String),
}

/// Filter, order and limit for a document listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    pub filters: Vec<Filter>,
    pub order: Option<Ordering>,
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Create an empty query
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an equality filter
    pub fn filter_eq(mut self, attribute: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.filters.push(Filter::equal(attribute, value));
        self
    }

    /// Order ascending by attribute
    pub fn order_asc(mut self, attribute: impl Into<String>) -> Self {
        self.order = Some(Ordering::Asc(attribute.into()));
        self
    }

    /// Order descending by attribute
    pub fn order_desc(mut self, attribute: impl Into<String>) -> Self {
        self.order = Some(Ordering::Desc(attribute.into()));
        self
    }

    /// Cap the number of results
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a document satisfies every filter
    pub fn matches(&self, document: &serde_json::Value) -> bool {
        self.filters.iter().all(|filter| filter.matches(document))
    }

    /// Apply filters, order and limit to a set of documents
    pub fn apply(&self, documents: impl IntoIterator<Item = serde_json::Value>) -> Vec<serde_json::Value> {
        let mut selected: Vec<_> = documents
            .into_iter()
            .filter(|document| self.matches(document))
            .collect();

        match &self.order {
            Some(Ordering::Asc(attribute)) => {
                selected.sort_by(|a, b| compare_attribute(a.get(attribute), b.get(attribute)));
            }
            Some(Ordering::Desc(attribute)) => {
                selected.sort_by(|a, b| compare_attribute(b.get(attribute), a.get(attribute)));
            }
            None => {}
        }

        if let Some(limit) = self.limit {
            selected.truncate(limit);
        }
        selected
    }
}

/// Order attribute values: missing/null first, then numbers, then strings
///
/// Strings that both parse as timestamps compare chronologically, strings
/// that do not parse compare lexically and sit below all parsed ones.
fn compare_attribute(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> CmpOrdering {
    use serde_json::Value;

    fn rank(value: Option<&Value>) -> u8 {
        match value {
            None | Some(Value::Null) => 0,
            Some(Value::Bool(_)) => 1,
            Some(Value::Number(_)) => 2,
            Some(Value::String(_)) => 3,
            Some(_) => 4,
        }
    }

    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(CmpOrdering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            // Unparseable strings rank below every timestamp
            match (parse_timestamp(x), parse_timestamp(y)) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => CmpOrdering::Greater,
                (None, Some(_)) => CmpOrdering::Less,
                (None, None) => x.cmp(y),
            }
        }
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Live realtime subscription
///
/// Events arrive in the order the gateway delivered them. Dropping the
/// subscription stops the task feeding it, so no further events are
/// produced for this handle.
#[derive(Debug)]
pub struct Subscription {
    channel: String,
    events: mpsc::Receiver<RealtimeEvent>,
    pump: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wrap a receiver fed by `pump`
    pub fn new(
        channel: impl Into<String>,
        events: mpsc::Receiver<RealtimeEvent>,
        pump: Option<JoinHandle<()>>,
    ) -> Self {
        Self {
            channel: channel.into(),
            events,
            pump,
        }
    }

    /// Channel this subscription listens on
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Wait for the next event; `None` once the feed has ended
    pub async fn next(&mut self) -> Option<RealtimeEvent> {
        self.events.recv().await
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

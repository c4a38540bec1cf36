//! # In-Memory Gateway
//!
//! Keeps collections in process and publishes every write on a broadcast
//! change feed, the same way a hosted backend would push realtime events.
//!
//! ## Features
//!
//! - **Collections**: insertion-ordered documents per collection
//! - **Change Feed**: `tokio::sync::broadcast` fan-out to every subscription
//! - **Failure Injection**: queue errors or delays for the next list/subscribe calls
//! - **Call Counters**: observe how often the inbox queries the backend
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roamly_inbox::gateway::{MemoryGateway, RemoteGateway};
//! use serde_json::json;
//!
//! # async fn example() {
//! let gateway = MemoryGateway::new("main");
//! gateway
//!     .insert("conversations", json!({"$id": "c1", "tourist_id": "t1", "provider_id": "p1"}))
//!     .await;
//! # }
//! ```

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use uuid::Uuid;

use super::{DocumentQuery, RemoteGateway, Result, Subscription};
use crate::shared::error::GatewayError;
use crate::shared::event::{collection_channel, document_id, ChangeKind, RealtimeEvent};
use crate::shared::time::now_rfc3339;

/// Capacity of the change feed
const FEED_CAPACITY: usize = 1024;
/// Capacity of each subscription's buffer
const SUBSCRIPTION_BUFFER: usize = 256;

/// Change published on the feed: channel name plus envelope
type FeedItem = (String, RealtimeEvent);

/// In-process document gateway
#[derive(Debug, Clone)]
pub struct MemoryGateway {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    database: String,
    collections: RwLock<HashMap<String, Vec<serde_json::Value>>>,
    feed: broadcast::Sender<FeedItem>,
    list_failures: Mutex<VecDeque<GatewayError>>,
    list_delays: Mutex<VecDeque<Duration>>,
    subscribe_failures: Mutex<VecDeque<GatewayError>>,
    list_calls: AtomicUsize,
    subscribe_calls: AtomicUsize,
}

impl MemoryGateway {
    /// Create an empty gateway for `database`
    pub fn new(database: impl Into<String>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                database: database.into(),
                collections: RwLock::new(HashMap::new()),
                feed,
                list_failures: Mutex::new(VecDeque::new()),
                list_delays: Mutex::new(VecDeque::new()),
                subscribe_failures: Mutex::new(VecDeque::new()),
                list_calls: AtomicUsize::new(0),
                subscribe_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Channel carrying changes of `collection`
    pub fn channel(&self, collection: &str) -> String {
        collection_channel(&self.inner.database, collection)
    }

    /// Insert a document and publish a create event
    ///
    /// A missing `$id` is generated; `$createdAt`/`$updatedAt` are stamped
    /// when absent. Returns the stored snapshot.
    pub async fn insert(&self, collection: &str, document: serde_json::Value) -> serde_json::Value {
        let mut document = match document {
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            other => serde_json::json!({ "value": other }),
        };
        let now = now_rfc3339();
        if let Some(map) = document.as_object_mut() {
            map.entry("$id")
                .or_insert_with(|| serde_json::Value::String(Uuid::new_v4().simple().to_string()));
            map.entry("$createdAt")
                .or_insert_with(|| serde_json::Value::String(now.clone()));
            map.entry("$updatedAt")
                .or_insert_with(|| serde_json::Value::String(now));
        }

        {
            let mut collections = self.inner.collections.write().await;
            collections
                .entry(collection.to_string())
                .or_default()
                .push(document.clone());
        }
        self.publish(collection, ChangeKind::Create, document.clone());
        document
    }

    /// Merge attributes into a document and publish an update event
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value> {
        let updated = {
            let mut collections = self.inner.collections.write().await;
            let document = collections
                .get_mut(collection)
                .and_then(|docs| docs.iter_mut().find(|doc| document_id(doc) == Some(id)))
                .ok_or_else(|| GatewayError::not_found(format!("{}/{}", collection, id)))?;

            if let (Some(target), Some(patch)) = (document.as_object_mut(), data.as_object()) {
                for (key, value) in patch {
                    if !key.starts_with('$') {
                        target.insert(key.clone(), value.clone());
                    }
                }
                target.insert(
                    "$updatedAt".to_string(),
                    serde_json::Value::String(now_rfc3339()),
                );
            }
            document.clone()
        };
        self.publish(collection, ChangeKind::Update, updated.clone());
        Ok(updated)
    }

    /// Remove a document and publish a delete event
    pub async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        let removed = {
            let mut collections = self.inner.collections.write().await;
            let docs = collections
                .get_mut(collection)
                .ok_or_else(|| GatewayError::not_found(collection.to_string()))?;
            let position = docs
                .iter()
                .position(|doc| document_id(doc) == Some(id))
                .ok_or_else(|| GatewayError::not_found(format!("{}/{}", collection, id)))?;
            docs.remove(position)
        };
        self.publish(collection, ChangeKind::Delete, removed);
        Ok(())
    }

    /// Publish an arbitrary envelope on a channel
    pub fn emit(&self, channel: &str, event: RealtimeEvent) -> usize {
        self.inner
            .feed
            .send((channel.to_string(), event))
            .unwrap_or(0)
    }

    /// Make the next list call fail with `error`
    pub async fn fail_next_list(&self, error: GatewayError) {
        self.inner.list_failures.lock().await.push_back(error);
    }

    /// Delay the next list call by `delay`
    pub async fn delay_next_list(&self, delay: Duration) {
        self.inner.list_delays.lock().await.push_back(delay);
    }

    /// Make the next subscribe call fail with `error`
    pub async fn fail_next_subscribe(&self, error: GatewayError) {
        self.inner.subscribe_failures.lock().await.push_back(error);
    }

    /// Number of list calls served so far
    pub fn list_calls(&self) -> usize {
        self.inner.list_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of subscribe calls received so far
    pub fn subscribe_calls(&self) -> usize {
        self.inner.subscribe_calls.load(AtomicOrdering::SeqCst)
    }

    /// Number of live subscriptions on the feed
    pub fn subscriber_count(&self) -> usize {
        self.inner.feed.receiver_count()
    }

    fn publish(&self, collection: &str, kind: ChangeKind, document: serde_json::Value) {
        let channel = self.channel(collection);
        let event = RealtimeEvent::for_document(&channel, kind, document);
        let delivered = self.emit(&channel, event);
        tracing::debug!(
            "[Gateway] {} on {} delivered to {} subscribers",
            kind.suffix(),
            channel,
            delivered
        );
    }
}

#[async_trait]
impl RemoteGateway for MemoryGateway {
    async fn list_documents(
        &self,
        collection: &str,
        query: &DocumentQuery,
    ) -> Result<Vec<serde_json::Value>> {
        self.inner.list_calls.fetch_add(1, AtomicOrdering::SeqCst);

        let delay = self.inner.list_delays.lock().await.pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = self.inner.list_failures.lock().await.pop_front() {
            return Err(error);
        }

        let collections = self.inner.collections.read().await;
        let documents = collections.get(collection).cloned().unwrap_or_default();
        Ok(query.apply(documents))
    }

    async fn get_document(&self, collection: &str, id: &str) -> Result<Option<serde_json::Value>> {
        let collections = self.inner.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|docs| docs.iter().find(|doc| document_id(doc) == Some(id)))
            .cloned())
    }

    async fn create_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value> {
        if self.get_document(collection, id).await?.is_some() {
            return Err(GatewayError::status(409, format!("document {} already exists", id)));
        }
        let mut document = data;
        match document.as_object_mut() {
            Some(map) => {
                map.insert("$id".to_string(), serde_json::Value::String(id.to_string()));
            }
            None => return Err(GatewayError::serialization("document data must be an object")),
        }
        Ok(self.insert(collection, document).await)
    }

    async fn update_document(
        &self,
        collection: &str,
        id: &str,
        data: serde_json::Value,
    ) -> Result<serde_json::Value> {
        self.update(collection, id, data).await
    }

    async fn subscribe(&self, channel: &str) -> Result<Subscription> {
        self.inner.subscribe_calls.fetch_add(1, AtomicOrdering::SeqCst);
        if let Some(error) = self.inner.subscribe_failures.lock().await.pop_front() {
            return Err(error);
        }

        let mut feed = self.inner.feed.subscribe();
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let wanted = channel.to_string();

        let pump = tokio::spawn(async move {
            loop {
                match feed.recv().await {
                    Ok((channel, event)) => {
                        if channel != wanted {
                            continue;
                        }
                        if tx.send(event).await.is_err() {
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("[Gateway] Subscriber lagged, skipped {} events", skipped);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(Subscription::new(channel, rx, Some(pump)))
    }
}

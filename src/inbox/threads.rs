//! Thread Service
//!
//! Write-side operations on conversation documents:
//!
//! - **open** - find or create the conversation for a (tourist, provider, listing) triple
//! - **record_message** - store a preview of a sent message and bump the counterpart's unread counter
//! - **mark_read** - clear one role's unread counter
//!
//! Each write goes through the gateway, so an inbox subscribed to the
//! conversations channel sees it as a realtime change.

use std::sync::Arc;
use uuid::Uuid;

use crate::gateway::{DocumentQuery, RemoteGateway};
use crate::shared::config::InboxConfig;
use crate::shared::error::{GatewayError, InboxError};
use crate::shared::messaging::{Conversation, Role};
use crate::shared::time::now_rfc3339;

/// Marker appended to a truncated preview
const ELLIPSIS: char = '…';

/// Reads allowed before a message write stops waiting for a quiet document
const RECORD_ATTEMPTS: usize = 3;

/// Conversation write operations
#[derive(Clone)]
pub struct ThreadService {
    gateway: Arc<dyn RemoteGateway>,
    collection: String,
    preview_len: usize,
}

impl std::fmt::Debug for ThreadService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadService")
            .field("collection", &self.collection)
            .field("preview_len", &self.preview_len)
            .finish()
    }
}

impl ThreadService {
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: &InboxConfig) -> Self {
        Self {
            gateway,
            collection: config.collections.conversations.clone(),
            preview_len: config.preview_len,
        }
    }

    /// Return the conversation for the triple, creating it if needed
    ///
    /// A new conversation starts with both counters at zero and no last
    /// message.
    pub async fn open(
        &self,
        tourist_id: &str,
        provider_id: &str,
        listing_id: &str,
    ) -> Result<Conversation, InboxError> {
        for (field, value) in [
            ("tourist_id", tourist_id),
            ("provider_id", provider_id),
            ("listing_id", listing_id),
        ] {
            if value.trim().is_empty() {
                return Err(InboxError::validation(field, "must not be empty"));
            }
        }

        let query = DocumentQuery::new()
            .filter_eq("tourist_id", tourist_id)
            .filter_eq("provider_id", provider_id)
            .filter_eq("listing_id", listing_id)
            .limit(1);
        let existing = self.gateway.list_documents(&self.collection, &query).await?;
        if let Some(document) = existing.first() {
            let conversation = Conversation::from_document(document)?;
            tracing::debug!("[Inbox] Reusing conversation {}", conversation.id);
            return Ok(conversation);
        }

        let id = Uuid::new_v4().simple().to_string();
        let conversation = Conversation::new(&id, tourist_id, provider_id, listing_id);
        let stored = self
            .gateway
            .create_document(&self.collection, &id, conversation.to_data())
            .await?;
        tracing::info!(
            "[Inbox] Opened conversation {} ({} / {} / {})",
            id,
            tourist_id,
            provider_id,
            listing_id
        );
        Conversation::from_document(&stored)
    }

    /// Record a message sent by `sender` in a conversation
    ///
    /// The counterpart's counter is read, incremented and written back. The
    /// document is read again right before the write; if `$updatedAt` or the
    /// counter moved in between, the increment is recomputed from the newer
    /// copy, up to a few times. The backend has no conditional update, so a
    /// write landing after that last read can still overwrite a concurrent
    /// sender's increment.
    pub async fn record_message(
        &self,
        conversation_id: &str,
        sender: Role,
        text: &str,
    ) -> Result<Conversation, InboxError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InboxError::validation("text", "message must not be empty"));
        }

        let recipient = sender.counterpart();
        let mut conversation = self.load(conversation_id).await?;
        for attempt in 1..=RECORD_ATTEMPTS {
            let current = self.load(conversation_id).await?;
            let quiet = current.updated_at == conversation.updated_at
                && current.unread_for(recipient) == conversation.unread_for(recipient);
            conversation = current;
            if quiet {
                break;
            }
            if attempt == RECORD_ATTEMPTS {
                tracing::warn!(
                    "[Inbox] Conversation {} kept changing, writing from the latest copy",
                    conversation_id
                );
            }
        }
        let unread = conversation.unread_for(recipient).saturating_add(1);

        let mut data = serde_json::Map::new();
        data.insert("last_message".into(), preview(text, self.preview_len).into());
        data.insert("last_message_at".into(), now_rfc3339().into());
        data.insert(recipient.unread_field().into(), unread.into());

        let stored = self
            .gateway
            .update_document(&self.collection, conversation_id, data.into())
            .await?;
        tracing::debug!(
            "[Inbox] Message from {} in {}, {} unread for {}",
            sender,
            conversation_id,
            unread,
            recipient
        );
        Conversation::from_document(&stored)
    }

    /// Clear `role`'s unread counter; no write when it is already zero
    pub async fn mark_read(&self, conversation_id: &str, role: Role) -> Result<Conversation, InboxError> {
        let conversation = self.load(conversation_id).await?;
        if conversation.unread_for(role) == 0 {
            return Ok(conversation);
        }

        let mut data = serde_json::Map::new();
        data.insert(role.unread_field().into(), 0.into());
        let stored = self
            .gateway
            .update_document(&self.collection, conversation_id, data.into())
            .await?;
        tracing::debug!("[Inbox] {} read {}", role, conversation_id);
        Conversation::from_document(&stored)
    }

    async fn load(&self, conversation_id: &str) -> Result<Conversation, InboxError> {
        let document = self
            .gateway
            .get_document(&self.collection, conversation_id)
            .await?
            .ok_or_else(|| {
                GatewayError::not_found(format!("{}/{}", self.collection, conversation_id))
            })?;
        Conversation::from_document(&document)
    }
}

/// Shorten `text` to at most `max` characters, ending in an ellipsis when cut
pub fn preview(text: &str, max: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max.saturating_sub(1)).collect();
    cut.truncate(cut.trim_end().len());
    cut.push(ELLIPSIS);
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MemoryGateway;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn service(gateway: &MemoryGateway) -> ThreadService {
        ThreadService::new(Arc::new(gateway.clone()), &InboxConfig::default())
    }

    #[test]
    fn test_preview_short_text_is_kept() {
        assert_eq!(preview("  hello  ", 10), "hello");
        assert_eq!(preview("exactly10!", 10), "exactly10!");
    }

    #[test]
    fn test_preview_truncates_on_char_boundaries() {
        let cut = preview("Olá, a cabana está livre?", 8);
        assert_eq!(cut, "Olá, a…");
        assert!(cut.chars().count() <= 8);

        let cut = preview("Ótimo, obrigado!", 6);
        assert_eq!(cut, "Ótimo…");
    }

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let gateway = MemoryGateway::new("main");
        let threads = service(&gateway);

        let first = threads.open("t1", "p1", "l1").await.unwrap();
        let again = threads.open("t1", "p1", "l1").await.unwrap();
        let other = threads.open("t1", "p1", "l2").await.unwrap();

        assert_eq!(first.id, again.id);
        assert_ne!(first.id, other.id);
        assert_eq!(first.tourist_unread, 0);
        assert_eq!(first.last_message, None);
    }

    #[tokio::test]
    async fn test_record_message_rejects_blank_text() {
        let gateway = MemoryGateway::new("main");
        let result = service(&gateway).record_message("c1", Role::Tourist, "   ").await;
        assert_matches!(result, Err(InboxError::Validation { .. }));
    }

    /// Applies another sender's write right after the first read of a document
    struct InterleavedWrite {
        inner: MemoryGateway,
        write: std::sync::Mutex<Option<serde_json::Value>>,
    }

    #[async_trait::async_trait]
    impl RemoteGateway for InterleavedWrite {
        async fn list_documents(
            &self,
            collection: &str,
            query: &DocumentQuery,
        ) -> crate::gateway::Result<Vec<serde_json::Value>> {
            self.inner.list_documents(collection, query).await
        }

        async fn get_document(
            &self,
            collection: &str,
            id: &str,
        ) -> crate::gateway::Result<Option<serde_json::Value>> {
            let found = self.inner.get_document(collection, id).await?;
            let write = self.write.lock().unwrap().take();
            if let Some(data) = write {
                self.inner.update_document(collection, id, data).await?;
            }
            Ok(found)
        }

        async fn create_document(
            &self,
            collection: &str,
            id: &str,
            data: serde_json::Value,
        ) -> crate::gateway::Result<serde_json::Value> {
            self.inner.create_document(collection, id, data).await
        }

        async fn update_document(
            &self,
            collection: &str,
            id: &str,
            data: serde_json::Value,
        ) -> crate::gateway::Result<serde_json::Value> {
            self.inner.update_document(collection, id, data).await
        }

        async fn subscribe(&self, channel: &str) -> crate::gateway::Result<crate::gateway::Subscription> {
            self.inner.subscribe(channel).await
        }
    }

    #[tokio::test]
    async fn test_record_message_keeps_concurrent_increment() {
        let inner = MemoryGateway::new("main");
        inner
            .insert(
                "conversations",
                serde_json::json!({
                    "$id": "c1",
                    "$updatedAt": "2024-03-01T10:00:00.000+00:00",
                    "tourist_id": "t1",
                    "provider_id": "p1",
                    "listing_id": "l1",
                    "provider_unread": 2
                }),
            )
            .await;
        let gateway = InterleavedWrite {
            inner: inner.clone(),
            write: std::sync::Mutex::new(Some(serde_json::json!({"provider_unread": 3}))),
        };
        let threads = ThreadService::new(Arc::new(gateway), &InboxConfig::default());

        let updated = threads.record_message("c1", Role::Tourist, "Still free?").await.unwrap();
        assert_eq!(updated.provider_unread, 4);
        assert_eq!(updated.tourist_unread, 0);
    }

    #[tokio::test]
    async fn test_record_message_unknown_conversation() {
        let gateway = MemoryGateway::new("main");
        let result = service(&gateway).record_message("nope", Role::Tourist, "hi").await;
        assert_matches!(result, Err(InboxError::Gateway(GatewayError::NotFound { .. })));
    }
}

//! Conversation Fetcher
//!
//! Issues the role-appropriate conversation query for a viewer and joins the
//! display fields an inbox row shows: the counterpart's name and avatar and
//! the listing title.

use futures_util::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::gateway::{DocumentQuery, RemoteGateway};
use crate::shared::config::{CollectionIds, InboxConfig};
use crate::shared::error::InboxError;
use crate::shared::messaging::{sort_by_recent, Conversation, ConversationSummary, Role, Viewer};

/// Attributes tried, in order, for a counterpart's display name
const NAME_FIELDS: &[&str] = &["business_name", "display_name", "full_name", "name"];
/// Attributes tried, in order, for a counterpart's avatar
const AVATAR_FIELDS: &[&str] = &["avatar_url", "logo_url", "photo_url"];

/// Display data of one counterpart profile
#[derive(Debug, Clone, Default)]
struct Profile {
    name: Option<String>,
    avatar: Option<String>,
}

/// Role-aware conversation query with display joins
#[derive(Clone)]
pub struct ConversationFetcher {
    gateway: Arc<dyn RemoteGateway>,
    collections: CollectionIds,
    limit: usize,
}

impl std::fmt::Debug for ConversationFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationFetcher")
            .field("collections", &self.collections)
            .field("limit", &self.limit)
            .finish()
    }
}

impl ConversationFetcher {
    /// Create a fetcher over `gateway`
    pub fn new(gateway: Arc<dyn RemoteGateway>, config: &InboxConfig) -> Self {
        Self {
            gateway,
            collections: config.collections.clone(),
            limit: config.fetch_limit,
        }
    }

    /// Query selecting the viewer's conversations, newest first
    pub fn query_for(&self, viewer: &Viewer) -> DocumentQuery {
        DocumentQuery::new()
            .filter_eq(viewer.role.identity_field(), viewer.id.clone())
            .order_desc("last_message_at")
            .limit(self.limit)
    }

    /// Fetch the viewer's conversations without display joins
    ///
    /// Documents that cannot be decoded are skipped with a warning.
    pub async fn fetch_conversations(&self, viewer: &Viewer) -> Result<Vec<Conversation>, InboxError> {
        let documents = self
            .gateway
            .list_documents(&self.collections.conversations, &self.query_for(viewer))
            .await?;

        Ok(documents
            .iter()
            .filter_map(|document| match Conversation::from_document(document) {
                Ok(conversation) => Some(conversation),
                Err(e) => {
                    tracing::warn!("[Fetcher] Skipping malformed conversation: {}", e);
                    None
                }
            })
            .collect())
    }

    /// Fetch the viewer's enriched conversation summaries, newest first
    pub async fn fetch(&self, viewer: &Viewer) -> Result<Vec<ConversationSummary>, InboxError> {
        let conversations = self.fetch_conversations(viewer).await?;
        tracing::debug!(
            "[Fetcher] {} conversations for {} {}",
            conversations.len(),
            viewer.role,
            viewer.id
        );

        let counterpart_role = viewer.role.counterpart();
        let counterpart_ids: BTreeSet<String> = conversations
            .iter()
            .map(|c| c.participant(counterpart_role).to_string())
            .filter(|id| !id.is_empty())
            .collect();
        let listing_ids: BTreeSet<String> = conversations
            .iter()
            .map(|c| c.listing_id.clone())
            .filter(|id| !id.is_empty())
            .collect();

        let (profiles, titles) = tokio::join!(
            self.load_profiles(counterpart_role, counterpart_ids),
            self.load_listing_titles(listing_ids)
        );

        let mut summaries: Vec<ConversationSummary> = conversations
            .into_iter()
            .map(|conversation| {
                let profile = profiles
                    .get(conversation.participant(counterpart_role))
                    .cloned()
                    .unwrap_or_default();
                let listing_title = titles.get(&conversation.listing_id).cloned();
                ConversationSummary {
                    conversation,
                    counterpart_name: profile.name,
                    counterpart_avatar: profile.avatar,
                    listing_title,
                }
            })
            .collect();

        sort_by_recent(&mut summaries);
        Ok(summaries)
    }

    /// Fetch summaries, logging any failure and returning an empty list
    pub async fn fetch_or_empty(&self, viewer: &Viewer) -> Vec<ConversationSummary> {
        match self.fetch(viewer).await {
            Ok(summaries) => summaries,
            Err(e) => {
                tracing::warn!("[Fetcher] Failed to fetch conversations: {}", e);
                Vec::new()
            }
        }
    }

    async fn load_profiles(&self, role: Role, ids: BTreeSet<String>) -> HashMap<String, Profile> {
        let collection = match role {
            Role::Tourist => &self.collections.users,
            Role::Provider => &self.collections.providers,
        };

        let lookups = ids.into_iter().map(|id| async move {
            match self.gateway.get_document(collection, &id).await {
                Ok(Some(document)) => Some((
                    id,
                    Profile {
                        name: first_text(&document, NAME_FIELDS),
                        avatar: first_text(&document, AVATAR_FIELDS),
                    },
                )),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("[Fetcher] Profile {}/{} unavailable: {}", collection, id, e);
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }

    async fn load_listing_titles(&self, ids: BTreeSet<String>) -> HashMap<String, String> {
        let collection = &self.collections.listings;
        let lookups = ids.into_iter().map(|id| async move {
            match self.gateway.get_document(collection, &id).await {
                Ok(Some(document)) => first_text(&document, &["title"]).map(|title| (id, title)),
                Ok(None) => None,
                Err(e) => {
                    tracing::warn!("[Fetcher] Listing {} unavailable: {}", id, e);
                    None
                }
            }
        });
        join_all(lookups).await.into_iter().flatten().collect()
    }
}

fn first_text(document: &serde_json::Value, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| {
        document
            .get(*field)
            .and_then(|value| value.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    })
}

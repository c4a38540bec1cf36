//! # Unread Aggregation
//!
//! The unread badge is a derived scalar: the sum of the viewer's own unread
//! counter across every conversation they take part in. A tourist's total
//! never includes `provider_unread` and a provider's total never includes
//! `tourist_unread`.

use crate::shared::error::InboxError;
use crate::shared::messaging::{Conversation, Role, Viewer};

use super::fetcher::ConversationFetcher;

/// Sum the role-appropriate unread counter, saturating at `u32::MAX`
pub fn unread_total<'a>(role: Role, conversations: impl IntoIterator<Item = &'a Conversation>) -> u32 {
    conversations
        .into_iter()
        .fold(0u32, |total, conversation| {
            total.saturating_add(conversation.unread_for(role))
        })
}

/// Requery-and-resum unread counter
#[derive(Debug, Clone)]
pub struct UnreadAggregator {
    fetcher: ConversationFetcher,
}

impl UnreadAggregator {
    /// Create an aggregator using `fetcher`'s query
    pub fn new(fetcher: ConversationFetcher) -> Self {
        Self { fetcher }
    }

    /// Query the viewer's conversations and sum their unread counters
    pub async fn recompute(&self, viewer: &Viewer) -> Result<u32, InboxError> {
        let conversations = self.fetcher.fetch_conversations(viewer).await?;
        Ok(unread_total(viewer.role, &conversations))
    }
}

//! Conversation Summary
//!
//! A conversation joined with the display fields an inbox row needs.

use serde::{Deserialize, Serialize};

use super::conversation::{Conversation, ConversationPatch};
use crate::shared::time::sort_millis;

/// Conversation plus counterpart and listing display data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    /// Underlying conversation document
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Display name of the other party
    pub counterpart_name: Option<String>,
    /// Avatar URL of the other party
    pub counterpart_avatar: Option<String>,
    /// Title of the listing the thread is about
    pub listing_title: Option<String>,
}

impl ConversationSummary {
    /// Wrap a conversation with no display data
    pub fn bare(conversation: Conversation) -> Self {
        Self {
            conversation,
            counterpart_name: None,
            counterpart_avatar: None,
            listing_title: None,
        }
    }

    /// Conversation id
    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    /// Merge an update patch into the underlying conversation
    pub fn apply_patch(&mut self, patch: &ConversationPatch) {
        patch.apply(&mut self.conversation);
    }

    /// Ordering key: last message time in milliseconds, `None` when absent
    pub fn sort_key(&self) -> Option<i64> {
        sort_millis(self.conversation.last_message_at.as_deref())
    }
}

/// Sort summaries newest first; entries without a last message sink to the bottom
///
/// The sort is stable, entries with equal keys keep their relative order.
/// Under `Reverse`, a `None` key orders after every `Some`, including
/// timestamps at or before the epoch.
pub fn sort_by_recent(summaries: &mut [ConversationSummary]) {
    summaries.sort_by_key(|summary| std::cmp::Reverse(summary.sort_key()));
}

//! Conversation List State Machine
//!
//! Holds one viewer's ordered conversation summaries and reconciles realtime
//! change events against them:
//!
//! - **create** - the new row needs display joins, so a full refetch is requested
//! - **update** - the payload is merged into the matching row, then the list is re-sorted
//! - **delete** - the matching row is removed
//!
//! ```text
//! Idle ──begin_loading──▶ Loading ──finish_fetch(Ok)──▶ Ready ◀─┐
//!                            │                             └────┘ refetch
//!                            └──finish_fetch(Err)──▶ Error ──retry──▶ Loading
//! ```

use crate::shared::error::InboxError;
use crate::shared::event::ChangeEvent;
use crate::shared::messaging::{sort_by_recent, ConversationPatch, ConversationSummary, Viewer};
use crate::shared::time::parse_timestamp;

use super::unread::unread_total;

/// Observable state of the list
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ListState {
    /// No viewer is signed in
    #[default]
    Idle,
    /// A fetch is in flight and nothing has been loaded yet
    Loading,
    /// Summaries as of the last fetch plus applied events
    Ready(Vec<ConversationSummary>),
    /// The last fetch failed
    Error(String),
}

impl ListState {
    /// Summaries when ready, otherwise an empty slice
    pub fn summaries(&self) -> &[ConversationSummary] {
        match self {
            ListState::Ready(summaries) => summaries,
            _ => &[],
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ListState::Ready(_))
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, ListState::Loading)
    }

    /// Failure reason if the last fetch failed
    pub fn error(&self) -> Option<&str> {
        match self {
            ListState::Error(reason) => Some(reason),
            _ => None,
        }
    }
}

/// What the owner must do after an event was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEffect {
    /// Nothing changed
    Unchanged,
    /// The list changed in place
    Changed,
    /// The list must be refetched
    Refetch,
}

/// One viewer's conversation list
#[derive(Debug, Clone, Default)]
pub struct ConversationList {
    viewer: Option<Viewer>,
    state: ListState,
}

impl ConversationList {
    /// Create an idle list
    pub fn new() -> Self {
        Self::default()
    }

    pub fn viewer(&self) -> Option<&Viewer> {
        self.viewer.as_ref()
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    /// Summaries when ready, otherwise empty
    pub fn summaries(&self) -> &[ConversationSummary] {
        self.state.summaries()
    }

    /// Unread total for the viewer over the current summaries
    pub fn unread(&self) -> u32 {
        match &self.viewer {
            Some(viewer) => unread_total(viewer.role, self.summaries().iter().map(|s| &s.conversation)),
            None => 0,
        }
    }

    /// Start loading for `viewer`
    ///
    /// On first load (or after an error or a viewer change) the state becomes
    /// `Loading`. A refetch for the same viewer keeps the current rows
    /// visible until the result arrives.
    pub fn begin_loading(&mut self, viewer: Viewer) {
        let same_viewer = self.viewer.as_ref() == Some(&viewer);
        if !(same_viewer && self.state.is_ready()) {
            self.state = ListState::Loading;
        }
        self.viewer = Some(viewer);
    }

    /// Drop the viewer and every row
    pub fn reset(&mut self) {
        self.viewer = None;
        self.state = ListState::Idle;
    }

    /// Settle a fetch
    pub fn finish_fetch(&mut self, result: Result<Vec<ConversationSummary>, InboxError>) {
        if self.viewer.is_none() {
            return;
        }
        self.state = match result {
            Ok(mut summaries) => {
                sort_by_recent(&mut summaries);
                ListState::Ready(summaries)
            }
            Err(e) => ListState::Error(e.to_string()),
        };
    }

    /// Reconcile one change event
    ///
    /// Events are ignored unless the list is `Ready`.
    pub fn apply(&mut self, event: &ChangeEvent) -> ListEffect {
        let Some(viewer) = self.viewer.as_ref() else {
            return ListEffect::Unchanged;
        };
        let ListState::Ready(summaries) = &mut self.state else {
            return ListEffect::Unchanged;
        };

        match event {
            ChangeEvent::Created { payload, .. } => {
                if viewer.matches_document(payload) {
                    ListEffect::Refetch
                } else {
                    ListEffect::Unchanged
                }
            }
            ChangeEvent::Updated { id, payload } => {
                let Some(summary) = summaries.iter_mut().find(|s| s.id() == id) else {
                    return ListEffect::Unchanged;
                };
                let patch = ConversationPatch::from_payload(payload);
                if patch.is_empty() || is_older(patch.updated_at.as_deref(), summary) {
                    return ListEffect::Unchanged;
                }
                summary.apply_patch(&patch);
                sort_by_recent(summaries);
                ListEffect::Changed
            }
            ChangeEvent::Deleted { id, .. } => {
                let before = summaries.len();
                summaries.retain(|s| s.id() != id);
                if summaries.len() == before {
                    ListEffect::Unchanged
                } else {
                    ListEffect::Changed
                }
            }
        }
    }
}

/// Whether a payload written at `updated_at` predates the row's own write time
fn is_older(updated_at: Option<&str>, summary: &ConversationSummary) -> bool {
    let incoming = updated_at.and_then(parse_timestamp);
    let current = summary
        .conversation
        .updated_at
        .as_deref()
        .and_then(parse_timestamp);
    matches!((incoming, current), (Some(incoming), Some(current)) if incoming < current)
}

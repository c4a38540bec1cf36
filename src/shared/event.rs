/**
 * Realtime Change Events
 *
 * This module defines the envelope delivered by a realtime channel and the
 * typed change events the inbox reconciles.
 *
 * A raw `RealtimeEvent` carries the backend's event strings (for example
 * `databases.main.collections.conversations.documents.c1.update`) and a
 * snapshot of the affected document. `ChangeEvent` is the classified form.
 */
use serde::{Deserialize, Serialize};

/// Kind of document change
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// A document was created
    Create,
    /// A document was updated
    Update,
    /// A document was deleted
    Delete,
}

impl ChangeKind {
    /// Event string suffix used by the backend
    pub fn suffix(self) -> &'static str {
        match self {
            ChangeKind::Create => "create",
            ChangeKind::Update => "update",
            ChangeKind::Delete => "delete",
        }
    }

    fn from_event_string(event: &str) -> Option<Self> {
        let last = event.rsplit('.').next().unwrap_or(event);
        match last {
            "create" => Some(ChangeKind::Create),
            "update" => Some(ChangeKind::Update),
            "delete" => Some(ChangeKind::Delete),
            _ => None,
        }
    }
}

/// Envelope delivered on a realtime channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeEvent {
    /// Event strings describing the change
    #[serde(default)]
    pub events: Vec<String>,
    /// Snapshot of the affected document
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl RealtimeEvent {
    /// Create a new realtime event
    pub fn new(events: Vec<String>, payload: serde_json::Value) -> Self {
        Self { events, payload }
    }

    /// Build the event the backend emits for `kind` on a document
    pub fn for_document(
        channel: &str,
        kind: ChangeKind,
        payload: serde_json::Value,
    ) -> Self {
        let id = document_id(&payload).unwrap_or("*").to_string();
        Self::new(
            vec![
                format!("{}.{}.{}", channel, id, kind.suffix()),
                format!("{}.*.{}", channel, kind.suffix()),
            ],
            payload,
        )
    }

    /// Classify the event by the first recognised event string
    pub fn kind(&self) -> Option<ChangeKind> {
        self.events
            .iter()
            .find_map(|event| ChangeKind::from_event_string(event))
    }

    /// Convert into a typed change event
    ///
    /// Returns `None` when no event string is recognised or the payload has
    /// no document id.
    pub fn into_change(self) -> Option<ChangeEvent> {
        let kind = self.kind()?;
        let id = document_id(&self.payload)?.to_string();
        Some(match kind {
            ChangeKind::Create => ChangeEvent::Created {
                id,
                payload: self.payload,
            },
            ChangeKind::Update => ChangeEvent::Updated {
                id,
                payload: self.payload,
            },
            ChangeKind::Delete => ChangeEvent::Deleted {
                id,
                payload: self.payload,
            },
        })
    }
}

/// Typed document change
#[derive(Debug, Clone, PartialEq)]
pub enum ChangeEvent {
    /// A document was created
    Created {
        /// Document id
        id: String,
        /// Document snapshot
        payload: serde_json::Value,
    },
    /// A document was updated
    Updated {
        /// Document id
        id: String,
        /// Document snapshot after the update
        payload: serde_json::Value,
    },
    /// A document was deleted
    Deleted {
        /// Document id
        id: String,
        /// Last known snapshot
        payload: serde_json::Value,
    },
}

impl ChangeEvent {
    /// Id of the affected document
    pub fn id(&self) -> &str {
        match self {
            ChangeEvent::Created { id, .. }
            | ChangeEvent::Updated { id, .. }
            | ChangeEvent::Deleted { id, .. } => id,
        }
    }

    /// Kind of the change
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeEvent::Created { .. } => ChangeKind::Create,
            ChangeEvent::Updated { .. } => ChangeKind::Update,
            ChangeEvent::Deleted { .. } => ChangeKind::Delete,
        }
    }
}

/// Read the `$id` attribute of a document snapshot
pub fn document_id(document: &serde_json::Value) -> Option<&str> {
    document.get("$id").and_then(|value| value.as_str())
}

/// Channel name for every document of a collection
pub fn collection_channel(database: &str, collection: &str) -> String {
    format!("databases.{}.collections.{}.documents", database, collection)
}

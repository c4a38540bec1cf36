//! Conversation Data Structure
//!
//! Represents a 1:1 thread between one tourist and one provider about one
//! listing, as stored in the conversations collection.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::shared::error::InboxError;

/// Which side of a conversation a party is on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A traveler browsing listings
    Tourist,
    /// A stay, transport or guide provider
    Provider,
}

impl Role {
    /// Attribute holding this role's participant id
    pub fn identity_field(self) -> &'static str {
        match self {
            Role::Tourist => "tourist_id",
            Role::Provider => "provider_id",
        }
    }

    /// Attribute holding this role's unread counter
    pub fn unread_field(self) -> &'static str {
        match self {
            Role::Tourist => "tourist_unread",
            Role::Provider => "provider_unread",
        }
    }

    /// The other side of the conversation
    pub fn counterpart(self) -> Role {
        match self {
            Role::Tourist => Role::Provider,
            Role::Provider => Role::Tourist,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Tourist => write!(f, "tourist"),
            Role::Provider => write!(f, "provider"),
        }
    }
}

impl FromStr for Role {
    type Err = InboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tourist" | "traveler" | "traveller" => Ok(Role::Tourist),
            "provider" => Ok(Role::Provider),
            other => Err(InboxError::validation(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// The authenticated party looking at the inbox
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Viewer {
    /// Participant id (user id for tourists, provider id for providers)
    pub id: String,
    /// Side of the conversation the viewer is on
    pub role: Role,
}

impl Viewer {
    /// Create a new viewer
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
        }
    }

    /// Create a tourist viewer
    pub fn tourist(id: impl Into<String>) -> Self {
        Self::new(id, Role::Tourist)
    }

    /// Create a provider viewer
    pub fn provider(id: impl Into<String>) -> Self {
        Self::new(id, Role::Provider)
    }

    /// Whether a raw document snapshot names this viewer on its side
    pub fn matches_document(&self, document: &serde_json::Value) -> bool {
        document
            .get(self.role.identity_field())
            .and_then(|value| value.as_str())
            .map(|id| id == self.id)
            .unwrap_or(false)
    }
}

/// A conversation document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    /// Document id
    #[serde(rename = "$id")]
    pub id: String,
    /// Creation time (RFC 3339)
    #[serde(rename = "$createdAt", default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    /// Last write time (RFC 3339)
    #[serde(rename = "$updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    /// Listing the thread is about
    #[serde(default)]
    pub listing_id: String,
    /// Tourist participant
    pub tourist_id: String,
    /// Provider participant
    pub provider_id: String,
    /// Preview of the last message
    #[serde(default)]
    pub last_message: Option<String>,
    /// Time of the last message
    #[serde(default)]
    pub last_message_at: Option<String>,
    /// Messages the tourist has not read
    #[serde(default, deserialize_with = "lenient_count")]
    pub tourist_unread: u32,
    /// Messages the provider has not read
    #[serde(default, deserialize_with = "lenient_count")]
    pub provider_unread: u32,
}

impl Conversation {
    /// Create a new, empty conversation
    pub fn new(
        id: impl Into<String>,
        tourist_id: impl Into<String>,
        provider_id: impl Into<String>,
        listing_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            updated_at: None,
            listing_id: listing_id.into(),
            tourist_id: tourist_id.into(),
            provider_id: provider_id.into(),
            last_message: None,
            last_message_at: None,
            tourist_unread: 0,
            provider_unread: 0,
        }
    }

    /// Decode a document snapshot
    pub fn from_document(document: &serde_json::Value) -> Result<Self, InboxError> {
        Ok(serde_json::from_value(document.clone())?)
    }

    /// Unread counter relevant to `role`
    pub fn unread_for(&self, role: Role) -> u32 {
        match role {
            Role::Tourist => self.tourist_unread,
            Role::Provider => self.provider_unread,
        }
    }

    /// Participant id on `role`'s side
    pub fn participant(&self, role: Role) -> &str {
        match role {
            Role::Tourist => &self.tourist_id,
            Role::Provider => &self.provider_id,
        }
    }

    /// Participant id of the other side, from `role`'s point of view
    pub fn counterpart_id(&self, role: Role) -> &str {
        self.participant(role.counterpart())
    }

    /// Document body without the `$` metadata attributes
    pub fn to_data(&self) -> serde_json::Value {
        serde_json::json!({
            "listing_id": self.listing_id,
            "tourist_id": self.tourist_id,
            "provider_id": self.provider_id,
            "last_message": self.last_message,
            "last_message_at": self.last_message_at,
            "tourist_unread": self.tourist_unread,
            "provider_unread": self.provider_unread,
        })
    }
}

/// Fields carried by an update payload
///
/// Every field is optional. A field is `Some` only when the payload contains
/// it with a usable type; nullable text fields use `Some(None)` for an
/// explicit `null`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationPatch {
    pub listing_id: Option<String>,
    pub tourist_id: Option<String>,
    pub provider_id: Option<String>,
    pub updated_at: Option<String>,
    pub last_message: Option<Option<String>>,
    pub last_message_at: Option<Option<String>>,
    pub tourist_unread: Option<u32>,
    pub provider_unread: Option<u32>,
}

impl ConversationPatch {
    /// Extract the patchable fields from a document snapshot
    pub fn from_payload(payload: &serde_json::Value) -> Self {
        Self {
            listing_id: text_field(payload, "listing_id"),
            tourist_id: text_field(payload, "tourist_id"),
            provider_id: text_field(payload, "provider_id"),
            updated_at: text_field(payload, "$updatedAt"),
            last_message: nullable_text_field(payload, "last_message"),
            last_message_at: nullable_text_field(payload, "last_message_at"),
            tourist_unread: payload.get("tourist_unread").and_then(count_value),
            provider_unread: payload.get("provider_unread").and_then(count_value),
        }
    }

    /// Whether the patch carries no field at all
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the patch into a conversation
    pub fn apply(&self, conversation: &mut Conversation) {
        if let Some(value) = &self.listing_id {
            conversation.listing_id = value.clone();
        }
        if let Some(value) = &self.tourist_id {
            conversation.tourist_id = value.clone();
        }
        if let Some(value) = &self.provider_id {
            conversation.provider_id = value.clone();
        }
        if let Some(value) = &self.updated_at {
            conversation.updated_at = Some(value.clone());
        }
        if let Some(value) = &self.last_message {
            conversation.last_message = value.clone();
        }
        if let Some(value) = &self.last_message_at {
            conversation.last_message_at = value.clone();
        }
        if let Some(value) = self.tourist_unread {
            conversation.tourist_unread = value;
        }
        if let Some(value) = self.provider_unread {
            conversation.provider_unread = value;
        }
    }
}

fn text_field(payload: &serde_json::Value, key: &str) -> Option<String> {
    payload
        .get(key)
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

fn nullable_text_field(payload: &serde_json::Value, key: &str) -> Option<Option<String>> {
    match payload.get(key)? {
        serde_json::Value::Null => Some(None),
        serde_json::Value::String(s) => Some(Some(s.clone())),
        _ => None,
    }
}

/// Read a non-negative counter from a JSON value
///
/// Integers, finite non-negative floats (truncated) and numeric strings are
/// accepted; values above `u32::MAX` saturate.
pub fn count_value(value: &serde_json::Value) -> Option<u32> {
    let clamp = |n: u64| u32::try_from(n).unwrap_or(u32::MAX);
    match value {
        serde_json::Value::Number(n) => {
            if let Some(n) = n.as_u64() {
                Some(clamp(n))
            } else {
                n.as_f64()
                    .filter(|f| f.is_finite() && *f >= 0.0)
                    .map(|f| clamp(f as u64))
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok().map(clamp),
        _ => None,
    }
}

fn lenient_count<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(count_value(&value).unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document() -> serde_json::Value {
        json!({
            "$id": "c1",
            "$createdAt": "2024-01-01T00:00:00.000+00:00",
            "listing_id": "l1",
            "tourist_id": "t1",
            "provider_id": "p1",
            "last_message": "See you at the pier",
            "last_message_at": "2024-01-02T09:00:00.000+00:00",
            "tourist_unread": 2,
            "provider_unread": 5
        })
    }

    #[test]
    fn test_from_document() {
        let conversation = Conversation::from_document(&document()).unwrap();
        assert_eq!(conversation.id, "c1");
        assert_eq!(conversation.unread_for(Role::Tourist), 2);
        assert_eq!(conversation.unread_for(Role::Provider), 5);
        assert_eq!(conversation.counterpart_id(Role::Tourist), "p1");
    }

    #[test]
    fn test_missing_and_malformed_counters_default_to_zero() {
        let conversation = Conversation::from_document(&json!({
            "$id": "c2",
            "tourist_id": "t1",
            "provider_id": "p1",
            "tourist_unread": "oops",
        }))
        .unwrap();
        assert_eq!(conversation.tourist_unread, 0);
        assert_eq!(conversation.provider_unread, 0);
    }

    #[test]
    fn test_count_value_variants() {
        assert_eq!(count_value(&json!(3)), Some(3));
        assert_eq!(count_value(&json!(2.9)), Some(2));
        assert_eq!(count_value(&json!("7")), Some(7));
        assert_eq!(count_value(&json!(-1)), None);
        assert_eq!(count_value(&json!(null)), None);
        assert_eq!(count_value(&json!(u64::MAX)), Some(u32::MAX));
    }

    #[test]
    fn test_patch_only_touches_present_fields() {
        let mut conversation = Conversation::from_document(&document()).unwrap();
        let patch = ConversationPatch::from_payload(&json!({
            "$id": "c1",
            "tourist_unread": 0,
            "last_message": null,
        }));
        patch.apply(&mut conversation);

        assert_eq!(conversation.tourist_unread, 0);
        assert_eq!(conversation.provider_unread, 5);
        assert_eq!(conversation.last_message, None);
        assert_eq!(
            conversation.last_message_at.as_deref(),
            Some("2024-01-02T09:00:00.000+00:00")
        );
    }

    #[test]
    fn test_patch_ignores_wrong_types() {
        let patch = ConversationPatch::from_payload(&json!({"tourist_unread": "many", "last_message": 4}));
        assert!(patch.is_empty());
    }

    #[test]
    fn test_viewer_matches_document() {
        let viewer = Viewer::provider("p1");
        assert!(viewer.matches_document(&document()));
        assert!(!Viewer::tourist("p1").matches_document(&document()));
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("Tourist".parse::<Role>().unwrap(), Role::Tourist);
        assert_eq!("provider".parse::<Role>().unwrap(), Role::Provider);
        assert!("admin".parse::<Role>().is_err());
    }
}

//! Canonical event model and ingest normalization.
//!
//! The transport layer delivers loosely-shaped [`RawMessage`] records; the
//! ingestor validates them into immutable [`Event`]s before anything else
//! sees them. A rejected message never touches aggregation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

/// Kind of entity being tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// An individual chat user.
    User,
    /// A group or channel.
    Group,
}

impl EntityKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "user" => Some(EntityKind::User),
            "group" => Some(EntityKind::Group),
            _ => None,
        }
    }
}

/// A (kind, id) reference to a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Whether this is a user or a group.
    pub kind: EntityKind,
    /// Stable external identifier.
    pub id: i64,
}

impl EntityRef {
    /// References a user by id.
    pub fn user(id: i64) -> Self {
        Self {
            kind: EntityKind::User,
            id,
        }
    }

    /// References a group by id.
    pub fn group(id: i64) -> Self {
        Self {
            kind: EntityKind::Group,
            id,
        }
    }
}

impl std::fmt::Display for EntityRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind.as_str(), self.id)
    }
}

/// Kind of chat message.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Plain text message.
    #[default]
    Text,
    /// Photo attachment.
    Photo,
    /// Video attachment.
    Video,
    /// Document attachment.
    Document,
    /// Audio file.
    Audio,
    /// Voice note.
    Voice,
}

impl MessageKind {
    /// Returns the kind name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::Text => "text",
            MessageKind::Photo => "photo",
            MessageKind::Video => "video",
            MessageKind::Document => "document",
            MessageKind::Audio => "audio",
            MessageKind::Voice => "voice",
        }
    }

    /// Parses a kind from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" => Some(MessageKind::Text),
            "photo" => Some(MessageKind::Photo),
            "video" => Some(MessageKind::Video),
            "document" => Some(MessageKind::Document),
            "audio" => Some(MessageKind::Audio),
            "voice" => Some(MessageKind::Voice),
            _ => None,
        }
    }
}

/// A raw inbound chat message as delivered by the transport layer.
///
/// All fields the engine requires are optional here; validation happens in
/// [`Event::normalize`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMessage {
    /// Id of the user who sent the message.
    pub user_id: Option<i64>,
    /// Id of the group/channel the message was posted in, if any.
    pub group_id: Option<i64>,
    /// When the message was sent.
    pub timestamp: Option<DateTime<Utc>>,
    /// Message kind as a transport string (e.g. "text", "photo").
    pub kind: Option<String>,
    /// Message text; absent for media messages.
    pub text: Option<String>,
}

/// One canonical chat event fed into the engine. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The acting user.
    pub user_id: i64,
    /// The group/channel the message was posted in, if any.
    pub group_id: Option<i64>,
    /// When the message was sent.
    pub timestamp: DateTime<Utc>,
    /// Kind of message.
    pub kind: MessageKind,
    /// Message text; empty for media messages.
    pub text: String,
}

impl Event {
    /// Validates a raw message into a canonical event.
    ///
    /// Rejects messages missing a user id or timestamp with
    /// [`EngineError::InvalidEvent`]; an unknown kind string falls back to
    /// [`MessageKind::Text`] rather than dropping the message.
    pub fn normalize(raw: RawMessage) -> Result<Self> {
        let user_id = raw.user_id.ok_or_else(|| {
            warn!("rejecting event with missing user id");
            EngineError::InvalidEvent("missing user id".to_string())
        })?;

        let timestamp = raw.timestamp.ok_or_else(|| {
            warn!(user_id, "rejecting event with missing timestamp");
            EngineError::InvalidEvent("missing timestamp".to_string())
        })?;

        let kind = raw
            .kind
            .as_deref()
            .and_then(MessageKind::parse)
            .unwrap_or_default();

        Ok(Event {
            user_id,
            group_id: raw.group_id,
            timestamp,
            kind,
            text: raw.text.unwrap_or_default(),
        })
    }

    /// The acting user as an entity reference.
    pub fn user(&self) -> EntityRef {
        EntityRef::user(self.user_id)
    }

    /// The group as an entity reference, if the message was posted in one.
    pub fn group(&self) -> Option<EntityRef> {
        self.group_id.map(EntityRef::group)
    }

    /// Returns true if this event carries analyzable text.
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

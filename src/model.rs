//! Conversation and message types exchanged with a [`ConversationService`].
//!
//! Identifiers are opaque strings assigned by the remote service. They are
//! never parsed or compared for order on this side; the only thing the
//! exporter does with a [`MessageId`] is hand it back as a pagination bound.
//!
//! [`ConversationService`]: crate::service::ConversationService
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Primitive / ID types
// ---------------------------------------------------------------------------

/// Opaque conversation identifier, stable per remote service
/// (e.g. `"4915112345678@c.us"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The user part of the identifier (everything before the first `@`).
    pub fn user(&self) -> &str {
        self.0.split('@').next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque message identifier. Doubles as the "fetch strictly older than"
/// pagination cursor, so it must round-trip to the service untouched.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl<T: Into<String>> From<T> for MessageId {
    fn from(value: T) -> Self {
        Self(value.into())
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    #[default]
    Direct,
    Group,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    /// Explicit name (set for groups and saved contacts).
    #[serde(default)]
    pub name: Option<String>,
    /// Service-formatted title, typically a phone number for unsaved contacts.
    #[serde(default)]
    pub formatted_title: Option<String>,
    #[serde(default)]
    pub kind: ConversationKind,
}

impl Conversation {
    /// Display title: name, then formatted title, then the id's user part.
    /// Empty strings count as absent at every step.
    pub fn display_title(&self) -> String {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.formatted_title))
            .or_else(|| Some(self.id.user()).filter(|u| !u.is_empty()))
            .unwrap_or_else(|| self.id.as_str())
            .to_string()
    }
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A message as delivered by the service, before flattening.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: MessageId,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    /// Author address (`"491701234567@c.us"`). Absent for self-authored
    /// messages and in one-to-one chats.
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub from_me: bool,
    #[serde(default)]
    pub body: String,
}

/// Parameters of one paginated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageQuery {
    pub limit: usize,
    /// Return only messages strictly older than this one. `None` means
    /// "start from the newest message".
    pub before: Option<MessageId>,
}

/// One exported row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub conversation: String,
    pub date: String,
    pub time: String,
    pub author: String,
    pub body: String,
}

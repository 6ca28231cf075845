use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, conversation-unique message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh collision-resistant identifier
    pub fn generate() -> Self {
        Self(cuid2::create_id())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Logical conversation a message, fetch or subscription is bound to.
/// One scope per viewer identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationScope(String);

impl ConversationScope {
    pub fn new(scope: impl Into<String>) -> Self {
        Self(scope.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    #[serde(alias = "user")]
    Viewer,
    #[serde(alias = "ai")]
    Assistant,
}

impl SenderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::Viewer => "viewer",
            SenderKind::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sender kind: {0}")]
pub struct UnknownSenderKind(pub String);

impl FromStr for SenderKind {
    type Err = UnknownSenderKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" | "user" => Ok(SenderKind::Viewer),
            "assistant" | "ai" => Ok(SenderKind::Assistant),
            other => Err(UnknownSenderKind(other.to_string())),
        }
    }
}

impl From<SenderKind> for String {
    fn from(kind: SenderKind) -> Self {
        kind.as_str().to_string()
    }
}

/// A single conversation message. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Conversation the message belongs to
    pub scope: ConversationScope,
    pub content: String,
    pub sender: SenderKind,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a message stamped with a fresh id and the current time
    pub fn new(scope: ConversationScope, content: impl Into<String>, sender: SenderKind) -> Self {
        Self {
            id: MessageId::generate(),
            scope,
            content: content.into(),
            sender,
            created_at: Utc::now(),
        }
    }

    /// Total order used for every exposed sequence: creation time, then id.
    pub fn display_order(&self, other: &Self) -> Ordering {
        self.created_at
            .cmp(&other.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn is_viewer(&self) -> bool {
        matches!(self.sender, SenderKind::Viewer)
    }

    pub fn is_assistant(&self) -> bool {
        matches!(self.sender, SenderKind::Assistant)
    }
}

/// Materialised, deduplicated and ordered view of a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConversationView {
    pub messages: Vec<Message>,
    /// `true` until the initial history fetch has resolved
    pub loading: bool,
    /// Diagnostic left by a failed history fetch
    pub fetch_error: Option<String>,
}

impl ConversationView {
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.messages.iter().any(|message| &message.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.messages.iter().map(|message| message.id.as_str()).collect()
    }
}

impl Default for ConversationView {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            loading: true,
            fetch_error: None,
        }
    }
}

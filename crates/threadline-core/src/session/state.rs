//! Per-view conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier for one UI surface's view of a conversation.
///
/// Chosen by the caller (e.g. "page", "panel") - the registry materializes
/// a default session for any id on first write.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceId(pub String);

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a persisted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Unique identifier for a message within a session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// A single message in a conversation view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Unique within a session.
    pub id: MessageId,

    /// Author of the message.
    pub role: MessageRole,

    /// Message text.
    pub content: String,

    /// True while token-by-token growth is in progress.
    #[serde(default)]
    pub is_streaming: bool,

    /// When the message was created.
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Create a user message with a fresh id.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Create an assistant message with a fresh id.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            role,
            content: content.into(),
            is_streaming: false,
            created_at: Utc::now(),
        }
    }

    /// Set the streaming flag (builder style).
    pub fn with_streaming(mut self, is_streaming: bool) -> Self {
        self.is_streaming = is_streaming;
        self
    }
}

/// Partial update for a message; absent fields leave the target untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessagePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_streaming: Option<bool>,
}

impl MessagePatch {
    /// Replace the message content.
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// Flip the streaming flag.
    pub fn streaming(is_streaming: bool) -> Self {
        Self {
            is_streaming: Some(is_streaming),
            ..Default::default()
        }
    }

    /// Apply this patch to a message.
    pub fn apply(&self, message: &mut Message) {
        if let Some(content) = &self.content {
            message.content = content.clone();
        }
        if let Some(is_streaming) = self.is_streaming {
            message.is_streaming = is_streaming;
        }
    }
}

/// The mutable state of one instance's conversation view.
///
/// Created lazily by the registry on first access; reset only by an
/// explicit clear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Chronologically ordered messages.
    pub messages: Vec<Message>,

    /// True while an assistant response is being produced for this view.
    pub is_streaming: bool,

    /// Last recorded failure; cleared explicitly, never by message edits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Conversation this view mirrors; `None` means an unbound scratch
    /// session that no other view follows.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<ConversationId>,
}

impl Default for ConversationSession {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            is_streaming: false,
            error: None,
            conversation_id: None,
        }
    }
}

impl ConversationSession {
    /// Whether this view mirrors the given conversation.
    pub fn is_bound_to(&self, conversation: &ConversationId) -> bool {
        self.conversation_id.as_ref() == Some(conversation)
    }
}

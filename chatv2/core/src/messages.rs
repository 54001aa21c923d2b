//! Chat Messages
//!
//! A message is one turn in the currently loaded conversation. Messages are
//! owned by the [`ConversationStore`](crate::store::ConversationStore) message
//! list; the assistant's turn starts as an empty placeholder and grows while
//! its reply streams in.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wire::{self, timestamp};

/// Who sent a message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// The human user
    #[serde(alias = "USER", alias = "User")]
    User,
    /// The model
    #[serde(alias = "ASSISTANT", alias = "Assistant")]
    Assistant,
    /// System prompt or service notice
    #[serde(alias = "SYSTEM", alias = "System")]
    System,
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::System => write!(f, "system"),
        }
    }
}

/// A single chat message
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Backend row id (absent for turns created locally)
    #[serde(default)]
    pub id: Option<i64>,
    /// Who sent this message
    pub role: MessageRole,
    /// Message content; grows by append while streaming
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub content: String,
    /// When the message was created
    #[serde(default, with = "timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Whether the reply is still streaming into this message
    #[serde(default)]
    pub is_streaming: bool,
    /// Owning history row on the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_id: Option<i64>,
    /// Position within the conversation on the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_num: Option<i32>,
    /// Free-form metadata attached by the backend (token usage etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl Message {
    /// Create a message with the current time
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            timestamp: Some(Utc::now()),
            is_streaming: false,
            history_id: None,
            sequence_num: None,
            metadata: None,
        }
    }

    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// An empty assistant placeholder that the stream will fill
    #[must_use]
    pub fn assistant_placeholder() -> Self {
        Self {
            is_streaming: true,
            ..Self::new(MessageRole::Assistant, String::new())
        }
    }
}

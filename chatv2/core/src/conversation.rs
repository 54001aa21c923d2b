//! Conversations and Their Identifiers
//!
//! Conversations carry two identifiers:
//!
//! - `conversation_id`: an opaque string (a UUID minted by the backend). This
//!   is the canonical key and the only one guaranteed stable.
//! - `id`: the legacy numeric row id. Older records still have it and some
//!   callers still select by it, but new conversations may not have one.
//!
//! All lookups go through [`resolve`] / [`position`], which apply the
//! precedence rule of the [`ConversationSelector`] they are given. Call sites
//! never compare identifiers by hand.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::messages::Message;
use crate::wire::{self, timestamp};

/// A conversation summary as listed by the backend
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    /// Legacy numeric id (kept for backward compatibility only)
    #[serde(default)]
    pub id: Option<i64>,
    /// Canonical string identifier
    pub conversation_id: String,
    /// Model this conversation talks to
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub model_name: String,
    /// Display title
    #[serde(default, deserialize_with = "wire::null_as_default")]
    pub title: String,
    /// Creation time
    #[serde(default, with = "timestamp")]
    pub create_time: Option<DateTime<Utc>>,
    /// Last activity time
    #[serde(default, with = "timestamp")]
    pub update_time: Option<DateTime<Utc>>,
    /// UI-only: title is being edited inline
    #[serde(default, skip_serializing)]
    pub is_editing: bool,
    /// Owning user on the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    /// Who produced the title ("user", "auto", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_generated_by: Option<String>,
}

impl Conversation {
    /// Create a conversation known only by its canonical id
    pub fn new(conversation_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            conversation_id: conversation_id.into(),
            create_time: Some(now),
            update_time: Some(now),
            ..Self::default()
        }
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: &ConversationPatch) {
        if let Some(ref title) = patch.title {
            self.title.clone_from(title);
        }
        if let Some(ref model_name) = patch.model_name {
            self.model_name.clone_from(model_name);
        }
        if let Some(update_time) = patch.update_time {
            self.update_time = Some(update_time);
        }
        if let Some(is_editing) = patch.is_editing {
            self.is_editing = is_editing;
        }
        if let Some(ref by) = patch.title_generated_by {
            self.title_generated_by = Some(by.clone());
        }
    }
}

/// Conversation detail: the summary plus its message history
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    /// Summary fields
    #[serde(flatten)]
    pub conversation: Conversation,
    /// Ordered message history
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Partial update merged into a [`Conversation`]
///
/// `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConversationPatch {
    /// New title
    pub title: Option<String>,
    /// New model name
    pub model_name: Option<String>,
    /// New last-activity time
    pub update_time: Option<DateTime<Utc>>,
    /// Inline-edit flag
    pub is_editing: Option<bool>,
    /// Title provenance
    pub title_generated_by: Option<String>,
}

impl ConversationPatch {
    /// A rename performed by the user
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            update_time: Some(Utc::now()),
            title_generated_by: Some("user".to_string()),
            ..Self::default()
        }
    }

    /// Toggle inline editing
    #[must_use]
    pub fn editing(is_editing: bool) -> Self {
        Self {
            is_editing: Some(is_editing),
            ..Self::default()
        }
    }
}

/// Which conversation is selected
///
/// Selecting by the canonical string is the normal path. Selecting by the
/// legacy numeric id still works for old callers.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConversationSelector {
    /// Select by `conversation_id`
    Canonical(String),
    /// Select by legacy numeric `id`
    Legacy(i64),
}

impl ConversationSelector {
    /// Canonical selector
    pub fn canonical(conversation_id: impl Into<String>) -> Self {
        Self::Canonical(conversation_id.into())
    }

    /// Whether this selector picks out `conversation`
    #[must_use]
    pub fn matches(&self, conversation: &Conversation) -> bool {
        match self {
            Self::Canonical(key) => conversation.conversation_id == *key,
            Self::Legacy(id) => conversation.id == Some(*id),
        }
    }

    /// String form sent on the wire
    #[must_use]
    pub fn to_wire(&self) -> String {
        match self {
            Self::Canonical(key) => key.clone(),
            Self::Legacy(id) => id.to_string(),
        }
    }
}

impl std::fmt::Display for ConversationSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Canonical(key) => write!(f, "{key}"),
            Self::Legacy(id) => write!(f, "#{id}"),
        }
    }
}

impl From<&str> for ConversationSelector {
    fn from(key: &str) -> Self {
        Self::Canonical(key.to_string())
    }
}

impl From<String> for ConversationSelector {
    fn from(key: String) -> Self {
        Self::Canonical(key)
    }
}

impl From<i64> for ConversationSelector {
    fn from(id: i64) -> Self {
        Self::Legacy(id)
    }
}

/// Find the conversation a selector refers to
#[must_use]
pub fn resolve<'a>(
    conversations: &'a [Conversation],
    selector: &ConversationSelector,
) -> Option<&'a Conversation> {
    conversations.iter().find(|c| selector.matches(c))
}

/// Index of the conversation a selector refers to
#[must_use]
pub fn position(conversations: &[Conversation], selector: &ConversationSelector) -> Option<usize> {
    conversations.iter().position(|c| selector.matches(c))
}

//! Conversations and their storage mode.

use crate::identifier::{now_utc, ConversationId, MessageId};
use crate::messages::{Message, Role};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Title used when a conversation has no user message yet.
pub const DEFAULT_TITLE: &str = "New Chat";

const TITLE_MAX_CHARS: usize = 60;

/// Where a conversation is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    /// Ephemeral, device-local blob.
    #[default]
    Local,
    /// Account-bound remote tables.
    Remote,
}

impl std::str::FromStr for StorageMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" | "supabase" => Ok(Self::Remote),
            other => Err(format!("unknown storage mode: {other}")),
        }
    }
}

/// Derive a conversation title from user input.
///
/// Takes the first 60 characters of the trimmed text, or [`DEFAULT_TITLE`]
/// when nothing is left.
#[must_use]
pub fn derive_title(text: &str) -> String {
    let title: String = text.trim().chars().take(TITLE_MAX_CHARS).collect();
    if title.is_empty() {
        DEFAULT_TITLE.to_string()
    } else {
        title
    }
}

/// A conversation with its full message list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Messages ordered by position.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Backend holding this conversation.
    #[serde(default)]
    pub storage_mode: StorageMode,
}

impl Conversation {
    /// Create an empty conversation.
    pub fn new(title: impl Into<String>, storage_mode: StorageMode) -> Self {
        let now = now_utc();
        Self {
            id: ConversationId::new(),
            title: title.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            storage_mode,
        }
    }

    /// Set the identifier.
    #[must_use]
    pub fn with_id(mut self, id: ConversationId) -> Self {
        self.id = id;
        self
    }

    /// Identifier the next appended message should use.
    #[must_use]
    pub fn next_message_id(&self) -> MessageId {
        self.messages
            .iter()
            .map(|m| m.id)
            .max()
            .map_or(MessageId(1), MessageId::next)
    }

    /// Position the next appended message should use.
    #[must_use]
    pub fn next_position(&self) -> u64 {
        self.messages.len() as u64
    }

    /// Append a message, bumping `updated_at` and filling a blank title
    /// from the first user message.
    pub fn push(&mut self, message: Message) {
        if self.title.trim().is_empty() && message.role == Role::User {
            self.title = derive_title(&message.content);
        }
        self.messages.push(message);
        self.updated_at = now_utc();
    }

    /// Whether the title or the first message contains `query`
    /// (case-insensitive). An empty query matches everything.
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self
                .messages
                .first()
                .is_some_and(|m| m.content.to_lowercase().contains(&query))
    }

    /// Summary without messages.
    #[must_use]
    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            preview: self.messages.first().map(|m| m.content.clone()),
        }
    }
}

/// Conversation listing entry, as returned by `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Identifier.
    pub id: ConversationId,
    /// Display title.
    pub title: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Content of the first message, when the backend has it at hand.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

impl ConversationSummary {
    /// Whether the title or preview contains `query` (case-insensitive).
    #[must_use]
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&query)
            || self
                .preview
                .as_deref()
                .is_some_and(|p| p.to_lowercase().contains(&query))
    }
}

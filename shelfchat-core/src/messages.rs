//! Conversation messages and the outbound request payload.

use crate::identifier::MessageId;
use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// End user.
    User,
    /// Model output.
    Assistant,
    /// Grounding or instruction text.
    System,
}

impl Role {
    /// Wire name of the role.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message stored in a conversation.
///
/// Content of an assistant message changes while it is being typed out and
/// is immutable once its exchange completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identifier, increasing within the conversation.
    pub id: MessageId,
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
    /// Zero-based position in the conversation.
    #[serde(default)]
    pub position: u64,
}

impl Message {
    /// Create a message.
    pub fn new(
        id: impl Into<MessageId>,
        role: Role,
        content: impl Into<String>,
        position: u64,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            content: content.into(),
            position,
        }
    }

    /// Create a user message.
    pub fn user(id: impl Into<MessageId>, content: impl Into<String>, position: u64) -> Self {
        Self::new(id, Role::User, content, position)
    }

    /// Create an assistant message.
    pub fn assistant(id: impl Into<MessageId>, content: impl Into<String>, position: u64) -> Self {
        Self::new(id, Role::Assistant, content, position)
    }

    /// Whether the content is empty or whitespace only.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.content.trim().is_empty()
    }
}

/// A `{role, content}` entry of the outbound request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author.
    pub role: Role,
    /// Text content.
    pub content: String,
}

impl ChatMessage {
    /// Create a wire message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Outbound request body: `{"messages": [{role, content}, ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    /// Messages in order; a grounding system message, when present, is first.
    pub messages: Vec<ChatMessage>,
}

impl ChatPayload {
    /// Create an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a payload from conversation history.
    ///
    /// Blank assistant messages are left out, `window` keeps only the last
    /// `n` history entries, and `system` is always placed first.
    #[must_use]
    pub fn from_history(system: Option<String>, history: &[Message], window: Option<usize>) -> Self {
        let kept: Vec<&Message> = history
            .iter()
            .filter(|m| m.role != Role::Assistant || !m.is_blank())
            .collect();
        let skip = window.map_or(0, |n| kept.len().saturating_sub(n));

        let mut messages = Vec::with_capacity(kept.len() - skip + 1);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.extend(kept.into_iter().skip(skip).map(ChatMessage::from));

        Self { messages }
    }

    /// Render the payload as a single plain-text prompt, one `role: content`
    /// line per message.
    #[must_use]
    pub fn to_prompt(&self) -> String {
        self.messages
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Content of the last user message, if any.
    #[must_use]
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn history() -> Vec<Message> {
        vec![
            Message::user(MessageId(1), "hi", 0),
            Message::assistant(MessageId(2), "  ", 1),
            Message::assistant(MessageId(3), "hello", 2),
            Message::user(MessageId(4), "books?", 3),
        ]
    }

    #[test]
    fn test_role_serialization() {
        assert_eq!(serde_json::to_string(&Role::Assistant).unwrap(), "\"assistant\"");
        let role: Role = serde_json::from_str("\"system\"").unwrap();
        assert_eq!(role, Role::System);
    }

    #[test]
    fn test_payload_places_system_first_and_drops_blank_assistant() {
        let payload = ChatPayload::from_history(Some("ctx".into()), &history(), None);
        let roles: Vec<Role> = payload.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(payload.messages[0].content, "ctx");
    }

    #[test]
    fn test_payload_window_keeps_latest() {
        let payload = ChatPayload::from_history(None, &history(), Some(2));
        assert_eq!(
            payload.messages,
            vec![
                ChatMessage::new(Role::Assistant, "hello"),
                ChatMessage::new(Role::User, "books?"),
            ]
        );
    }

    #[test]
    fn test_payload_wire_shape() {
        let payload = ChatPayload::from_history(None, &[Message::user(MessageId(1), "hi", 0)], None);
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}]})
        );
    }

    #[test]
    fn test_prompt_rendering() {
        let payload = ChatPayload::from_history(Some("ctx".into()), &history(), None);
        assert_eq!(
            payload.to_prompt(),
            "system: ctx\nuser: hi\nassistant: hello\nuser: books?"
        );
        assert_eq!(payload.last_user_content(), Some("books?"));
    }
}

// ABOUTME: Chat message record and the ordered, upsert-capable message log
// The log is the single source of truth rendered by the UI and persisted after every mutation

use crate::i18n::Language;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Origin of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Agent,
    Status,
    Error,
}

/// Whether a message is final content (say) or intermediate reasoning (think)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    #[default]
    Say,
    Think,
}

impl MessageKind {
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "say" => Some(MessageKind::Say),
            "think" => Some(MessageKind::Think),
            _ => None,
        }
    }
}

/// A single chat message as displayed in the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: MessageRole,
    #[serde(rename = "type", default)]
    pub kind: MessageKind,
    #[serde(default)]
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl ChatMessage {
    pub fn new(role: MessageRole, kind: MessageKind, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            kind,
            text: text.into(),
            language: None,
        }
    }

    pub fn user(text: impl Into<String>, language: Language) -> Self {
        Self {
            language: Some(language),
            ..Self::new(MessageRole::User, MessageKind::Say, text)
        }
    }

    pub fn status(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Status, MessageKind::Say, text)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Error, MessageKind::Say, text)
    }
}

/// Outcome of an upsert, mostly useful for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Updated(usize),
    Appended(usize),
}

/// Ordered message log. Insertion order is preserved and entries are only
/// ever removed all at once through `clear`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageLog {
    messages: Vec<ChatMessage>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == id)
    }

    pub fn append(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// Replace the text of the agent message with the given id in place, or
    /// append a new agent message if the id is unseen. The text always
    /// overwrites, it is never concatenated.
    pub fn upsert_agent(&mut self, id: &str, text: String, kind: MessageKind) -> Upsert {
        if let Some(index) = self.position(id) {
            self.messages[index].text = text;
            return Upsert::Updated(index);
        }

        self.messages.push(ChatMessage {
            id: id.to_string(),
            role: MessageRole::Agent,
            kind,
            text,
            language: None,
        });
        Upsert::Appended(self.messages.len() - 1)
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

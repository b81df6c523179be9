use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Who wrote a message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    User,
    Ai,
}

/// A single stored chat message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender: Sender,
    /// Raw content as written by the user or returned by the model.
    pub content: String,
    /// Unix timestamp in milliseconds.
    pub timestamp: u64,
}

impl Message {
    /// Create a message stamped with the current time and a fresh id.
    pub fn new(chat_id: impl Into<String>, sender: Sender, content: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            chat_id: chat_id.into(),
            sender,
            content: content.into(),
            timestamp: now_millis(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender == Sender::User
    }
}

/// Conversation metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub name: String,
    pub created_at: u64,
    /// Bumped on every message write or edit.
    pub last_modified: u64,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_id: Option<String>,
}

impl Conversation {
    pub fn new(name: impl Into<String>, system_prompt: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: new_id(),
            name: name.into(),
            created_at: now,
            last_modified: now,
            system_prompt: system_prompt.into(),
            character_id: None,
        }
    }
}

/// Generate a new random identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sender_serialization() {
        assert_eq!(serde_json::to_string(&Sender::Ai).unwrap(), "\"ai\"");
        let sender: Sender = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(sender, Sender::User);
    }

    #[test]
    fn new_messages_get_distinct_ids() {
        let a = Message::new("chat", Sender::User, "hi");
        let b = Message::new("chat", Sender::User, "hi");
        assert_ne!(a.id, b.id);
        assert!(a.is_user());
    }

    #[test]
    fn conversation_without_character_omits_field() {
        let conv = Conversation::new("Chat", "");
        let json = serde_json::to_string(&conv).unwrap();
        assert!(!json.contains("character_id"));
        assert_eq!(conv.created_at, conv.last_modified);
    }
}

//! Parameter and result payloads for the daemon's RPC methods.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chat::Message;
use crate::error::ProtocolError;

/// Decode the `params` member of a request into `T`.
pub fn parse_params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, ProtocolError> {
    let params = params.ok_or(ProtocolError::MissingParams)?;
    Ok(serde_json::from_value(params)?)
}

/// `chat/send`: submit a user turn. A missing `chat_id` starts a new chat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<String>,
    pub text: String,
}

/// Side effects requested by trigger words found in a reply.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerHits {
    /// Last matching background image URL, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
    /// Avatar actions to play, in configuration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<String>,
}

impl TriggerHits {
    pub fn is_empty(&self) -> bool {
        self.background.is_none() && self.actions.is_empty()
    }
}

/// Result of `chat/send` and `chat/regenerate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResponse {
    pub chat_id: String,
    /// The stored AI message.
    pub message: Message,
    #[serde(default)]
    pub triggers: TriggerHits,
    pub latency_ms: u64,
}

/// `chat/history`: list a chat's messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub chat_id: String,
    /// Apply output filters to AI messages.
    #[serde(default)]
    pub display: bool,
}

/// `conversation/create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateConversationRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// `conversation/delete`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub chat_id: String,
}

/// `conversation/rename`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameRequest {
    pub chat_id: String,
    pub name: String,
}

/// `conversation/system-prompt`: replace one chat's system prompt.
/// An empty prompt falls back to the settings prompt on the next turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemPromptRequest {
    pub chat_id: String,
    pub system_prompt: String,
}

/// `conversation/prune`: delete the `count` least recently modified chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneRequest {
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneResponse {
    pub deleted: Vec<String>,
}

/// `message/delete` and `chat/regenerate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRequest {
    pub message_id: String,
}

/// `message/edit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditMessageRequest {
    pub message_id: String,
    pub content: String,
}

/// `fallback/move`: swap with the neighbour in `direction` (-1 up, +1 down).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackMoveRequest {
    pub index: usize,
    pub direction: i32,
}

/// `fallback/remove`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackRemoveRequest {
    pub index: usize,
}

use async_trait::async_trait;
use parley_context::{HistoryError, MessageSource};
use parley_protocol::{now_millis, Conversation, Message, Node, Settings};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

const STATE_FILE: &str = "state.json";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt state file: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("No fallback node at index {0}")]
    FallbackIndex(usize),

    #[error("Cannot move fallback node {index} by {direction}")]
    FallbackMove { index: usize, direction: i32 },
}

/// Everything persisted to `state.json`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct State {
    #[serde(default)]
    conversations: Vec<Conversation>,
    /// Insertion order; ties in timestamp keep this order.
    #[serde(default)]
    messages: Vec<Message>,
    #[serde(default)]
    settings: Option<Settings>,
}

impl State {
    fn conversation_mut(&mut self, chat_id: &str) -> Result<&mut Conversation, StoreError> {
        self.conversations
            .iter_mut()
            .find(|c| c.id == chat_id)
            .ok_or_else(|| StoreError::ConversationNotFound(chat_id.to_string()))
    }

    fn touch(&mut self, chat_id: &str) {
        if let Ok(conversation) = self.conversation_mut(chat_id) {
            conversation.last_modified = now_millis().max(conversation.last_modified);
        }
    }

    fn settings_mut(&mut self) -> &mut Settings {
        self.settings.get_or_insert_with(Settings::default)
    }
}

/// Conversations, messages and settings, flushed to a JSON file on every
/// mutation.
pub struct Store {
    path: PathBuf,
    state: Mutex<State>,
}

impl Store {
    /// Open (or create) the store in `data_dir`. `seed` becomes the settings
    /// when none have been persisted yet.
    pub fn open(data_dir: &Path, seed: Settings) -> Result<Self, StoreError> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join(STATE_FILE);

        let mut state = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            serde_json::from_str::<State>(&content)?
        } else {
            State::default()
        };
        if state.settings.is_none() {
            state.settings = Some(seed);
        }

        info!(
            path = %path.display(),
            conversations = state.conversations.len(),
            messages = state.messages.len(),
            "Store opened"
        );

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Write `state` to a sibling temp file, then rename it over the state
    /// file. Callers hold the state lock so writes land in mutation order.
    async fn flush(&self, state: &State) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        debug!(path = %self.path.display(), "State flushed");
        Ok(())
    }

    // Conversations

    pub async fn insert_conversation(&self, conversation: Conversation) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.conversations.push(conversation);
        self.flush(&state).await
    }

    /// Conversations, most recently modified first.
    pub async fn list_conversations(&self) -> Vec<Conversation> {
        let state = self.state.lock().await;
        let mut conversations = state.conversations.clone();
        conversations.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        conversations
    }

    pub async fn conversation(&self, chat_id: &str) -> Result<Conversation, StoreError> {
        let state = self.state.lock().await;
        state
            .conversations
            .iter()
            .find(|c| c.id == chat_id)
            .cloned()
            .ok_or_else(|| StoreError::ConversationNotFound(chat_id.to_string()))
    }

    pub async fn rename_conversation(&self, chat_id: &str, name: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.conversation_mut(chat_id)?.name = name.to_string();
        self.flush(&state).await
    }

    /// Replace a chat's system prompt. Counts as a modification.
    pub async fn set_system_prompt(
        &self,
        chat_id: &str,
        system_prompt: &str,
    ) -> Result<Conversation, StoreError> {
        let mut state = self.state.lock().await;
        state.conversation_mut(chat_id)?.system_prompt = system_prompt.to_string();
        state.touch(chat_id);
        let updated = state.conversation_mut(chat_id)?.clone();
        self.flush(&state).await?;
        Ok(updated)
    }

    /// Remove a conversation and all of its messages.
    pub async fn delete_conversation(&self, chat_id: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let before = state.conversations.len();
        state.conversations.retain(|c| c.id != chat_id);
        if state.conversations.len() == before {
            return Err(StoreError::ConversationNotFound(chat_id.to_string()));
        }
        state.messages.retain(|m| m.chat_id != chat_id);
        self.flush(&state).await
    }

    /// Delete the `count` least recently modified conversations.
    pub async fn prune_oldest(&self, count: usize) -> Result<Vec<String>, StoreError> {
        let mut state = self.state.lock().await;
        let mut by_age: Vec<_> = state
            .conversations
            .iter()
            .map(|c| (c.last_modified, c.id.clone()))
            .collect();
        by_age.sort_by_key(|(modified, _)| *modified);

        let doomed: Vec<String> = by_age.into_iter().take(count).map(|(_, id)| id).collect();
        if doomed.is_empty() {
            return Ok(doomed);
        }

        state.conversations.retain(|c| !doomed.contains(&c.id));
        state.messages.retain(|m| !doomed.contains(&m.chat_id));
        self.flush(&state).await?;
        info!(deleted = doomed.len(), "Pruned oldest conversations");
        Ok(doomed)
    }

    // Messages

    /// Append a message to an existing conversation.
    pub async fn save_message(&self, message: Message) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.conversation_mut(&message.chat_id)?;
        let chat_id = message.chat_id.clone();
        state.messages.push(message);
        state.touch(&chat_id);
        self.flush(&state).await
    }

    pub async fn message(&self, message_id: &str) -> Result<Message, StoreError> {
        let state = self.state.lock().await;
        state
            .messages
            .iter()
            .find(|m| m.id == message_id)
            .cloned()
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))
    }

    /// Messages of a chat, oldest first.
    pub async fn chat_messages(&self, chat_id: &str) -> Vec<Message> {
        let state = self.state.lock().await;
        let mut messages: Vec<Message> = state
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp);
        messages
    }

    pub async fn edit_message(&self, message_id: &str, content: &str) -> Result<Message, StoreError> {
        let mut state = self.state.lock().await;
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        message.content = content.to_string();
        let edited = message.clone();
        state.touch(&edited.chat_id);
        self.flush(&state).await?;
        Ok(edited)
    }

    pub async fn delete_message(&self, message_id: &str) -> Result<Message, StoreError> {
        let mut state = self.state.lock().await;
        let index = state
            .messages
            .iter()
            .position(|m| m.id == message_id)
            .ok_or_else(|| StoreError::MessageNotFound(message_id.to_string()))?;
        let removed = state.messages.remove(index);
        self.flush(&state).await?;
        Ok(removed)
    }

    // Settings

    /// A snapshot of the current settings.
    pub async fn settings(&self) -> Settings {
        let state = self.state.lock().await;
        state.settings.clone().unwrap_or_default()
    }

    pub async fn replace_settings(&self, settings: Settings) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.settings = Some(settings);
        self.flush(&state).await
    }

    pub async fn set_background(&self, url: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.settings_mut().background_image = url.to_string();
        self.flush(&state).await
    }

    pub async fn add_fallback(&self, node: Node) -> Result<usize, StoreError> {
        let mut state = self.state.lock().await;
        let chain = &mut state.settings_mut().fallback_chain;
        chain.push(node);
        let len = chain.len();
        self.flush(&state).await?;
        Ok(len)
    }

    pub async fn move_fallback(&self, index: usize, direction: i32) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if !state.settings_mut().move_fallback(index, direction) {
            return Err(StoreError::FallbackMove { index, direction });
        }
        self.flush(&state).await
    }

    pub async fn remove_fallback(&self, index: usize) -> Result<Node, StoreError> {
        let mut state = self.state.lock().await;
        let chain = &mut state.settings_mut().fallback_chain;
        if index >= chain.len() {
            return Err(StoreError::FallbackIndex(index));
        }
        let removed = chain.remove(index);
        self.flush(&state).await?;
        Ok(removed)
    }

    pub async fn conversation_count(&self) -> usize {
        self.state.lock().await.conversations.len()
    }
}

#[async_trait]
impl MessageSource for Store {
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, HistoryError> {
        Ok(self.chat_messages(chat_id).await)
    }
}

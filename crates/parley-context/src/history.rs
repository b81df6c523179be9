use async_trait::async_trait;
use parley_protocol::{Message, Settings};
use thiserror::Error;
use tracing::debug;

use crate::template::apply_input_template;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("Failed to read messages for chat {chat_id}: {reason}")]
    Unavailable { chat_id: String, reason: String },
}

/// Read access to stored messages.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// All messages of a chat, ordered by timestamp ascending, content
    /// already materialized.
    async fn messages(&self, chat_id: &str) -> Result<Vec<Message>, HistoryError>;
}

/// Select the context window from a chat's full, ascending history.
///
/// Returns the last `window` messages, with the chat's first message
/// prepended when it fell outside that slice.
pub fn assemble_window(messages: &[Message], window: usize) -> Vec<Message> {
    let Some(first) = messages.first() else {
        return Vec::new();
    };

    let start = messages.len().saturating_sub(window.max(1));
    let recent = &messages[start..];

    if recent[0].id == first.id {
        return recent.to_vec();
    }

    let mut history = Vec::with_capacity(recent.len() + 1);
    history.push(first.clone());
    history.extend_from_slice(recent);
    history
}

/// Builds the history sent with each request.
pub struct HistoryAssembler<'a> {
    source: &'a dyn MessageSource,
}

impl<'a> HistoryAssembler<'a> {
    pub fn new(source: &'a dyn MessageSource) -> Self {
        Self { source }
    }

    /// Fetch, window, and template a chat's messages.
    ///
    /// User turns are rewritten through the input template on the returned
    /// copies only; storage is untouched.
    pub async fn assemble(
        &self,
        chat_id: &str,
        settings: &Settings,
    ) -> Result<Vec<Message>, HistoryError> {
        let messages = self.source.messages(chat_id).await?;
        let window = settings.window_size();
        let mut history = assemble_window(&messages, window);

        for message in history.iter_mut().filter(|m| m.is_user()) {
            message.content = apply_input_template(&settings.input_template, &message.content);
        }

        debug!(
            chat_id,
            stored = messages.len(),
            window,
            sent = history.len(),
            "Assembled history"
        );
        Ok(history)
    }
}

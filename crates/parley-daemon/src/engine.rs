use parley_context::{
    apply_input_template, apply_output_rules, render_system_prompt, scan_triggers, HistoryAssembler,
    HistoryError,
};
use parley_protocol::{Conversation, Message, Sender, SendResponse, Settings};
use parley_providers::{
    build_plan, ChatRequest, Completion, HttpExecutor, LocalEndpoint, ProviderError, Sequencer,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::store::{Store, StoreError};

const DEFAULT_CHAT_NAME: &str = "New Chat";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    History(#[from] HistoryError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Message text is empty")]
    EmptyInput,

    #[error("Message {0} cannot be regenerated: it must be an AI reply to a user message")]
    NotRegenerable(String),
}

/// Runs chat turns: persists messages and drives the provider sequence.
pub struct ChatEngine {
    store: Arc<Store>,
    executor: HttpExecutor,
}

impl ChatEngine {
    pub fn new(store: Arc<Store>, executor: HttpExecutor) -> Self {
        Self { store, executor }
    }

    /// Start a conversation with its greeting already stored.
    pub async fn create_conversation(&self, name: Option<String>) -> Result<Conversation, EngineError> {
        let settings = self.store.settings().await;
        let name = name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_CHAT_NAME.to_string());
        let conversation = Conversation::new(name, settings.system_prompt.clone());
        self.store.insert_conversation(conversation.clone()).await?;

        let greeting = Message::new(&conversation.id, Sender::Ai, settings.greeting());
        self.store.save_message(greeting).await?;

        info!(chat_id = %conversation.id, "Conversation created");
        Ok(conversation)
    }

    /// Store a user turn and answer it.
    pub async fn send(&self, chat_id: Option<&str>, text: &str) -> Result<SendResponse, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::EmptyInput);
        }

        let conversation = match chat_id {
            Some(id) => self.store.conversation(id).await?,
            None => self.create_conversation(None).await?,
        };

        self.store
            .save_message(Message::new(&conversation.id, Sender::User, text))
            .await?;

        self.reply(&conversation, text).await
    }

    /// Replace an AI reply with a fresh answer to the user turn before it.
    pub async fn regenerate(&self, message_id: &str) -> Result<SendResponse, EngineError> {
        let target = self.store.message(message_id).await?;
        if target.sender != Sender::Ai {
            return Err(EngineError::NotRegenerable(message_id.to_string()));
        }

        let messages = self.store.chat_messages(&target.chat_id).await;
        let prompt = messages
            .iter()
            .position(|m| m.id == target.id)
            .and_then(|i| i.checked_sub(1))
            .map(|i| &messages[i])
            .filter(|m| m.is_user())
            .cloned()
            .ok_or_else(|| EngineError::NotRegenerable(message_id.to_string()))?;

        let conversation = self.store.conversation(&target.chat_id).await?;
        self.store.delete_message(&target.id).await?;
        debug!(chat_id = %conversation.id, message_id, "Regenerating reply");

        self.reply(&conversation, &prompt.content).await
    }

    /// A chat's messages, oldest first. With `display`, AI replies pass
    /// through the output rules.
    pub async fn history(&self, chat_id: &str, display: bool) -> Result<Vec<Message>, EngineError> {
        self.store.conversation(chat_id).await?;
        let mut messages = self.store.chat_messages(chat_id).await;
        if display {
            let settings = self.store.settings().await;
            for message in messages.iter_mut().filter(|m| !m.is_user()) {
                message.content = apply_output_rules(&settings.output_rules, &message.content);
            }
        }
        Ok(messages)
    }

    async fn reply(&self, conversation: &Conversation, text: &str) -> Result<SendResponse, EngineError> {
        let start = Instant::now();
        let settings = self.store.settings().await;

        let completion = match self.complete(conversation, text, &settings).await {
            Ok(completion) => completion,
            Err(e) => {
                warn!(chat_id = %conversation.id, error = %e, "Turn failed");
                return Err(e);
            }
        };

        let message = Message::new(&conversation.id, Sender::Ai, completion.text);
        self.store.save_message(message.clone()).await?;

        let triggers = scan_triggers(&settings, &message.content);
        if let Some(url) = &triggers.background {
            self.store.set_background(url).await?;
        }

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(
            chat_id = %conversation.id,
            node = %completion.node_name,
            attempts = completion.attempts,
            latency_ms,
            "Reply stored"
        );

        Ok(SendResponse {
            chat_id: conversation.id.clone(),
            message,
            triggers,
            latency_ms,
        })
    }

    async fn complete(
        &self,
        conversation: &Conversation,
        text: &str,
        settings: &Settings,
    ) -> Result<Completion, EngineError> {
        let history = HistoryAssembler::new(self.store.as_ref())
            .assemble(&conversation.id, settings)
            .await?;

        let prompt = if conversation.system_prompt.trim().is_empty() {
            &settings.system_prompt
        } else {
            &conversation.system_prompt
        };

        let request = ChatRequest {
            system_prompt: render_system_prompt(prompt, settings),
            history,
            input: apply_input_template(&settings.input_template, text),
            default_max_tokens: settings.max_tokens,
        };

        let plan = build_plan(settings);
        let executor = self.executor.clone().with_local(LocalEndpoint::from(settings));
        let completion = Sequencer::new(&executor).run(&plan, &request).await?;
        Ok(completion)
    }
}

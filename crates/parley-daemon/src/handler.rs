use parley_protocol::*;
use parley_providers::{HttpExecutor, TracingNotifier};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::Config;
use crate::engine::{ChatEngine, EngineError};
use crate::store::{Store, StoreError};

/// Why a request could not be served.
#[derive(Debug, Error)]
enum HandlerError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to encode result: {0}")]
    Encode(#[from] serde_json::Error),
}

impl HandlerError {
    fn code(&self) -> i32 {
        match self {
            HandlerError::Protocol(e) => e.code(),
            HandlerError::Engine(_) | HandlerError::Store(_) => SERVER_ERROR,
            HandlerError::Encode(_) => INTERNAL_ERROR,
        }
    }
}

type HandlerResult = Result<Value, HandlerError>;

fn to_value<T: Serialize>(value: &T) -> HandlerResult {
    Ok(serde_json::to_value(value)?)
}

/// Handles incoming JSON-RPC requests.
pub struct RequestHandler {
    config: Arc<Config>,
    store: Arc<Store>,
    engine: ChatEngine,
}

impl RequestHandler {
    pub fn new(config: Arc<Config>, store: Arc<Store>) -> Self {
        let executor = HttpExecutor::default().with_notifier(Arc::new(TracingNotifier));
        let engine = ChatEngine::new(store.clone(), executor);
        Self {
            config,
            store,
            engine,
        }
    }

    /// Process a JSON-RPC request and return a response.
    pub async fn handle(&self, request: JsonRpcRequest) -> JsonRpcResponse {
        debug!(method = %request.method, "Handling request");

        let JsonRpcRequest {
            method, params, id, ..
        } = request;

        let result = match method.as_str() {
            methods::STATUS => self.handle_status().await,
            methods::SHUTDOWN => self.handle_shutdown(),
            methods::CHAT_SEND => self.handle_send(params).await,
            methods::CHAT_REGENERATE => self.handle_regenerate(params).await,
            methods::CHAT_HISTORY => self.handle_history(params).await,
            methods::CONVERSATION_CREATE => self.handle_create(params).await,
            methods::CONVERSATION_LIST => to_value(&self.store.list_conversations().await),
            methods::CONVERSATION_RENAME => self.handle_rename(params).await,
            methods::CONVERSATION_DELETE => self.handle_delete(params).await,
            methods::CONVERSATION_PRUNE => self.handle_prune(params).await,
            methods::CONVERSATION_SYSTEM_PROMPT => self.handle_system_prompt(params).await,
            methods::MESSAGE_EDIT => self.handle_edit_message(params).await,
            methods::MESSAGE_DELETE => self.handle_delete_message(params).await,
            methods::SETTINGS_GET => to_value(&self.store.settings().await),
            methods::SETTINGS_UPDATE => self.handle_settings_update(params).await,
            methods::FALLBACK_ADD => self.handle_fallback_add(params).await,
            methods::FALLBACK_MOVE => self.handle_fallback_move(params).await,
            methods::FALLBACK_REMOVE => self.handle_fallback_remove(params).await,
            other => Err(ProtocolError::UnknownMethod(other.to_string()).into()),
        };

        match result {
            Ok(value) => JsonRpcResponse::success(value, id),
            Err(e) => JsonRpcResponse::error(e.code(), e.to_string(), id),
        }
    }

    async fn handle_status(&self) -> HandlerResult {
        let settings = self.store.settings().await;
        Ok(json!({
            "status": "running",
            "socket": self.config.daemon.socket_path,
            "conversations": self.store.conversation_count().await,
            "provider": settings.api_provider,
            "fallbacks": settings.fallback_chain.len(),
        }))
    }

    fn handle_shutdown(&self) -> HandlerResult {
        info!("Shutdown requested");
        Ok(Value::String("shutting down".to_string()))
    }

    async fn handle_send(&self, params: Option<Value>) -> HandlerResult {
        let req: SendRequest = parse_params(params)?;
        let response = self.engine.send(req.chat_id.as_deref(), &req.text).await?;
        to_value(&response)
    }

    async fn handle_regenerate(&self, params: Option<Value>) -> HandlerResult {
        let req: MessageRequest = parse_params(params)?;
        to_value(&self.engine.regenerate(&req.message_id).await?)
    }

    async fn handle_history(&self, params: Option<Value>) -> HandlerResult {
        let req: HistoryRequest = parse_params(params)?;
        to_value(&self.engine.history(&req.chat_id, req.display).await?)
    }

    async fn handle_create(&self, params: Option<Value>) -> HandlerResult {
        // Params are optional here; a bare call creates an unnamed chat.
        let req: CreateConversationRequest = match params {
            Some(params) => parse_params(Some(params))?,
            None => CreateConversationRequest::default(),
        };
        to_value(&self.engine.create_conversation(req.name).await?)
    }

    async fn handle_rename(&self, params: Option<Value>) -> HandlerResult {
        let req: RenameRequest = parse_params(params)?;
        self.store.rename_conversation(&req.chat_id, &req.name).await?;
        to_value(&self.store.conversation(&req.chat_id).await?)
    }

    async fn handle_delete(&self, params: Option<Value>) -> HandlerResult {
        let req: ConversationRequest = parse_params(params)?;
        self.store.delete_conversation(&req.chat_id).await?;
        Ok(json!({ "deleted": req.chat_id }))
    }

    async fn handle_prune(&self, params: Option<Value>) -> HandlerResult {
        let req: PruneRequest = parse_params(params)?;
        let deleted = self.store.prune_oldest(req.count).await?;
        to_value(&PruneResponse { deleted })
    }

    async fn handle_system_prompt(&self, params: Option<Value>) -> HandlerResult {
        let req: SystemPromptRequest = parse_params(params)?;
        let conversation = self
            .store
            .set_system_prompt(&req.chat_id, &req.system_prompt)
            .await?;
        info!(chat_id = %conversation.id, "System prompt updated");
        to_value(&conversation)
    }

    async fn handle_edit_message(&self, params: Option<Value>) -> HandlerResult {
        let req: EditMessageRequest = parse_params(params)?;
        to_value(&self.store.edit_message(&req.message_id, &req.content).await?)
    }

    async fn handle_delete_message(&self, params: Option<Value>) -> HandlerResult {
        let req: MessageRequest = parse_params(params)?;
        to_value(&self.store.delete_message(&req.message_id).await?)
    }

    async fn handle_settings_update(&self, params: Option<Value>) -> HandlerResult {
        let settings: Settings = parse_params(params)?;
        self.store.replace_settings(settings).await?;
        info!("Settings replaced");
        to_value(&self.store.settings().await)
    }

    async fn handle_fallback_add(&self, params: Option<Value>) -> HandlerResult {
        let node: Node = parse_params(params)?;
        info!(node = %node.name, provider = %node.provider_type, "Fallback node added");
        self.store.add_fallback(node).await?;
        to_value(&self.store.settings().await.fallback_chain)
    }

    async fn handle_fallback_move(&self, params: Option<Value>) -> HandlerResult {
        let req: FallbackMoveRequest = parse_params(params)?;
        self.store.move_fallback(req.index, req.direction).await?;
        to_value(&self.store.settings().await.fallback_chain)
    }

    async fn handle_fallback_remove(&self, params: Option<Value>) -> HandlerResult {
        let req: FallbackRemoveRequest = parse_params(params)?;
        self.store.remove_fallback(req.index).await?;
        to_value(&self.store.settings().await.fallback_chain)
    }
}

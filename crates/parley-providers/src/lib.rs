//! Parley Providers: LLM provider adapters with ordered fallback execution.

mod classify;
mod cohere;
mod executor;
mod google;
mod ollama;
mod openai;
mod plan;
mod sequencer;

pub use classify::should_advance;
pub use cohere::CohereProvider;
pub use executor::{HttpExecutor, LocalEndpoint, NodeExecutor};
pub use google::GoogleProvider;
pub use ollama::OllamaProvider;
pub use openai::OpenAiProvider;
pub use plan::{build_plan, primary_node, PRIMARY_NODE_NAME, PRIMARY_TIMEOUT_MS, PRIMARY_TRIGGER_CODES};
pub use sequencer::{Completion, Sequencer};

use parley_protocol::{Message, Node, Sender};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// The node's deadline elapsed before a response arrived.
    #[error("Request timed out")]
    Timeout,

    /// The provider answered with a status the node lists as a retry trigger.
    #[error("Triggered status {status}")]
    TriggeredStatus { status: u16 },

    /// No response was received (connection refused, DNS, reset).
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("All API nodes failed. Please check configurations.")]
    AllNodesFailed,
}

impl ProviderError {
    /// Map a transport-level reqwest failure onto the error taxonomy.
    ///
    /// The request URL is stripped so endpoint credentials never reach a log line.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() || err.is_request() {
            ProviderError::Network(err.without_url().to_string())
        } else {
            ProviderError::Http(err.without_url())
        }
    }
}

/// Everything a provider needs to answer one turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatRequest {
    /// System prompt with placeholders already expanded.
    pub system_prompt: String,
    /// Context window, user turns already templated. Ends with the current
    /// user turn when it has been stored.
    pub history: Vec<Message>,
    /// The current user input, templated.
    pub input: String,
    /// Used when a node does not set `max_tokens`.
    pub default_max_tokens: u32,
}

/// A fully shaped outbound call.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub url: String,
    pub bearer: Option<String>,
    /// Extra headers such as provider API keys.
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

/// Translates between the generic request and one provider's wire format.
pub trait Provider: Send + Sync {
    /// Provider name (e.g., "openai", "google").
    fn name(&self) -> &str;

    /// Build the HTTP request for `node`. Must be deterministic.
    fn prepare(&self, node: &Node, request: &ChatRequest) -> Result<PreparedRequest, ProviderError>;

    /// Extract the reply text from a successful response body.
    fn parse(&self, body: Value) -> Result<String, ProviderError>;
}

/// Fire-and-forget sink for user-facing failure notices.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Logs notices at `warn`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::warn!(notice = %message, "Provider notice");
    }
}

/// A `{role, content}` chat message as used by OpenAI-style APIs.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct RoleMessage {
    pub role: &'static str,
    pub content: String,
}

impl RoleMessage {
    pub(crate) fn system(content: &str) -> Self {
        Self {
            role: "system",
            content: content.to_string(),
        }
    }

    pub(crate) fn from_history(message: &Message) -> Self {
        let role = match message.sender {
            Sender::User => "user",
            Sender::Ai => "assistant",
        };
        Self {
            role,
            content: message.content.clone(),
        }
    }
}

/// Join a base URL and a path segment without doubling slashes.
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://a/v1/", "/chat"), "http://a/v1/chat");
        assert_eq!(join_url("http://a/v1", "chat"), "http://a/v1/chat");
    }

    #[test]
    fn history_roles_map_to_openai_roles() {
        let user = test_support::message("1", Sender::User, "hi");
        let ai = test_support::message("2", Sender::Ai, "hello");
        assert_eq!(RoleMessage::from_history(&user).role, "user");
        assert_eq!(RoleMessage::from_history(&ai).role, "assistant");
    }
}

use parley_protocol::{Node, Sender};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{join_url, ChatRequest, PreparedRequest, Provider, ProviderError, RoleMessage};

const DEFAULT_MODEL: &str = "llama3";
const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Local Ollama `/api/chat`, used when a node has no credentials.
///
/// The node's own endpoint and model are ignored; only its sampling
/// parameters and deadline still apply.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    messages: Vec<RoleMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaResponse {
    message: Option<OllamaMessage>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

impl OllamaProvider {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        let endpoint = endpoint.into();
        let model = model.into();
        Self {
            endpoint: if endpoint.trim().is_empty() {
                DEFAULT_ENDPOINT.to_string()
            } else {
                endpoint
            },
            model: if model.trim().is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model
            },
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_MODEL)
    }
}

impl Provider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn prepare(&self, node: &Node, request: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(RoleMessage::system(&request.system_prompt));
        messages.extend(request.history.iter().map(RoleMessage::from_history));

        let ends_with_user = request
            .history
            .last()
            .is_some_and(|m| m.sender == Sender::User);
        if !ends_with_user && !request.input.is_empty() {
            messages.push(RoleMessage {
                role: "user",
                content: request.input.clone(),
            });
        }

        let params = &node.params;
        let options = (params.temperature.is_some()
            || params.top_p.is_some()
            || params.max_tokens.is_some())
        .then(|| OllamaOptions {
            temperature: params.temperature,
            top_p: params.top_p,
            num_predict: params.max_tokens.filter(|&n| n > 0),
        });

        let body = OllamaRequest {
            model: &self.model,
            messages,
            stream: false,
            options,
        };

        Ok(PreparedRequest {
            url: join_url(&self.endpoint, "api/chat"),
            bearer: None,
            headers: Vec::new(),
            body: serde_json::to_value(&body)?,
        })
    }

    fn parse(&self, body: Value) -> Result<String, ProviderError> {
        let response: OllamaResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        response
            .message
            .map(|m| m.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no message.content".into()))
    }
}

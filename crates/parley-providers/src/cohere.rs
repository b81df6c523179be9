use parley_protocol::{Node, Sender, COHERE_BASE_URL};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{join_url, ChatRequest, PreparedRequest, Provider, ProviderError};

/// Cohere v1 `/chat`.
#[derive(Debug, Default, Clone, Copy)]
pub struct CohereProvider;

#[derive(Serialize)]
struct ChatBody<'a> {
    message: &'a str,
    chat_history: Vec<HistoryTurn>,
    preamble: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    p: Option<f64>,
}

#[derive(Serialize)]
struct HistoryTurn {
    role: &'static str,
    message: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    text: Option<String>,
}

impl Provider for CohereProvider {
    fn name(&self) -> &str {
        "cohere"
    }

    fn prepare(&self, node: &Node, request: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
        let base = if node.base_url.trim().is_empty() {
            COHERE_BASE_URL
        } else {
            node.base_url.as_str()
        };

        // The current turn travels in `message`, so it is left out of the history.
        let prior = request.history.len().saturating_sub(1);
        let chat_history = request.history[..prior]
            .iter()
            .map(|m| HistoryTurn {
                role: match m.sender {
                    Sender::User => "USER",
                    Sender::Ai => "CHATBOT",
                },
                message: m.content.clone(),
            })
            .collect();

        let body = ChatBody {
            message: &request.input,
            chat_history,
            preamble: &request.system_prompt,
            temperature: node.params.temperature,
            p: node.params.top_p,
        };

        Ok(PreparedRequest {
            url: join_url(base, "chat"),
            bearer: node.has_key().then(|| node.api_key.clone()),
            headers: Vec::new(),
            body: serde_json::to_value(&body)?,
        })
    }

    fn parse(&self, body: Value) -> Result<String, ProviderError> {
        let response: ChatResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        response
            .text
            .ok_or_else(|| ProviderError::MalformedResponse("no text".into()))
    }
}

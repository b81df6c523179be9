use parley_protocol::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{join_url, ChatRequest, PreparedRequest, Provider, ProviderError, RoleMessage};

const COMPLETIONS_PATH: &str = "chat/completions";

/// Any OpenAI-compatible `/chat/completions` endpoint.
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenAiProvider;

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<RoleMessage>,
    temperature: f64,
    max_tokens: u32,
    top_p: f64,
    repetition_penalty: f64,
    top_k: u32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiProvider {
    fn endpoint(base_url: &str) -> String {
        let base = base_url.trim_end_matches('/');
        if base.ends_with(COMPLETIONS_PATH) {
            base.to_string()
        } else {
            join_url(base, COMPLETIONS_PATH)
        }
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn prepare(&self, node: &Node, request: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
        let mut messages = Vec::with_capacity(request.history.len() + 1);
        messages.push(RoleMessage::system(&request.system_prompt));
        messages.extend(request.history.iter().map(RoleMessage::from_history));

        let params = &node.params;
        let body = CompletionBody {
            model: &node.model,
            messages,
            temperature: params.temperature.unwrap_or(0.0),
            max_tokens: params
                .max_tokens
                .filter(|&n| n > 0)
                .unwrap_or(request.default_max_tokens),
            top_p: params.top_p.unwrap_or(1.0),
            repetition_penalty: params.repetition_penalty.unwrap_or(1.0),
            top_k: params.top_k.unwrap_or(0),
        };

        Ok(PreparedRequest {
            url: Self::endpoint(&node.base_url),
            bearer: node.has_key().then(|| node.api_key.clone()),
            headers: Vec::new(),
            body: serde_json::to_value(&body)?,
        })
    }

    fn parse(&self, body: Value) -> Result<String, ProviderError> {
        let response: CompletionResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices[0].message.content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request;
    use parley_protocol::GenerationParams;

    fn node() -> Node {
        Node {
            name: "Primary Settings".to_string(),
            base_url: "https://api.openai.com/v1/".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: "sk-test".to_string(),
            params: GenerationParams {
                temperature: Some(0.7),
                top_p: Some(0.9),
                repetition_penalty: Some(1.1),
                top_k: Some(40),
                max_tokens: Some(512),
            },
            ..Node::default()
        }
    }

    #[test]
    fn endpoint_suffix_appended_once() {
        assert_eq!(
            OpenAiProvider::endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
        assert_eq!(
            OpenAiProvider::endpoint("http://proxy/v1/chat/completions"),
            "http://proxy/v1/chat/completions"
        );
    }

    #[test]
    fn prepare_shapes_messages_and_params() {
        let prepared = OpenAiProvider.prepare(&node(), &request()).unwrap();
        assert_eq!(prepared.url, "https://api.openai.com/v1/chat/completions");
        assert_eq!(prepared.bearer.as_deref(), Some("sk-test"));

        let body = &prepared.body;
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "You are Mira.");
        assert_eq!(body["messages"][1]["role"], "assistant");
        assert_eq!(body["messages"][4]["role"], "user");
        assert_eq!(body["messages"][4]["content"], "Tired.");
        assert_eq!(body["messages"].as_array().unwrap().len(), 5);
        assert_eq!(body["max_tokens"], 512);
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["temperature"], 0.7);
    }

    #[test]
    fn missing_params_use_defaults() {
        let mut node = node();
        node.params = GenerationParams::default();
        node.api_key.clear();
        let prepared = OpenAiProvider.prepare(&node, &request()).unwrap();
        assert!(prepared.bearer.is_none());
        assert_eq!(prepared.body["max_tokens"], 1000);
        assert_eq!(prepared.body["temperature"], 0.0);
        assert_eq!(prepared.body["top_p"], 1.0);
        assert_eq!(prepared.body["repetition_penalty"], 1.0);
        assert_eq!(prepared.body["top_k"], 0);
    }

    #[test]
    fn prepare_is_deterministic() {
        let a = OpenAiProvider.prepare(&node(), &request()).unwrap();
        let b = OpenAiProvider.prepare(&node(), &request()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn parse_first_choice() {
        let body = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "Hello"}}]
        });
        assert_eq!(OpenAiProvider.parse(body).unwrap(), "Hello");
    }

    #[test]
    fn parse_without_choices_is_malformed() {
        let err = OpenAiProvider.parse(serde_json::json!({"choices": []})).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
        let err = OpenAiProvider.parse(serde_json::json!("nope")).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}

use parley_protocol::{Node, Sender, GOOGLE_BASE_URL};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{join_url, ChatRequest, PreparedRequest, Provider, ProviderError};

const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TOP_K: u32 = 40;
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Google AI Studio `generateContent`.
#[derive(Debug, Default, Clone, Copy)]
pub struct GoogleProvider;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(rename = "system_instruction")]
    system_instruction: SystemInstruction,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f64>,
    top_k: u32,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

impl Provider for GoogleProvider {
    fn name(&self) -> &str {
        "google"
    }

    fn prepare(&self, node: &Node, request: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
        let base = if node.base_url.trim().is_empty() {
            GOOGLE_BASE_URL
        } else {
            node.base_url.as_str()
        };
        let model = if node.model.trim().is_empty() {
            DEFAULT_MODEL
        } else {
            node.model.as_str()
        };
        let url = format!("{}:generateContent", join_url(base, model));

        let contents = request
            .history
            .iter()
            .map(|m| Content {
                role: match m.sender {
                    Sender::User => "user",
                    Sender::Ai => "model",
                },
                parts: vec![Part {
                    text: m.content.clone(),
                }],
            })
            .collect();

        let params = &node.params;
        let body = GenerateBody {
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params
                    .max_tokens
                    .filter(|&n| n > 0)
                    .unwrap_or(request.default_max_tokens),
                top_p: params.top_p,
                top_k: params.top_k.filter(|&k| k > 0).unwrap_or(DEFAULT_TOP_K),
            },
            system_instruction: SystemInstruction {
                parts: vec![Part {
                    text: request.system_prompt.clone(),
                }],
            },
        };

        Ok(PreparedRequest {
            url,
            bearer: None,
            headers: node
                .has_key()
                .then(|| (API_KEY_HEADER, node.api_key.clone()))
                .into_iter()
                .collect(),
            body: serde_json::to_value(&body)?,
        })
    }

    fn parse(&self, body: Value) -> Result<String, ProviderError> {
        let response: GenerateResponse = serde_json::from_value(body)
            .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| {
                ProviderError::MalformedResponse("no candidates[0].content.parts[0].text".into())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request;
    use parley_protocol::GenerationParams;

    fn node() -> Node {
        Node {
            name: "Gemini".to_string(),
            provider_type: parley_protocol::ProviderType::Google,
            base_url: GOOGLE_BASE_URL.to_string(),
            model: "gemini-1.5-pro".to_string(),
            api_key: "g-key".to_string(),
            params: GenerationParams {
                temperature: Some(0.3),
                top_p: Some(0.8),
                ..GenerationParams::default()
            },
            ..Node::default()
        }
    }

    #[test]
    fn key_travels_in_header_not_url() {
        let prepared = GoogleProvider.prepare(&node(), &request()).unwrap();
        assert_eq!(
            prepared.url,
            format!("{GOOGLE_BASE_URL}/gemini-1.5-pro:generateContent")
        );
        assert!(!prepared.url.contains("g-key"));
        assert_eq!(prepared.headers, vec![("x-goog-api-key", "g-key".to_string())]);
        assert!(prepared.bearer.is_none());
    }

    #[test]
    fn keyless_custom_node_sends_no_key_header() {
        let mut node = node();
        node.base_url = "http://localhost:8080/models".to_string();
        node.api_key.clear();
        let prepared = GoogleProvider.prepare(&node, &request()).unwrap();
        assert!(prepared.headers.is_empty());
    }

    #[test]
    fn empty_model_uses_flash() {
        let mut node = node();
        node.model.clear();
        let prepared = GoogleProvider.prepare(&node, &request()).unwrap();
        assert!(prepared.url.contains("/gemini-1.5-flash:generateContent"));
    }

    #[test]
    fn body_maps_roles_and_config() {
        let prepared = GoogleProvider.prepare(&node(), &request()).unwrap();
        let body = &prepared.body;

        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 4);
        assert_eq!(contents[0]["role"], "model");
        assert_eq!(contents[1]["role"], "user");
        assert_eq!(contents[1]["parts"][0]["text"], "Hi!");

        let config = &body["generationConfig"];
        assert_eq!(config["temperature"], 0.3);
        assert_eq!(config["topP"], 0.8);
        assert_eq!(config["topK"], 40);
        assert_eq!(config["maxOutputTokens"], 1000);

        assert_eq!(body["system_instruction"]["parts"][0]["text"], "You are Mira.");
    }

    #[test]
    fn unset_sampling_fields_are_omitted() {
        let mut node = node();
        node.params = GenerationParams::default();
        let prepared = GoogleProvider.prepare(&node, &request()).unwrap();
        let config = prepared.body["generationConfig"].as_object().unwrap();
        assert!(!config.contains_key("temperature"));
        assert!(!config.contains_key("topP"));
    }

    #[test]
    fn parse_first_candidate_part() {
        let body = serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Hello"}]}}]
        });
        assert_eq!(GoogleProvider.parse(body).unwrap(), "Hello");
    }

    #[test]
    fn parse_without_candidates_is_malformed() {
        let err = GoogleProvider.parse(serde_json::json!({})).unwrap_err();
        assert!(matches!(err, ProviderError::MalformedResponse(_)));
    }
}

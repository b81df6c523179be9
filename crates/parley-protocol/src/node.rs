use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Default OpenAI-compatible base URL.
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Google AI Studio models endpoint.
pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// Cohere API base.
pub const COHERE_BASE_URL: &str = "https://api.cohere.ai/v1";

/// Deadline applied when a node carries no timeout of its own.
pub const DEFAULT_NODE_TIMEOUT_MS: u64 = 20_000;

/// Wire format spoken by a node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderType {
    /// Any `/chat/completions` endpoint (OpenAI, OpenRouter, local proxies).
    #[default]
    #[serde(alias = "openrouter", alias = "openai_compatible")]
    Openai,
    #[serde(alias = "gemini")]
    Google,
    Cohere,
}

impl ProviderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::Openai => "openai",
            ProviderType::Google => "google",
            ProviderType::Cohere => "cohere",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" | "openrouter" | "openai_compatible" => Ok(ProviderType::Openai),
            "google" | "gemini" => Ok(ProviderType::Google),
            "cohere" => Ok(ProviderType::Cohere),
            other => Err(format!("unknown provider type: {other}")),
        }
    }
}

/// Sampling parameters. Unset fields fall back to per-provider defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GenerationParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repetition_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// When a failed attempt on this node should move on to the next one.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TriggerRules {
    #[serde(default)]
    pub status_codes: BTreeSet<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

impl TriggerRules {
    pub fn new(status_codes: impl IntoIterator<Item = u16>, timeout_ms: u64) -> Self {
        Self {
            status_codes: status_codes.into_iter().collect(),
            timeout_ms: Some(timeout_ms),
        }
    }

    /// Parse a comma separated list such as `"429, 500, 502"`.
    /// Entries that are not numbers are skipped.
    pub fn parse_codes(list: &str) -> BTreeSet<u16> {
        list.split(',')
            .filter_map(|code| code.trim().parse::<u16>().ok())
            .collect()
    }

    pub fn matches(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }

    /// Per-attempt deadline.
    pub fn timeout(&self) -> Duration {
        let ms = match self.timeout_ms {
            Some(ms) if ms > 0 => ms,
            _ => DEFAULT_NODE_TIMEOUT_MS,
        };
        Duration::from_millis(ms)
    }
}

/// One candidate provider configuration in an execution plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub name: String,
    pub provider_type: ProviderType,
    #[serde(default)]
    pub base_url: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub params: GenerationParams,
    #[serde(default)]
    pub triggers: TriggerRules,
}

impl Node {
    pub fn has_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// An OpenAI-compatible node pointed somewhere other than OpenAI itself,
    /// with a model chosen. Such nodes are usable without a key.
    pub fn is_custom_endpoint(&self) -> bool {
        self.provider_type == ProviderType::Openai
            && !self.base_url.trim().is_empty()
            && !self.model.trim().is_empty()
            && self.base_url.trim_end_matches('/') != OPENAI_BASE_URL
    }
}

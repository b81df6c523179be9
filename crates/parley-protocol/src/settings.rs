use serde::{Deserialize, Serialize};

use crate::node::{Node, ProviderType};

/// Regex replacement applied to model output before display.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputRule {
    pub regex: String,
    #[serde(default)]
    pub replacement: String,
}

/// Switches the chat background when the trigger word appears in a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackgroundTrigger {
    pub trigger: String,
    pub url: String,
}

/// Plays an avatar action when the trigger word appears in a reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpressionLink {
    pub trigger: String,
    pub action: String,
}

/// Process-wide chat settings.
///
/// Owned by the store; the engine reads a fresh snapshot at the start of
/// every request sequence so edits take effect on the next turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub api_provider: ProviderType,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub gemini_key: String,
    #[serde(default)]
    pub gemini_model: String,
    #[serde(default)]
    pub cohere_key: String,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_top_k")]
    pub top_k: u32,
    #[serde(default = "default_repetition_penalty")]
    pub repetition_penalty: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Number of most recent messages sent as context.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    /// User-ordered fallback nodes tried after the primary.
    #[serde(default)]
    pub fallback_chain: Vec<Node>,

    #[serde(default = "default_ai_name")]
    pub ai_name: String,
    #[serde(default = "default_user_name")]
    pub user_name: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub initial_message: String,
    /// Wraps outgoing user turns; `{{text}}` marks where the body goes.
    #[serde(default)]
    pub input_template: String,
    #[serde(default)]
    pub output_rules: Vec<OutputRule>,
    #[serde(default)]
    pub background_triggers: Vec<BackgroundTrigger>,
    #[serde(default)]
    pub expression_links: Vec<ExpressionLink>,
    #[serde(default)]
    pub background_image: String,

    /// Endpoint used when a node has no credentials.
    #[serde(default = "default_local_endpoint")]
    pub local_endpoint: String,
    #[serde(default = "default_local_model")]
    pub local_model: String,
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_temperature() -> f64 {
    0.7
}

fn default_top_p() -> f64 {
    1.0
}

fn default_top_k() -> u32 {
    40
}

fn default_repetition_penalty() -> f64 {
    1.1
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_context_window() -> usize {
    25
}

fn default_ai_name() -> String {
    "AI".to_string()
}

fn default_user_name() -> String {
    "User".to_string()
}

fn default_local_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_local_model() -> String {
    "llama3".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_provider: ProviderType::default(),
            api_key: String::new(),
            base_url: String::new(),
            model: default_model(),
            gemini_key: String::new(),
            gemini_model: String::new(),
            cohere_key: String::new(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: default_top_k(),
            repetition_penalty: default_repetition_penalty(),
            max_tokens: default_max_tokens(),
            context_window: default_context_window(),
            fallback_chain: Vec::new(),
            ai_name: default_ai_name(),
            user_name: default_user_name(),
            system_prompt: String::new(),
            initial_message: String::new(),
            input_template: String::new(),
            output_rules: Vec::new(),
            background_triggers: Vec::new(),
            expression_links: Vec::new(),
            background_image: String::new(),
            local_endpoint: default_local_endpoint(),
            local_model: default_local_model(),
        }
    }
}

impl Settings {
    /// Context window size, never below one.
    pub fn window_size(&self) -> usize {
        self.context_window.max(1)
    }

    /// Opening message for a new conversation.
    pub fn greeting(&self) -> String {
        if self.initial_message.trim().is_empty() {
            format!("Hello {}.", self.user_name)
        } else {
            self.initial_message.clone()
        }
    }

    /// Swap fallback `index` with its neighbour in `direction` (-1 or +1).
    /// Returns false when the move would leave the list.
    pub fn move_fallback(&mut self, index: usize, direction: i32) -> bool {
        let target = index as i64 + direction as i64;
        if target < 0 || target as usize >= self.fallback_chain.len() || index >= self.fallback_chain.len() {
            return false;
        }
        self.fallback_chain.swap(index, target as usize);
        true
    }
}

use parley_protocol::{
    GenerationParams, Node, ProviderType, Settings, TriggerRules, COHERE_BASE_URL,
    GOOGLE_BASE_URL, OPENAI_BASE_URL,
};

pub const PRIMARY_NODE_NAME: &str = "Primary Settings";
pub const PRIMARY_TRIGGER_CODES: [u16; 4] = [429, 500, 502, 503];
pub const PRIMARY_TIMEOUT_MS: u64 = 25_000;

/// The node described by the top-level provider settings.
pub fn primary_node(settings: &Settings) -> Node {
    let (api_key, base_url, model) = match settings.api_provider {
        ProviderType::Openai => {
            let base = if settings.base_url.trim().is_empty() {
                OPENAI_BASE_URL.to_string()
            } else {
                settings.base_url.clone()
            };
            (settings.api_key.clone(), base, settings.model.clone())
        }
        ProviderType::Google => (
            settings.gemini_key.clone(),
            GOOGLE_BASE_URL.to_string(),
            settings.gemini_model.clone(),
        ),
        ProviderType::Cohere => (
            settings.cohere_key.clone(),
            COHERE_BASE_URL.to_string(),
            String::new(),
        ),
    };

    Node {
        name: PRIMARY_NODE_NAME.to_string(),
        provider_type: settings.api_provider,
        base_url,
        model,
        api_key,
        params: GenerationParams {
            temperature: Some(settings.temperature),
            top_p: Some(settings.top_p),
            repetition_penalty: Some(settings.repetition_penalty),
            top_k: Some(settings.top_k),
            max_tokens: Some(settings.max_tokens),
        },
        triggers: TriggerRules::new(PRIMARY_TRIGGER_CODES, PRIMARY_TIMEOUT_MS),
    }
}

/// `[primary, ...fallback_chain]`. Fallback nodes are taken as stored.
pub fn build_plan(settings: &Settings) -> Vec<Node> {
    let mut plan = Vec::with_capacity(settings.fallback_chain.len() + 1);
    plan.push(primary_node(settings));
    plan.extend(settings.fallback_chain.iter().cloned());
    plan
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fallback(name: &str) -> Node {
        Node {
            name: name.to_string(),
            provider_type: ProviderType::Google,
            api_key: "k".to_string(),
            triggers: TriggerRules::new([503], 10_000),
            ..Node::default()
        }
    }

    #[test]
    fn openai_primary_uses_preset_when_base_blank() {
        let settings = Settings {
            api_key: "sk".to_string(),
            model: "gpt-4o".to_string(),
            ..Settings::default()
        };
        let node = primary_node(&settings);
        assert_eq!(node.name, PRIMARY_NODE_NAME);
        assert_eq!(node.base_url, OPENAI_BASE_URL);
        assert_eq!(node.model, "gpt-4o");
        assert_eq!(node.api_key, "sk");
        assert_eq!(node.params.temperature, Some(0.7));
        assert_eq!(node.params.max_tokens, Some(1000));
        assert_eq!(node.triggers.timeout_ms, Some(25_000));
        assert!(node.triggers.matches(502));
        assert!(!node.triggers.matches(404));
    }

    #[test]
    fn google_and_cohere_primaries() {
        let settings = Settings {
            api_provider: ProviderType::Google,
            gemini_key: "g".to_string(),
            gemini_model: "gemini-1.5-pro".to_string(),
            cohere_key: "c".to_string(),
            ..Settings::default()
        };
        let node = primary_node(&settings);
        assert_eq!(node.provider_type, ProviderType::Google);
        assert_eq!(node.api_key, "g");
        assert_eq!(node.base_url, GOOGLE_BASE_URL);
        assert_eq!(node.model, "gemini-1.5-pro");

        let settings = Settings {
            api_provider: ProviderType::Cohere,
            ..settings
        };
        let node = primary_node(&settings);
        assert_eq!(node.api_key, "c");
        assert_eq!(node.base_url, COHERE_BASE_URL);
        assert!(node.model.is_empty());
    }

    #[test]
    fn plan_is_primary_then_fallbacks_in_order() {
        let settings = Settings {
            fallback_chain: vec![fallback("b"), fallback("c")],
            ..Settings::default()
        };
        let plan = build_plan(&settings);
        let names: Vec<_> = plan.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec![PRIMARY_NODE_NAME, "b", "c"]);
        assert_eq!(plan[1], settings.fallback_chain[0]);
    }
}

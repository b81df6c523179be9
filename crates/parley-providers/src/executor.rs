use std::sync::Arc;

use async_trait::async_trait;
use parley_protocol::{Node, ProviderType, Settings};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::{
    ChatRequest, CohereProvider, GoogleProvider, Notifier, OllamaProvider, OpenAiProvider,
    PreparedRequest, Provider, ProviderError,
};

/// Performs one attempt against one node.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(&self, node: &Node, request: &ChatRequest) -> Result<String, ProviderError>;
}

/// Where keyless nodes are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEndpoint {
    pub endpoint: String,
    pub model: String,
}

impl Default for LocalEndpoint {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
        }
    }
}

impl From<&Settings> for LocalEndpoint {
    fn from(settings: &Settings) -> Self {
        Self {
            endpoint: settings.local_endpoint.clone(),
            model: settings.local_model.clone(),
        }
    }
}

/// Executes nodes over HTTP with reqwest.
#[derive(Clone)]
pub struct HttpExecutor {
    client: Client,
    notifier: Option<Arc<dyn Notifier>>,
    local: LocalEndpoint,
}

impl Default for HttpExecutor {
    fn default() -> Self {
        Self::new(Client::new())
    }
}

impl HttpExecutor {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            notifier: None,
            local: LocalEndpoint::default(),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_local(mut self, local: LocalEndpoint) -> Self {
        self.local = local;
        self
    }

    fn provider_for(&self, node: &Node) -> Box<dyn Provider> {
        if !node.has_key() && !node.is_custom_endpoint() {
            return Box::new(OllamaProvider::new(
                self.local.endpoint.clone(),
                self.local.model.clone(),
            ));
        }
        match node.provider_type {
            ProviderType::Openai => Box::new(OpenAiProvider),
            ProviderType::Google => Box::new(GoogleProvider),
            ProviderType::Cohere => Box::new(CohereProvider),
        }
    }

    async fn send(
        &self,
        node: &Node,
        provider: &dyn Provider,
        prepared: PreparedRequest,
    ) -> Result<String, ProviderError> {
        let mut builder = self.client.post(&prepared.url).json(&prepared.body);
        if let Some(token) = &prepared.bearer {
            builder = builder.bearer_auth(token);
        }
        for (name, value) in &prepared.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await.map_err(ProviderError::from_transport)?;

        let status = response.status().as_u16();
        if node.triggers.matches(status) {
            return Err(ProviderError::TriggeredStatus { status });
        }
        if !response.status().is_success() {
            let message = match response.text().await {
                Ok(text) => text,
                Err(e) => format!("failed to read error body: {}", e.without_url()),
            };
            return Err(ProviderError::Api { status, message });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::MalformedResponse(e.without_url().to_string()))?;
        provider.parse(body)
    }

    /// One reported attempt through `provider`.
    async fn execute_with(
        &self,
        provider: &dyn Provider,
        node: &Node,
        request: &ChatRequest,
    ) -> Result<String, ProviderError> {
        let result = self.attempt(provider, node, request).await;
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }

    async fn attempt(
        &self,
        provider: &dyn Provider,
        node: &Node,
        request: &ChatRequest,
    ) -> Result<String, ProviderError> {
        let prepared = provider.prepare(node, request)?;
        let deadline = node.triggers.timeout();

        debug!(
            node = %node.name,
            provider = provider.name(),
            url = %prepared.url,
            timeout_ms = deadline.as_millis() as u64,
            "Dispatching request"
        );

        match tokio::time::timeout(deadline, self.send(node, provider, prepared)).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }

    fn report(&self, error: &ProviderError) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        notifier.notify(&format!("API request failed: {error}"));
        if matches!(error, ProviderError::Timeout) {
            notifier.notify("Request timed out");
        }
    }
}

#[async_trait]
impl NodeExecutor for HttpExecutor {
    async fn execute(&self, node: &Node, request: &ChatRequest) -> Result<String, ProviderError> {
        let provider = self.provider_for(node);
        self.execute_with(provider.as_ref(), node, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::request;
    use parley_protocol::OPENAI_BASE_URL;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Notifier for Recorder {
        fn notify(&self, message: &str) {
            self.0.lock().unwrap().push(message.to_string());
        }
    }

    fn openai(base_url: &str, model: &str, key: &str) -> Node {
        Node {
            name: "n".to_string(),
            provider_type: ProviderType::Openai,
            base_url: base_url.to_string(),
            model: model.to_string(),
            api_key: key.to_string(),
            ..Node::default()
        }
    }

    #[test]
    fn keyless_preset_node_degrades_to_local() {
        let executor = HttpExecutor::default();
        let node = openai(OPENAI_BASE_URL, "gpt-4o", "");
        assert_eq!(executor.provider_for(&node).name(), "ollama");
    }

    #[test]
    fn keyless_custom_endpoint_stays_openai() {
        let executor = HttpExecutor::default();
        let node = openai("http://localhost:5001/v1", "mythomax", "");
        assert_eq!(executor.provider_for(&node).name(), "openai");
    }

    #[test]
    fn keyed_nodes_dispatch_by_type() {
        let executor = HttpExecutor::default();
        let mut node = openai("", "", "key");
        node.provider_type = ProviderType::Google;
        assert_eq!(executor.provider_for(&node).name(), "google");
        node.provider_type = ProviderType::Cohere;
        assert_eq!(executor.provider_for(&node).name(), "cohere");
    }

    #[test]
    fn local_endpoint_from_settings() {
        let settings = Settings {
            local_endpoint: "http://gpu-box:11434".to_string(),
            local_model: "mistral".to_string(),
            ..Settings::default()
        };
        let local = LocalEndpoint::from(&settings);
        assert_eq!(local.endpoint, "http://gpu-box:11434");
        assert_eq!(local.model, "mistral");
    }

    struct Unconfigured;

    impl Provider for Unconfigured {
        fn name(&self) -> &str {
            "unconfigured"
        }

        fn prepare(&self, node: &Node, _: &ChatRequest) -> Result<PreparedRequest, ProviderError> {
            Err(ProviderError::NotConfigured(node.name.clone()))
        }

        fn parse(&self, _: Value) -> Result<String, ProviderError> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn prepare_failure_is_reported() {
        let notices = Arc::new(Recorder::default());
        let executor = HttpExecutor::default().with_notifier(notices.clone());
        let node = openai("", "", "key");

        let err = executor
            .execute_with(&Unconfigured, &node, &request())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(_)));

        let seen = notices.0.lock().unwrap();
        assert_eq!(seen.as_slice(), ["API request failed: Provider not configured: n"]);
    }
}

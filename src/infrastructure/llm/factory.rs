use std::collections::HashMap;
use std::sync::Arc;

use super::http_client::HttpClient;
use super::{AnthropicAdapter, GeminiAdapter, OpenAiAdapter};
use crate::config::ProvidersConfig;
use crate::domain::{Backend, DomainError, ProviderAdapter};

/// Provider adapters keyed by backend family
#[derive(Debug, Clone, Default)]
pub struct AdapterRegistry {
    adapters: HashMap<Backend, Arc<dyn ProviderAdapter>>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build one adapter per backend, sharing a single HTTP client
    pub fn from_config(config: &ProvidersConfig) -> Result<Self, DomainError> {
        let http_client = HttpClient::with_timeout(config.timeout())?;

        let gemini = GeminiAdapter::with_base_url(http_client.clone(), &config.gemini.base_url)
            .with_default_model(&config.gemini.default_model);
        let anthropic =
            AnthropicAdapter::with_base_url(http_client.clone(), &config.anthropic.base_url)
                .with_default_model(&config.anthropic.default_model);
        let openai = OpenAiAdapter::with_base_url(http_client, &config.openai.base_url)
            .with_default_model(&config.openai.default_model);

        Ok(Self::new()
            .with_adapter(Arc::new(gemini))
            .with_adapter(Arc::new(anthropic))
            .with_adapter(Arc::new(openai)))
    }

    /// Register `adapter` under the backend it reports, replacing any previous one
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.backend(), adapter);
        self
    }

    pub fn get(&self, backend: Backend) -> Result<Arc<dyn ProviderAdapter>, DomainError> {
        self.adapters.get(&backend).cloned().ok_or_else(|| {
            DomainError::configuration(format!("No provider adapter registered for {}", backend))
        })
    }

    pub fn contains(&self, backend: Backend) -> bool {
        self.adapters.contains_key(&backend)
    }
}

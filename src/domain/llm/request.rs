use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::domain::skill::GenerationConfig;

/// Generation parameters sent to a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub use_web_search: bool,
}

impl GenerationParams {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            max_tokens: 4096,
            temperature: None,
            use_web_search: false,
        }
    }

    /// Derive parameters from a skill's configuration, filling in the model
    /// with `default_model` when the skill does not pin one
    pub fn from_config(config: &GenerationConfig, default_model: &str) -> Self {
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| default_model.to_string()),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            use_web_search: config.use_web_search,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.use_web_search = enabled;
        self
    }
}

/// A fully rendered prompt ready to be sent to a provider adapter
#[derive(Debug, Clone)]
pub struct PromptRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub params: GenerationParams,
    /// Checked by the adapter between reads of the response body
    pub cancellation: Option<CancellationToken>,
}

impl PromptRequest {
    pub fn new(
        system_prompt: impl Into<String>,
        user_prompt: impl Into<String>,
        params: GenerationParams,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            params,
            cancellation: None,
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// System and user prompt merged into one user turn, for models that
    /// reject a separate system instruction
    pub fn merged_prompt(&self) -> String {
        if self.system_prompt.trim().is_empty() {
            return self.user_prompt.clone();
        }

        format!("{}\n\n---\n\n{}", self.system_prompt, self.user_prompt)
    }
}

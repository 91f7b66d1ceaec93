use std::time::Duration;

use serde::Deserialize;

use crate::infrastructure::llm::{
    DEFAULT_ANTHROPIC_BASE_URL, DEFAULT_ANTHROPIC_MODEL, DEFAULT_GEMINI_BASE_URL,
    DEFAULT_GEMINI_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL,
};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub runner: RunnerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Endpoint and model defaults for one backend
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderSettings {
    pub base_url: String,
    pub default_model: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Whole-request timeout, streaming included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_gemini")]
    pub gemini: ProviderSettings,
    #[serde(default = "default_anthropic")]
    pub anthropic: ProviderSettings,
    #[serde(default = "default_openai")]
    pub openai: ProviderSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerConfig {
    /// Pause between consecutive steps
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Rows processed at once by the batch runner
    #[serde(default = "default_batch_concurrency")]
    pub batch_concurrency: usize,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_step_delay_ms() -> u64 {
    300
}

fn default_batch_concurrency() -> usize {
    3
}

fn default_gemini() -> ProviderSettings {
    ProviderSettings {
        base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
        default_model: DEFAULT_GEMINI_MODEL.to_string(),
    }
}

fn default_anthropic() -> ProviderSettings {
    ProviderSettings {
        base_url: DEFAULT_ANTHROPIC_BASE_URL.to_string(),
        default_model: DEFAULT_ANTHROPIC_MODEL.to_string(),
    }
}

fn default_openai() -> ProviderSettings {
    ProviderSettings {
        base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
        default_model: DEFAULT_OPENAI_MODEL.to_string(),
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            gemini: default_gemini(),
            anthropic: default_anthropic(),
            openai: default_openai(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_delay_ms: default_step_delay_ms(),
            batch_concurrency: default_batch_concurrency(),
        }
    }
}

impl RunnerConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false))
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

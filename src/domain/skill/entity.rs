//! Skill entity

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::DomainError;

/// Backend family a skill is generated with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Gemini,
    Claude,
    #[serde(alias = "openai")]
    ChatGpt,
}

impl Backend {
    pub const ALL: [Backend; 3] = [Backend::Gemini, Backend::Claude, Backend::ChatGpt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Gemini => "gemini",
            Backend::Claude => "claude",
            Backend::ChatGpt => "chatgpt",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Backend::Gemini),
            "claude" | "anthropic" => Ok(Backend::Claude),
            "chatgpt" | "openai" => Ok(Backend::ChatGpt),
            other => Err(DomainError::validation(format!("Unknown backend: {}", other))),
        }
    }
}

/// Form type of a declared input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    #[default]
    Text,
    Textarea,
    Select,
    Number,
    Checkbox,
}

/// A named input a skill expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillInput {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub input_type: InputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default)]
    pub required: bool,
}

impl SkillInput {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();

        Self {
            label: id.clone(),
            id,
            input_type: InputType::default(),
            default: None,
            required: false,
        }
    }

    pub fn with_type(mut self, input_type: InputType) -> Self {
        self.input_type = input_type;
        self
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Generation settings applied when a skill runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub backend: Backend,
    /// Backend model name; the adapter's configured default is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub use_web_search: bool,
}

fn default_max_tokens() -> u32 {
    4096
}

impl GenerationConfig {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            model: None,
            max_tokens: default_max_tokens(),
            temperature: None,
            use_web_search: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
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

/// Immutable definition of one AI-assisted task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub system_prompt: String,
    pub user_prompt_template: String,
    #[serde(default)]
    pub inputs: Vec<SkillInput>,
    pub config: GenerationConfig,
}

impl Skill {
    pub fn new(
        id: impl Into<String>,
        system_prompt: impl Into<String>,
        user_prompt_template: impl Into<String>,
        config: GenerationConfig,
    ) -> Self {
        let id = id.into();

        Self {
            name: id.clone(),
            id,
            system_prompt: system_prompt.into(),
            user_prompt_template: user_prompt_template.into(),
            inputs: Vec::new(),
            config,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_input(mut self, input: SkillInput) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn input(&self, id: &str) -> Option<&SkillInput> {
        self.inputs.iter().find(|i| i.id == id)
    }

    pub fn required_inputs(&self) -> impl Iterator<Item = &SkillInput> {
        self.inputs.iter().filter(|i| i.required)
    }
}

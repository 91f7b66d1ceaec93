use std::collections::HashMap;
use std::fmt;

use crate::domain::skill::Backend;
use crate::domain::DomainError;

/// Per-request API keys, one per backend family
#[derive(Clone, Default)]
pub struct Credentials {
    keys: HashMap<Backend, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_key(mut self, backend: Backend, api_key: impl Into<String>) -> Self {
        self.keys.insert(backend, api_key.into());
        self
    }

    /// Load keys from `GEMINI_API_KEY`, `ANTHROPIC_API_KEY` and `OPENAI_API_KEY`
    pub fn from_env() -> Self {
        let mut credentials = Self::new();

        for backend in Backend::ALL {
            if let Ok(key) = std::env::var(env_var_name(backend)) {
                credentials = credentials.with_key(backend, key);
            }
        }

        credentials
    }

    /// True when a non-blank key is present for `backend`
    pub fn has(&self, backend: Backend) -> bool {
        self.keys
            .get(&backend)
            .is_some_and(|key| !key.trim().is_empty())
    }

    pub fn api_key(&self, backend: Backend) -> Result<&str, DomainError> {
        match self.keys.get(&backend) {
            Some(key) if !key.trim().is_empty() => Ok(key.as_str()),
            _ => Err(DomainError::credential(format!(
                "API key is missing for {}",
                backend
            ))),
        }
    }
}

pub fn env_var_name(backend: Backend) -> &'static str {
    match backend {
        Backend::Gemini => "GEMINI_API_KEY",
        Backend::Claude => "ANTHROPIC_API_KEY",
        Backend::ChatGpt => "OPENAI_API_KEY",
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut backends: Vec<&Backend> = self.keys.keys().collect();
        backends.sort();

        f.debug_struct("Credentials")
            .field("backends", &backends)
            .finish_non_exhaustive()
    }
}

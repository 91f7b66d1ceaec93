use thiserror::Error;

/// Core domain errors
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Credential error: {message}")]
    Credential { message: String },

    /// Non-success HTTP response, carrying the backend's error payload verbatim
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Provider error: {provider} - {message}")]
    Provider { provider: String, message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DomainError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn credential(message: impl Into<String>) -> Self {
        Self::Credential {
            message: message.into(),
        }
    }

    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
        }
    }

    pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let error = DomainError::not_found("Skill 'cover-letter' not found");
        assert_eq!(error.to_string(), "Not found: Skill 'cover-letter' not found");
    }

    #[test]
    fn test_http_error_keeps_payload() {
        let error = DomainError::http(401, r#"{"error":{"message":"invalid x-api-key"}}"#);
        assert_eq!(
            error.to_string(),
            r#"HTTP 401: {"error":{"message":"invalid x-api-key"}}"#
        );
    }

    #[test]
    fn test_provider_error() {
        let error = DomainError::provider("anthropic", "overloaded");
        assert_eq!(error.to_string(), "Provider error: anthropic - overloaded");
    }
}

//! Workflow error types

use thiserror::Error;

use super::state::StepStatus;

/// Errors that can occur while validating or running a workflow
#[derive(Debug, Clone, Error, PartialEq)]
pub enum WorkflowError {
    #[error("Workflow not found: {0}")]
    NotFound(String),

    #[error("Step not found: {0}")]
    StepNotFound(String),

    /// Missing required input or credentials; raised before any step runs
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown skill '{skill}' referenced by step '{step}'")]
    UnknownSkill { step: String, skill: String },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Step execution failed in '{step}': {message}")]
    StepExecution { step: String, message: String },

    #[error("Invalid status transition for step '{step}': {from} -> {to}")]
    InvalidTransition {
        step: String,
        from: StepStatus,
        to: StepStatus,
    },

    #[error("Workflow run cancelled")]
    Cancelled,
}

impl WorkflowError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn step_not_found(id: impl Into<String>) -> Self {
        Self::StepNotFound(id.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn unknown_skill(step: impl Into<String>, skill: impl Into<String>) -> Self {
        Self::UnknownSkill {
            step: step.into(),
            skill: skill.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn step_execution(step: impl Into<String>, message: impl Into<String>) -> Self {
        Self::StepExecution {
            step: step.into(),
            message: message.into(),
        }
    }

    /// Definition problems, as opposed to runtime backend failures
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::UnknownSkill { .. } | Self::Configuration(_) | Self::StepNotFound(_)
        )
    }

    /// Message recorded against a failed step
    pub fn step_message(&self) -> String {
        match self {
            Self::StepExecution { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

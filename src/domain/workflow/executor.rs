//! Step executor trait and run result types

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::entity::WorkflowStep;
use super::error::WorkflowError;
use super::state::{RunState, RunStatus, StepStatus};
use crate::domain::llm::Credentials;

/// Callback receiving each text fragment as it arrives
pub type FragmentObserver<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Everything a step needs from the run that is executing it
#[derive(Clone, Copy)]
pub struct StepContext<'a> {
    pub global_inputs: &'a HashMap<String, String>,
    pub outputs: &'a HashMap<String, String>,
    pub credentials: &'a Credentials,
    pub cancellation: Option<&'a CancellationToken>,
    pub on_fragment: Option<FragmentObserver<'a>>,
}

impl<'a> StepContext<'a> {
    pub fn new(
        global_inputs: &'a HashMap<String, String>,
        outputs: &'a HashMap<String, String>,
        credentials: &'a Credentials,
    ) -> Self {
        Self {
            global_inputs,
            outputs,
            credentials,
            cancellation: None,
            on_fragment: None,
        }
    }

    pub fn with_cancellation(mut self, token: &'a CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn with_observer(mut self, observer: FragmentObserver<'a>) -> Self {
        self.on_fragment = Some(observer);
        self
    }
}

/// Executes one workflow step to completion
#[async_trait]
pub trait StepExecutor: Send + Sync + std::fmt::Debug {
    /// Run `step` and return the full accumulated text of its response
    async fn execute_step(
        &self,
        step: &WorkflowStep,
        context: StepContext<'_>,
    ) -> Result<String, WorkflowError>;
}

/// Result of one step within a finished run
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub step_id: String,
    pub output_key: String,
    pub status: StepStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Zero for steps restored from an earlier run or never started
    pub execution_time_ms: u64,
}

/// Result of a finished workflow run
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowOutcome {
    pub run_id: Uuid,
    pub workflow_id: String,
    pub status: RunStatus,
    pub progress: f32,
    pub outputs: HashMap<String, String>,
    pub steps: Vec<StepOutcome>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub execution_time_ms: u64,
}

impl WorkflowOutcome {
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Output stored under `output_key`, if the producing step completed
    pub fn output(&self, output_key: &str) -> Option<&str> {
        self.outputs.get(output_key).map(String::as_str)
    }

    pub fn failed_step(&self) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.status == StepStatus::Error)
    }

    pub fn step(&self, step_id: &str) -> Option<&StepOutcome> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}

/// Collects per-step outcomes from a finished `RunState`
pub(crate) fn step_outcomes(
    steps: &[WorkflowStep],
    state: &RunState,
    timings: &HashMap<String, u64>,
) -> Vec<StepOutcome> {
    steps
        .iter()
        .map(|step| {
            let status = state.status(step.id()).unwrap_or(StepStatus::Pending);
            let output = match status {
                StepStatus::Completed => state.output(step.output_key()).map(str::to_string),
                _ => None,
            };

            StepOutcome {
                step_id: step.id().to_string(),
                output_key: step.output_key().to_string(),
                status,
                output,
                error: state.error(step.id()).map(str::to_string),
                execution_time_ms: timings.get(step.id()).copied().unwrap_or(0),
            }
        })
        .collect()
}

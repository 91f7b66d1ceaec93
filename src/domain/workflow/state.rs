//! Run-scoped execution state
//!
//! A `RunState` is created fresh for every run and owned by that run alone.
//! It enforces the step lifecycle `pending -> running -> {completed | error}`,
//! allows at most one running step, and refuses to start any step once a step
//! has failed.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::entity::Workflow;
use super::error::WorkflowError;

/// Lifecycle status of one step within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Error,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Error)
    }

    fn can_transition_to(self, next: StepStatus) -> bool {
        matches!(
            (self, next),
            (StepStatus::Pending, StepStatus::Running)
                | (StepStatus::Running, StepStatus::Completed)
                | (StepStatus::Running, StepStatus::Error)
        )
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepStatus::Pending => "pending",
            StepStatus::Running => "running",
            StepStatus::Completed => "completed",
            StepStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Terminal status of a whole run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Completed,
    Error,
    Cancelled,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunStatus::Completed => "completed",
            RunStatus::Error => "error",
            RunStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone)]
pub struct RunState {
    order: Vec<String>,
    statuses: HashMap<String, StepStatus>,
    outputs: HashMap<String, String>,
    errors: HashMap<String, String>,
    progress: f32,
    running: Option<String>,
    failed: bool,
    ran_any: bool,
}

impl RunState {
    /// Fresh state with every step of `workflow` pending
    pub fn new(workflow: &Workflow) -> Self {
        let order: Vec<String> = workflow.steps().iter().map(|s| s.id().to_string()).collect();
        let statuses = order
            .iter()
            .map(|id| (id.clone(), StepStatus::Pending))
            .collect();

        Self {
            order,
            statuses,
            outputs: HashMap::new(),
            errors: HashMap::new(),
            progress: 0.0,
            running: None,
            failed: false,
            ran_any: false,
        }
    }

    /// Mark a step as completed by an earlier run, adopting its output.
    ///
    /// Only valid before any step of this run has started.
    pub fn restore_completed(
        &mut self,
        step_id: &str,
        output_key: &str,
        output: String,
    ) -> Result<(), WorkflowError> {
        let current = self.status_of(step_id)?;

        if current != StepStatus::Pending || self.ran_any {
            return Err(WorkflowError::InvalidTransition {
                step: step_id.to_string(),
                from: current,
                to: StepStatus::Completed,
            });
        }

        self.statuses.insert(step_id.to_string(), StepStatus::Completed);
        self.outputs.insert(output_key.to_string(), output);
        Ok(())
    }

    pub fn start(&mut self, step_id: &str) -> Result<(), WorkflowError> {
        let current = self.status_of(step_id)?;

        if self.failed || self.running.is_some() {
            return Err(WorkflowError::InvalidTransition {
                step: step_id.to_string(),
                from: current,
                to: StepStatus::Running,
            });
        }

        self.transition(step_id, StepStatus::Running)?;
        self.running = Some(step_id.to_string());
        self.ran_any = true;
        Ok(())
    }

    pub fn complete(
        &mut self,
        step_id: &str,
        output_key: &str,
        output: String,
    ) -> Result<(), WorkflowError> {
        self.transition(step_id, StepStatus::Completed)?;
        self.outputs.insert(output_key.to_string(), output);
        self.running = None;
        Ok(())
    }

    pub fn fail(&mut self, step_id: &str, message: impl Into<String>) -> Result<(), WorkflowError> {
        self.transition(step_id, StepStatus::Error)?;
        self.errors.insert(step_id.to_string(), message.into());
        self.running = None;
        self.failed = true;
        Ok(())
    }

    fn transition(&mut self, step_id: &str, next: StepStatus) -> Result<(), WorkflowError> {
        let current = self.status_of(step_id)?;

        if !current.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                step: step_id.to_string(),
                from: current,
                to: next,
            });
        }

        self.statuses.insert(step_id.to_string(), next);
        Ok(())
    }

    fn status_of(&self, step_id: &str) -> Result<StepStatus, WorkflowError> {
        self.statuses
            .get(step_id)
            .copied()
            .ok_or_else(|| WorkflowError::step_not_found(step_id))
    }

    pub fn set_progress(&mut self, progress: f32) {
        self.progress = progress.clamp(0.0, 100.0);
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn status(&self, step_id: &str) -> Option<StepStatus> {
        self.statuses.get(step_id).copied()
    }

    /// Statuses in declaration order
    pub fn statuses(&self) -> Vec<(&str, StepStatus)> {
        self.order
            .iter()
            .map(|id| (id.as_str(), self.statuses[id]))
            .collect()
    }

    pub fn output(&self, output_key: &str) -> Option<&str> {
        self.outputs.get(output_key).map(String::as_str)
    }

    pub fn outputs(&self) -> &HashMap<String, String> {
        &self.outputs
    }

    pub fn error(&self, step_id: &str) -> Option<&str> {
        self.errors.get(step_id).map(String::as_str)
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    /// Whether any step of this run left `pending`
    pub fn ran_any(&self) -> bool {
        self.ran_any
    }

    pub fn running_step(&self) -> Option<&str> {
        self.running.as_deref()
    }

    pub fn all_completed(&self) -> bool {
        self.statuses.values().all(|s| *s == StepStatus::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{WorkflowId, WorkflowStep};

    fn workflow() -> Workflow {
        Workflow::new(WorkflowId::new("w").unwrap(), "W")
            .with_step(WorkflowStep::new("a", "skill", "out-a"))
            .with_step(WorkflowStep::new("b", "skill", "out-b"))
            .with_step(WorkflowStep::new("c", "skill", "out-c"))
    }

    #[test]
    fn test_initial_state_all_pending() {
        let state = RunState::new(&workflow());

        let statuses: Vec<StepStatus> = state.statuses().into_iter().map(|(_, s)| s).collect();
        assert_eq!(statuses, vec![StepStatus::Pending; 3]);
        assert!(!state.ran_any());
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut state = RunState::new(&workflow());

        state.start("a").unwrap();
        assert_eq!(state.running_step(), Some("a"));
        state.complete("a", "out-a", "text".to_string()).unwrap();

        assert_eq!(state.status("a"), Some(StepStatus::Completed));
        assert_eq!(state.output("out-a"), Some("text"));
        assert!(state.running_step().is_none());
    }

    #[test]
    fn test_only_one_running_step() {
        let mut state = RunState::new(&workflow());

        state.start("a").unwrap();
        assert!(state.start("b").is_err());
    }

    #[test]
    fn test_status_never_reverses() {
        let mut state = RunState::new(&workflow());

        state.start("a").unwrap();
        state.complete("a", "out-a", String::new()).unwrap();

        assert!(state.start("a").is_err());
        assert!(state.fail("a", "late").is_err());
        assert_eq!(state.status("a"), Some(StepStatus::Completed));
    }

    #[test]
    fn test_no_step_starts_after_failure() {
        let mut state = RunState::new(&workflow());

        state.start("a").unwrap();
        state.fail("a", "HTTP 500").unwrap();

        assert!(state.start("b").is_err());
        assert_eq!(state.status("b"), Some(StepStatus::Pending));
        assert_eq!(state.error("a"), Some("HTTP 500"));
        assert!(state.has_failed());
    }

    #[test]
    fn test_complete_requires_running() {
        let mut state = RunState::new(&workflow());
        assert!(state.complete("a", "out-a", String::new()).is_err());
    }

    #[test]
    fn test_unknown_step() {
        let mut state = RunState::new(&workflow());
        assert_eq!(
            state.start("zzz"),
            Err(WorkflowError::step_not_found("zzz"))
        );
    }

    #[test]
    fn test_restore_completed_before_run() {
        let mut state = RunState::new(&workflow());

        state
            .restore_completed("a", "out-a", "earlier".to_string())
            .unwrap();
        assert_eq!(state.status("a"), Some(StepStatus::Completed));
        assert_eq!(state.output("out-a"), Some("earlier"));

        state.start("b").unwrap();
        assert!(state
            .restore_completed("c", "out-c", String::new())
            .is_err());
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut state = RunState::new(&workflow());

        state.set_progress(150.0);
        assert_eq!(state.progress(), 100.0);
    }
}

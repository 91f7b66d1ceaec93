//! Workflow domain module
//!
//! A workflow chains skill invocations into sequential steps. Each step's
//! skill inputs are derived through input mappings:
//! - `global` - a workflow global input
//! - `previous` - the output of an earlier step, by output key
//! - `static` - a literal value
//! - `computed` - a `{{name}}` template over globals and outputs so far
//!
//! Execution state lives in a run-scoped `RunState`; steps run one at a time
//! and the first failing step halts the run.

mod entity;
mod error;
mod event;
mod executor;
mod lint;
mod mapping;
mod state;

pub use entity::{validate_workflow_id, GlobalInput, Workflow, WorkflowId, WorkflowStep, MAX_ID_LENGTH};
pub use error::WorkflowError;
pub use event::{ChannelSink, EventSink, NoopSink, WorkflowEvent};
pub(crate) use executor::step_outcomes;
pub use executor::{FragmentObserver, StepContext, StepExecutor, StepOutcome, WorkflowOutcome};
pub use lint::{lint_workflow, DefinitionIssue, Severity};
pub use mapping::{resolve_input, InputMapping};
pub use state::{RunState, RunStatus, StepStatus};

#[cfg(test)]
pub use event::recording::RecordingSink;

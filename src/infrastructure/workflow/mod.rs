//! Workflow execution: step executor, sequential runner and batch runner

mod batch;
mod runner;
mod step_executor;

pub use batch::{
    export_results_csv, parse_csv_rows, BatchItem, BatchItemStatus, BatchReport, BatchRunner,
    BatchSummary, DEFAULT_BATCH_CONCURRENCY,
};
pub use runner::{WorkflowRunner, DEFAULT_STEP_DELAY};
pub use step_executor::{resolve_skill_inputs, SkillStepExecutor};

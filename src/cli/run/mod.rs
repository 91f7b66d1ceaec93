//! Run command - executes one workflow, printing events as they happen

use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::{Credentials, EventSink, RunStatus, WorkflowEvent};
use crate::infrastructure::DefinitionSet;

/// Arguments for the run command
#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// JSON file holding skill and workflow definitions
    #[arg(long)]
    pub definitions: PathBuf,

    /// Workflow to run
    #[arg(long)]
    pub workflow: String,

    /// Global input value, repeatable
    #[arg(long = "input", value_name = "KEY=VALUE", value_parser = super::parse_key_value)]
    pub inputs: Vec<(String, String)>,

    /// Emit one JSON object per event instead of readable text
    #[arg(long)]
    pub json: bool,
}

/// Run the workflow named in `args`
pub async fn run(args: RunArgs) -> anyhow::Result<()> {
    let config = super::bootstrap()?;
    let definitions = DefinitionSet::from_file(&args.definitions)?;
    let workflow = definitions.workflow(&args.workflow)?;
    let runner = super::build_runner(&config, &definitions)?;

    let inputs: HashMap<String, String> = args.inputs.into_iter().collect();
    let credentials = Credentials::from_env();

    let token = CancellationToken::new();
    let watcher = tokio::spawn(cancel_on_ctrl_c(token.clone()));

    let sink = ConsoleSink { json: args.json };
    let result = runner
        .run_with_cancellation(workflow, &inputs, &credentials, &token, &sink)
        .await;

    watcher.abort();

    let outcome = result?;
    info!(
        run_id = %outcome.run_id,
        status = %outcome.status,
        execution_time_ms = outcome.execution_time_ms,
        "Run complete"
    );

    match outcome.status {
        RunStatus::Completed => Ok(()),
        status => anyhow::bail!("workflow '{}' finished with status {}", workflow.id(), status),
    }
}

async fn cancel_on_ctrl_c(token: CancellationToken) {
    if signal::ctrl_c().await.is_ok() {
        warn!("Received Ctrl+C, cancelling run");
        token.cancel();
    }
}

/// Prints events to stdout
#[derive(Debug)]
struct ConsoleSink {
    json: bool,
}

impl ConsoleSink {
    fn print_text(&self, event: &WorkflowEvent) {
        let mut out = std::io::stdout().lock();

        let _ = match event {
            WorkflowEvent::RunStarted {
                workflow_id,
                total_steps,
                ..
            } => writeln!(out, "Running '{}' ({} steps)", workflow_id, total_steps),
            WorkflowEvent::ValidationFailed { error } => writeln!(out, "Cannot start: {}", error),
            WorkflowEvent::StepStarted {
                step_id, progress, ..
            } => writeln!(out, "\n[{:>3.0}%] {}", progress, step_id),
            WorkflowEvent::Fragment { text, .. } => write!(out, "{}", text),
            WorkflowEvent::StepCompleted { output_key, .. } => {
                writeln!(out, "\n  -> stored as '{}'", output_key)
            }
            WorkflowEvent::StepFailed { step_id, error } => {
                writeln!(out, "\n  !! {} failed: {}", step_id, error)
            }
            WorkflowEvent::RunFinished { status, progress } => {
                writeln!(out, "\n[{:>3.0}%] {}", progress, status)
            }
        };

        let _ = out.flush();
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: WorkflowEvent) {
        if !self.json {
            self.print_text(&event);
            return;
        }

        match serde_json::to_string(&event) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!(error = %e, "Failed to serialize event"),
        }
    }
}

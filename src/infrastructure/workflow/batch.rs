//! Batch execution of one workflow over many input rows

use std::collections::HashMap;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::runner::WorkflowRunner;
use crate::config::RunnerConfig;
use crate::domain::{Credentials, NoopSink, RunStatus, Workflow, WorkflowOutcome};

pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Final state of one batch row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchItemStatus {
    Completed,
    Error,
    Cancelled,
}

impl BatchItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchItemStatus::Completed => "completed",
            BatchItemStatus::Error => "error",
            BatchItemStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchItem {
    pub index: usize,
    pub inputs: HashMap<String, String>,
    pub status: BatchItemStatus,

    /// Absent when the run was rejected or never started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<WorkflowOutcome>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    fn cancelled(index: usize, inputs: HashMap<String, String>) -> Self {
        Self {
            index,
            inputs,
            status: BatchItemStatus::Cancelled,
            outcome: None,
            error: None,
        }
    }

    pub fn output(&self, output_key: &str) -> Option<&str> {
        self.outcome.as_ref().and_then(|o| o.output(output_key))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub cancelled: usize,
    /// Percentage of rows that completed
    pub success_rate: f32,
    /// Mean run time of completed rows
    pub avg_duration_ms: u64,
    pub execution_time_ms: u64,
}

impl BatchSummary {
    fn from_items(items: &[BatchItem], execution_time_ms: u64) -> Self {
        let count = |status: BatchItemStatus| items.iter().filter(|i| i.status == status).count();
        let completed = count(BatchItemStatus::Completed);

        let durations: Vec<u64> = items
            .iter()
            .filter(|i| i.status == BatchItemStatus::Completed)
            .filter_map(|i| i.outcome.as_ref().map(|o| o.execution_time_ms))
            .collect();

        let success_rate = match items.len() {
            0 => 0.0,
            total => completed as f32 / total as f32 * 100.0,
        };

        let avg_duration_ms = match durations.len() {
            0 => 0,
            n => durations.iter().sum::<u64>() / n as u64,
        };

        Self {
            total: items.len(),
            completed,
            failed: count(BatchItemStatus::Error),
            cancelled: count(BatchItemStatus::Cancelled),
            success_rate,
            avg_duration_ms,
            execution_time_ms,
        }
    }
}

/// Per-row results in input order plus their summary
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
    pub summary: BatchSummary,
}

/// Runs a workflow once per input row with bounded concurrency
#[derive(Debug, Clone)]
pub struct BatchRunner {
    runner: WorkflowRunner,
    concurrency: usize,
}

impl BatchRunner {
    pub fn new(runner: WorkflowRunner) -> Self {
        Self {
            runner,
            concurrency: DEFAULT_BATCH_CONCURRENCY,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_config(self, config: &RunnerConfig) -> Self {
        self.with_concurrency(config.batch_concurrency)
    }

    /// Run `workflow` for every row.
    ///
    /// Rows not yet started when `token` is cancelled are reported as
    /// cancelled; rows already running stop at their next cancellation point.
    pub async fn run(
        &self,
        workflow: &Workflow,
        rows: Vec<HashMap<String, String>>,
        credentials: &Credentials,
        token: &CancellationToken,
    ) -> BatchReport {
        let clock = Instant::now();
        let total = rows.len();

        info!(
            workflow_id = %workflow.id(),
            rows = total,
            concurrency = self.concurrency,
            "Starting batch"
        );

        let mut items: Vec<BatchItem> = stream::iter(rows.into_iter().enumerate())
            .map(|(index, inputs)| self.run_item(workflow, index, inputs, credentials, token))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        items.sort_by_key(|item| item.index);

        let summary = BatchSummary::from_items(&items, clock.elapsed().as_millis() as u64);

        info!(
            workflow_id = %workflow.id(),
            completed = summary.completed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "Batch finished"
        );

        BatchReport { items, summary }
    }

    async fn run_item(
        &self,
        workflow: &Workflow,
        index: usize,
        inputs: HashMap<String, String>,
        credentials: &Credentials,
        token: &CancellationToken,
    ) -> BatchItem {
        if token.is_cancelled() {
            debug!(row = index, "Batch cancelled, skipping row");
            return BatchItem::cancelled(index, inputs);
        }

        let result = self
            .runner
            .run_with_cancellation(workflow, &inputs, credentials, token, &NoopSink)
            .await;

        match result {
            Ok(outcome) => {
                let status = match outcome.status {
                    RunStatus::Completed => BatchItemStatus::Completed,
                    RunStatus::Error => BatchItemStatus::Error,
                    RunStatus::Cancelled => BatchItemStatus::Cancelled,
                };
                let error = outcome
                    .failed_step()
                    .and_then(|step| step.error.clone());

                debug!(row = index, status = status.as_str(), "Batch row finished");

                BatchItem {
                    index,
                    inputs,
                    status,
                    outcome: Some(outcome),
                    error,
                }
            }
            Err(e) => {
                debug!(row = index, error = %e, "Batch row rejected");

                BatchItem {
                    index,
                    inputs,
                    status: BatchItemStatus::Error,
                    outcome: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

/// Parse CSV text into input rows.
///
/// The first non-blank line is the header. `column_mapping` maps CSV column
/// names to global input ids; when empty, every column maps to the input of
/// the same name. Only non-empty mapped values are kept and rows that end up
/// with no values are dropped.
pub fn parse_csv_rows(
    text: &str,
    column_mapping: &HashMap<String, String>,
) -> Vec<HashMap<String, String>> {
    let mut lines = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty());

    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let headers = parse_csv_line(header);

    let columns: Vec<(usize, String)> = if column_mapping.is_empty() {
        headers
            .iter()
            .enumerate()
            .filter(|(_, name)| !name.is_empty())
            .map(|(index, name)| (index, name.clone()))
            .collect()
    } else {
        column_mapping
            .iter()
            .filter_map(|(column, input_id)| {
                headers
                    .iter()
                    .position(|h| h == column)
                    .map(|index| (index, input_id.clone()))
            })
            .collect()
    };

    lines
        .map(|line| {
            let values = parse_csv_line(line);

            columns
                .iter()
                .filter_map(|(index, input_id)| {
                    values
                        .get(*index)
                        .filter(|v| !v.is_empty())
                        .map(|v| (input_id.clone(), v.clone()))
                })
                .collect::<HashMap<_, _>>()
        })
        .filter(|row| !row.is_empty())
        .collect()
}

/// Split one CSV line, honouring double quotes and `""` escapes
fn parse_csv_line(line: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                current.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }

    values.push(current.trim().to_string());
    values
}

/// Render batch results as CSV: one row per item with its inputs and step outputs
pub fn export_results_csv(workflow: &Workflow, items: &[BatchItem]) -> String {
    let mut header = vec!["Row".to_string(), "Status".to_string()];
    header.extend(
        workflow
            .global_inputs()
            .iter()
            .map(|input| escape_csv(&format!("Input: {}", input.label))),
    );
    header.extend(
        workflow
            .steps()
            .iter()
            .map(|step| escape_csv(&format!("Output: {}", step.name()))),
    );
    header.push("Error".to_string());

    let mut lines = vec![header.join(",")];

    for item in items {
        let mut row = vec![(item.index + 1).to_string(), item.status.as_str().to_string()];
        row.extend(workflow.global_inputs().iter().map(|input| {
            escape_csv(item.inputs.get(&input.id).map(String::as_str).unwrap_or(""))
        }));
        row.extend(
            workflow
                .steps()
                .iter()
                .map(|step| escape_csv(item.output(step.output_key()).unwrap_or(""))),
        );
        row.push(escape_csv(item.error.as_deref().unwrap_or("")));

        lines.push(row.join(","));
    }

    lines.join("\n")
}

fn escape_csv(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

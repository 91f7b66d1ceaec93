//! Sequential workflow runner

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::RunnerConfig;
use crate::domain::workflow::step_outcomes;
use crate::domain::{
    ChannelSink, Credentials, EventSink, RunState, RunStatus, SkillRegistry, StepContext,
    StepExecutor, Workflow, WorkflowError, WorkflowEvent, WorkflowOutcome, WorkflowStep,
};

pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(300);

/// Where a run begins
#[derive(Debug, Clone, Copy)]
enum StartPoint<'a> {
    First,
    Resume {
        step_id: &'a str,
        prior_outputs: &'a HashMap<String, String>,
    },
}

/// Runs workflow steps one at a time, halting on the first failure
#[derive(Debug, Clone)]
pub struct WorkflowRunner {
    executor: Arc<dyn StepExecutor>,
    skills: Arc<dyn SkillRegistry>,
    step_delay: Duration,
}

impl WorkflowRunner {
    pub fn new(executor: Arc<dyn StepExecutor>, skills: Arc<dyn SkillRegistry>) -> Self {
        Self {
            executor,
            skills,
            step_delay: DEFAULT_STEP_DELAY,
        }
    }

    /// Pause inserted between consecutive steps
    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn with_config(self, config: &RunnerConfig) -> Self {
        self.with_step_delay(config.step_delay())
    }

    /// Run every step of `workflow` in declaration order.
    ///
    /// Returns `Err` only when the run is rejected before any step starts.
    /// A failing step yields `Ok` with `RunStatus::Error`.
    pub async fn run(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        credentials: &Credentials,
        sink: &dyn EventSink,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.execute(workflow, inputs, credentials, StartPoint::First, None, sink)
            .await
    }

    /// Like `run`, stopping early once `token` is cancelled
    pub async fn run_with_cancellation(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        credentials: &Credentials,
        token: &CancellationToken,
        sink: &dyn EventSink,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        self.execute(
            workflow,
            inputs,
            credentials,
            StartPoint::First,
            Some(token),
            sink,
        )
        .await
    }

    /// Re-run `workflow` starting at `step_id`.
    ///
    /// Steps before `step_id` count as completed; their outputs are taken from
    /// `prior_outputs`, which must hold every one of their output keys.
    pub async fn resume_from(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        credentials: &Credentials,
        prior_outputs: &HashMap<String, String>,
        step_id: &str,
        sink: &dyn EventSink,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let start = StartPoint::Resume {
            step_id,
            prior_outputs,
        };

        self.execute(workflow, inputs, credentials, start, None, sink)
            .await
    }

    /// Spawn a run and stream its events; the stream ends after the terminal event
    pub fn run_stream(
        &self,
        workflow: Workflow,
        inputs: HashMap<String, String>,
        credentials: Credentials,
    ) -> impl Stream<Item = WorkflowEvent> + Send + 'static {
        let (sink, receiver) = ChannelSink::channel();
        let runner = self.clone();

        tokio::spawn(async move {
            if let Err(e) = runner.run(&workflow, &inputs, &credentials, &sink).await {
                debug!(workflow_id = %workflow.id(), error = %e, "Streamed run rejected");
            }
        });

        UnboundedReceiverStream::new(receiver)
    }

    async fn execute(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        credentials: &Credentials,
        start: StartPoint<'_>,
        cancellation: Option<&CancellationToken>,
        sink: &dyn EventSink,
    ) -> Result<WorkflowOutcome, WorkflowError> {
        let (values, mut state, first) =
            match self.prepare(workflow, inputs, credentials, start).await {
                Ok(prepared) => prepared,
                Err(e) => {
                    warn!(workflow_id = %workflow.id(), error = %e, "Workflow run rejected");
                    sink.emit(WorkflowEvent::ValidationFailed {
                        error: e.to_string(),
                    });
                    return Err(e);
                }
            };

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let steps = workflow.steps();
        let total = steps.len();

        info!(
            run_id = %run_id,
            workflow_id = %workflow.id(),
            total_steps = total,
            first_step = first,
            "Starting workflow run"
        );

        sink.emit(WorkflowEvent::RunStarted {
            run_id: run_id.to_string(),
            workflow_id: workflow.id().to_string(),
            total_steps: total,
        });

        let mut timings = HashMap::new();
        let mut cancelled = false;
        let mut broken: Option<(String, WorkflowError)> = None;

        for (index, step) in steps.iter().enumerate().skip(first) {
            if index > first && !self.pause(cancellation).await {
                cancelled = true;
                break;
            }

            if cancellation.is_some_and(CancellationToken::is_cancelled) {
                cancelled = true;
                break;
            }

            let progress = index as f32 / total as f32 * 100.0;
            if let Err(e) = state.start(step.id()) {
                broken = Some((step.id().to_string(), e));
                break;
            }
            state.set_progress(progress);

            debug!(step_id = %step.id(), index, progress, "Starting step");
            sink.emit(WorkflowEvent::StepStarted {
                step_id: step.id().to_string(),
                index,
                progress,
            });

            let step_clock = Instant::now();
            let result = self
                .run_step(step, &values, &state, credentials, cancellation, sink)
                .await;
            timings.insert(step.id().to_string(), step_clock.elapsed().as_millis() as u64);

            match result {
                Ok(text) => {
                    if let Err(e) = state.complete(step.id(), step.output_key(), text.clone()) {
                        broken = Some((step.id().to_string(), e));
                        break;
                    }

                    debug!(
                        step_id = %step.id(),
                        output_key = %step.output_key(),
                        chars = text.chars().count(),
                        "Step completed"
                    );
                    sink.emit(WorkflowEvent::StepCompleted {
                        step_id: step.id().to_string(),
                        output_key: step.output_key().to_string(),
                        text,
                    });
                }
                Err(e) => {
                    let message = e.step_message();
                    if let Err(e) = state.fail(step.id(), &message) {
                        broken = Some((step.id().to_string(), e));
                        break;
                    }
                    cancelled = e == WorkflowError::Cancelled;

                    warn!(step_id = %step.id(), error = %message, "Step failed, halting workflow");
                    sink.emit(WorkflowEvent::StepFailed {
                        step_id: step.id().to_string(),
                        error: message,
                    });
                    break;
                }
            }
        }

        if let Some((step_id, e)) = &broken {
            error!(step_id = %step_id, error = %e, "Step state is inconsistent, halting workflow");
            sink.emit(WorkflowEvent::StepFailed {
                step_id: step_id.clone(),
                error: e.to_string(),
            });
        }

        if state.ran_any() {
            state.set_progress(100.0);
        }

        let status = if broken.is_some() {
            RunStatus::Error
        } else if cancelled {
            RunStatus::Cancelled
        } else if state.all_completed() {
            RunStatus::Completed
        } else {
            RunStatus::Error
        };

        let execution_time_ms = clock.elapsed().as_millis() as u64;

        info!(
            run_id = %run_id,
            workflow_id = %workflow.id(),
            status = %status,
            execution_time_ms,
            "Workflow run finished"
        );

        sink.emit(WorkflowEvent::RunFinished {
            status,
            progress: state.progress(),
        });

        Ok(WorkflowOutcome {
            run_id,
            workflow_id: workflow.id().to_string(),
            status,
            progress: state.progress(),
            outputs: state.outputs().clone(),
            steps: step_outcomes(steps, &state, &timings),
            started_at,
            finished_at: Utc::now(),
            execution_time_ms,
        })
    }

    async fn run_step(
        &self,
        step: &WorkflowStep,
        values: &HashMap<String, String>,
        state: &RunState,
        credentials: &Credentials,
        cancellation: Option<&CancellationToken>,
        sink: &dyn EventSink,
    ) -> Result<String, WorkflowError> {
        let forward = |text: &str| {
            sink.emit(WorkflowEvent::Fragment {
                step_id: step.id().to_string(),
                text: text.to_string(),
            })
        };

        let mut context =
            StepContext::new(values, state.outputs(), credentials).with_observer(&forward);
        if let Some(token) = cancellation {
            context = context.with_cancellation(token);
        }

        self.executor.execute_step(step, context).await
    }

    /// Check inputs, skills and credentials; nothing runs if any check fails.
    ///
    /// Yields the effective global inputs, the initial state and the index of
    /// the first step to run.
    async fn prepare(
        &self,
        workflow: &Workflow,
        inputs: &HashMap<String, String>,
        credentials: &Credentials,
        start: StartPoint<'_>,
    ) -> Result<(HashMap<String, String>, RunState, usize), WorkflowError> {
        if workflow.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Workflow '{}' has no steps",
                workflow.id()
            )));
        }

        let mut seen = BTreeSet::new();
        let duplicates: BTreeSet<&str> = workflow
            .steps()
            .iter()
            .map(WorkflowStep::id)
            .filter(|id| !seen.insert(*id))
            .collect();

        if !duplicates.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Duplicate step ids in workflow '{}': {}",
                workflow.id(),
                duplicates.into_iter().collect::<Vec<_>>().join(", ")
            )));
        }

        let values = workflow.effective_inputs(inputs);
        let missing: Vec<&str> = workflow
            .missing_required_inputs(&values)
            .into_iter()
            .map(|input| input.label.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(WorkflowError::validation(format!(
                "Missing required inputs: {}",
                missing.join(", ")
            )));
        }

        let mut state = RunState::new(workflow);
        let first = match start {
            StartPoint::First => 0,
            StartPoint::Resume {
                step_id,
                prior_outputs,
            } => restore_prior_steps(workflow, &mut state, step_id, prior_outputs)?,
        };

        let mut backends = BTreeSet::new();
        for step in &workflow.steps()[first..] {
            let skill = self
                .skills
                .get(step.skill_id())
                .await
                .map_err(|e| WorkflowError::configuration(e.to_string()))?
                .ok_or_else(|| WorkflowError::unknown_skill(step.id(), step.skill_id()))?;

            backends.insert(skill.config.backend);
        }

        if let Some(backend) = backends.into_iter().find(|b| !credentials.has(*b)) {
            return Err(WorkflowError::validation(format!(
                "API key is missing for {}",
                backend
            )));
        }

        Ok((values, state, first))
    }

    /// Sleep between steps; `false` if cancelled while waiting
    async fn pause(&self, cancellation: Option<&CancellationToken>) -> bool {
        if self.step_delay.is_zero() {
            return true;
        }

        match cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => false,
                _ = tokio::time::sleep(self.step_delay) => true,
            },
            None => {
                tokio::time::sleep(self.step_delay).await;
                true
            }
        }
    }
}

fn restore_prior_steps(
    workflow: &Workflow,
    state: &mut RunState,
    step_id: &str,
    prior_outputs: &HashMap<String, String>,
) -> Result<usize, WorkflowError> {
    let first = workflow
        .step_index(step_id)
        .ok_or_else(|| WorkflowError::step_not_found(step_id))?;

    for step in &workflow.steps()[..first] {
        let output = prior_outputs.get(step.output_key()).ok_or_else(|| {
            WorkflowError::validation(format!(
                "Cannot resume at '{}': output '{}' of step '{}' is missing",
                step_id,
                step.output_key(),
                step.id()
            ))
        })?;

        state.restore_completed(step.id(), step.output_key(), output.clone())?;
    }

    Ok(first)
}

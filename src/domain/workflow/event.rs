//! Progress events emitted while a workflow runs

use std::fmt::Debug;

use serde::Serialize;
use tokio::sync::mpsc;

use super::state::RunStatus;

/// Observable progress of one workflow run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    RunStarted {
        run_id: String,
        workflow_id: String,
        total_steps: usize,
    },
    /// Pre-run validation failed; no step was started
    ValidationFailed { error: String },
    StepStarted {
        step_id: String,
        index: usize,
        progress: f32,
    },
    /// Incremental text from the running step
    Fragment { step_id: String, text: String },
    StepCompleted {
        step_id: String,
        output_key: String,
        text: String,
    },
    StepFailed { step_id: String, error: String },
    RunFinished { status: RunStatus, progress: f32 },
}

impl WorkflowEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::ValidationFailed { .. } | WorkflowEvent::RunFinished { .. }
        )
    }
}

/// Receiver of workflow events
pub trait EventSink: Send + Sync + Debug {
    fn emit(&self, event: WorkflowEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: WorkflowEvent) {}
}

/// Forwards events into an unbounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<WorkflowEvent>,
}

impl ChannelSink {
    pub fn new(sender: mpsc::UnboundedSender<WorkflowEvent>) -> Self {
        Self { sender }
    }

    /// Sink plus the receiving end of its channel
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<WorkflowEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self::new(sender), receiver)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: WorkflowEvent) {
        // A dropped receiver only means nobody is watching anymore
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
pub mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Sink keeping every event in memory
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        events: Mutex<Vec<WorkflowEvent>>,
    }

    impl RecordingSink {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn events(&self) -> Vec<WorkflowEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: WorkflowEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut receiver) = ChannelSink::channel();

        sink.emit(WorkflowEvent::StepFailed {
            step_id: "s1".to_string(),
            error: "boom".to_string(),
        });

        let event = receiver.recv().await.unwrap();
        assert!(matches!(event, WorkflowEvent::StepFailed { ref step_id, .. } if step_id == "s1"));
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, receiver) = ChannelSink::channel();
        drop(receiver);

        sink.emit(WorkflowEvent::ValidationFailed {
            error: "missing".to_string(),
        });
    }

    #[test]
    fn test_event_serialization() {
        let event = WorkflowEvent::RunFinished {
            status: RunStatus::Completed,
            progress: 100.0,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"event": "run_finished", "status": "completed", "progress": 100.0})
        );
        assert!(event.is_terminal());
    }
}

//! Submitted job record and its status state machine.

use serde::Serialize;

use crate::error::CoreError;
use crate::types::Timestamp;

/// Lifecycle of a submitted job.
///
/// Transitions only move forward: `Pending -> Running -> terminal`, with
/// `Pending` allowed to jump straight to a terminal state. Terminal states
/// never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    TimedOut,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Whether moving from `self` to `next` is a legal forward step.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        match self {
            Self::Pending => next != Self::Pending,
            Self::Running => next.is_terminal(),
            Self::Completed | Self::Failed | Self::TimedOut => false,
        }
    }
}

/// A job accepted by the backend.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Backend-assigned prompt ID.
    id: String,
    /// Template as it was submitted, slots already bound.
    submitted_template: serde_json::Value,
    status: JobStatus,
    /// Per-node output map, set once the job completes.
    outputs: Option<serde_json::Value>,
    submitted_at: Timestamp,
    finished_at: Option<Timestamp>,
}

impl Job {
    /// Record a freshly submitted job in the `Pending` state.
    pub fn submitted(id: impl Into<String>, submitted_template: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            submitted_template,
            status: JobStatus::Pending,
            outputs: None,
            submitted_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn submitted_template(&self) -> &serde_json::Value {
        &self.submitted_template
    }

    pub fn outputs(&self) -> Option<&serde_json::Value> {
        self.outputs.as_ref()
    }

    pub fn submitted_at(&self) -> Timestamp {
        self.submitted_at
    }

    pub fn finished_at(&self) -> Option<Timestamp> {
        self.finished_at
    }

    /// Advance the status, rejecting regressions and repeated terminal moves.
    ///
    /// Re-entering `Running` while already running is a no-op.
    pub fn transition(&mut self, next: JobStatus) -> Result<(), CoreError> {
        if self.status == JobStatus::Running && next == JobStatus::Running {
            return Ok(());
        }
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.finished_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    /// Mark the job completed and keep its outputs.
    pub fn complete(&mut self, outputs: serde_json::Value) -> Result<(), CoreError> {
        self.transition(JobStatus::Completed)?;
        self.outputs = Some(outputs);
        Ok(())
    }
}

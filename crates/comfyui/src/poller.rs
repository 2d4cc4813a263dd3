//! Fixed-interval completion polling against `/history/{prompt_id}`.
//!
//! The backend has no explicit "done" flag: a job is complete once its
//! history record carries a non-empty `outputs` map. A record whose
//! `status.status_str` is `"error"` is treated as a failure. Anything else,
//! including failed status queries, counts as "still running" until the
//! deadline elapses. The deadline is a hard bound: a query still in flight
//! when it passes is abandoned.

use std::sync::Arc;

use forge3d_core::job::{Job, JobStatus};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::backend::ComfyBackend;
use crate::config::PollConfig;
use crate::error::PipelineError;

/// `status.status_str` value ComfyUI uses for failed executions.
const STATUS_ERROR: &str = "error";

/// What a single history response says about a job.
#[derive(Debug, PartialEq)]
pub enum RecordState {
    /// Outputs are present.
    Completed(serde_json::Value),
    /// The backend reported an execution error.
    Failed(serde_json::Value),
    /// No verdict yet.
    Waiting,
}

/// Interpret a `/history/{prompt_id}` response for `prompt_id`.
///
/// Outputs take precedence over an error status, since nodes that ran
/// before the failure may still have produced the artifact.
pub fn inspect_record(history: &serde_json::Value, prompt_id: &str) -> RecordState {
    let Some(record) = history.get(prompt_id) else {
        return RecordState::Waiting;
    };

    if let Some(outputs) = record.get("outputs").filter(|o| is_non_empty(o)) {
        return RecordState::Completed(outputs.clone());
    }

    let status = record.get("status");
    let failed = status
        .and_then(|s| s.get("status_str"))
        .and_then(|s| s.as_str())
        == Some(STATUS_ERROR);
    if failed {
        let details = status
            .and_then(|s| s.get("messages"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        return RecordState::Failed(details);
    }

    RecordState::Waiting
}

fn is_non_empty(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

/// Waits for a submitted job to produce outputs.
pub struct CompletionPoller {
    backend: Arc<dyn ComfyBackend>,
    config: PollConfig,
}

impl CompletionPoller {
    pub fn new(backend: Arc<dyn ComfyBackend>, config: PollConfig) -> Self {
        Self { backend, config }
    }

    /// Poll until outputs appear, the backend reports a failure, the
    /// deadline elapses, or `cancel` fires.
    ///
    /// Drives `job` through its status transitions and returns the
    /// per-node output map on success.
    pub async fn await_completion(
        &self,
        job: &mut Job,
        cancel: &CancellationToken,
    ) -> Result<serde_json::Value, PipelineError> {
        let started = Instant::now();
        let deadline = started + self.config.timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            // A stalled query must not outlive the deadline.
            let history = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(self.cancelled(job)),
                result = self.backend.get_history(job.id()) => Some(result),
                _ = tokio::time::sleep_until(deadline) => None,
            };
            let Some(history) = history else {
                return Err(self.timed_out(job, attempt));
            };

            match history {
                Ok(history) => {
                    job.transition(JobStatus::Running)?;
                    match inspect_record(&history, job.id()) {
                        RecordState::Completed(outputs) => {
                            job.complete(outputs.clone())?;
                            tracing::info!(
                                prompt_id = %job.id(),
                                attempt,
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "Job produced outputs",
                            );
                            return Ok(outputs);
                        }
                        RecordState::Failed(details) => {
                            job.transition(JobStatus::Failed)?;
                            tracing::error!(
                                prompt_id = %job.id(),
                                details = %details,
                                "ComfyUI reported an execution error",
                            );
                            return Err(PipelineError::JobFailed {
                                job_id: job.id().to_string(),
                                details,
                            });
                        }
                        RecordState::Waiting => {
                            tracing::debug!(prompt_id = %job.id(), attempt, "Job still running");
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        prompt_id = %job.id(),
                        attempt,
                        error = %e,
                        "History query failed, will retry",
                    );
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(self.timed_out(job, attempt));
            }

            // Never sleep past the deadline.
            let pause = self.config.interval.min(remaining);
            tokio::select! {
                _ = cancel.cancelled() => return Err(self.cancelled(job)),
                _ = tokio::time::sleep(pause) => {}
            }
        }
    }

    fn timed_out(&self, job: &mut Job, attempt: u32) -> PipelineError {
        if let Err(e) = job.transition(JobStatus::TimedOut) {
            return e.into();
        }
        tracing::warn!(
            prompt_id = %job.id(),
            attempt,
            timeout_secs = self.config.timeout.as_secs(),
            "Job timed out",
        );
        PipelineError::JobTimedOut {
            job_id: job.id().to_string(),
            timeout_secs: self.config.timeout.as_secs(),
        }
    }

    fn cancelled(&self, job: &Job) -> PipelineError {
        tracing::info!(prompt_id = %job.id(), "Polling cancelled");
        PipelineError::Cancelled {
            job_id: job.id().to_string(),
        }
    }
}

use std::path::PathBuf;

use crate::job::JobStatus;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Job template not found at {path}: {reason}")]
    TemplateNotFound { path: PathBuf, reason: String },

    #[error("Job template is malformed: {0}")]
    TemplateMalformed(String),

    #[error("Slot '{0}' is not present in the job template")]
    UnknownSlot(String),

    #[error("Slot '{slot}' cannot be bound: {reason}")]
    InvalidSlot { slot: String, reason: String },

    #[error("Invalid job status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: JobStatus, to: JobStatus },
}

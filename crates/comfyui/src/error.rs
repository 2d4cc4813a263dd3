use forge3d_core::error::CoreError;

/// Failures of the image-to-3D workflow.
///
/// Every variant aborts the remaining stages of the job. Nothing is
/// retried automatically.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Template loading or slot binding failed.
    #[error(transparent)]
    Template(#[from] CoreError),

    /// The backend declined an input asset.
    #[error("ComfyUI upload failed for {file}: {reason}")]
    StagingRejected { file: String, reason: String },

    /// The backend answered `/prompt` with an error status.
    #[error("ComfyUI rejected the workflow: {body}")]
    SubmissionRejected { status: Option<u16>, body: String },

    /// The backend accepted the workflow but returned no prompt ID.
    #[error("ComfyUI did not return a prompt_id")]
    SubmissionIncomplete,

    /// No outputs appeared before the deadline.
    #[error("Job {job_id} timed out after {timeout_secs}s without producing outputs")]
    JobTimedOut { job_id: String, timeout_secs: u64 },

    /// The backend reported an explicit execution error.
    #[error("Job {job_id} failed: {details}")]
    JobFailed {
        job_id: String,
        details: serde_json::Value,
    },

    /// Waiting was aborted by the caller.
    #[error("Job {job_id} was cancelled while waiting for completion")]
    Cancelled { job_id: String },

    /// The global output listing could not be retrieved.
    #[error("Could not list output files: {0}")]
    OutputListingFailed(String),

    /// The job completed but no recognizable 3D artifact was found.
    #[error("3D model was generated but not found in outputs of job {job_id}")]
    ArtifactNotFound { job_id: String },

    /// The artifact download was refused or could not be persisted.
    #[error("Could not download model {filename}: {reason}")]
    DownloadFailed { filename: String, reason: String },

    /// Local filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

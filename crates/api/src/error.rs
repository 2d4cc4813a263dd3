use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge3d_comfyui::error::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps [`PipelineError`] for job failures and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A job workflow failure from `forge3d_comfyui`.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Pipeline(err) => classify_pipeline_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// Classify a pipeline error into an HTTP status, error code, and message.
///
/// - `JobTimedOut` maps to 504.
/// - `Cancelled` maps to 503 (the server is shutting down).
/// - Everything else maps to 500. Backend-originated messages are passed
///   through; local template and I/O details are logged and sanitized.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    let internal = StatusCode::INTERNAL_SERVER_ERROR;
    match err {
        PipelineError::Template(core) => {
            tracing::error!(error = %core, "Job template error");
            (
                internal,
                "TEMPLATE_ERROR",
                "The job template is missing or does not match this deployment".to_string(),
            )
        }
        PipelineError::StagingRejected { .. } => (internal, "UPLOAD_FAILED", err.to_string()),
        PipelineError::SubmissionRejected { .. } | PipelineError::SubmissionIncomplete => {
            (internal, "SUBMISSION_FAILED", err.to_string())
        }
        PipelineError::JobTimedOut { .. } => {
            (StatusCode::GATEWAY_TIMEOUT, "JOB_TIMED_OUT", err.to_string())
        }
        PipelineError::JobFailed { .. } => (internal, "JOB_FAILED", err.to_string()),
        PipelineError::Cancelled { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "CANCELLED", err.to_string())
        }
        PipelineError::OutputListingFailed(_) => {
            (internal, "OUTPUT_LISTING_FAILED", err.to_string())
        }
        PipelineError::ArtifactNotFound { .. } => {
            (internal, "ARTIFACT_NOT_FOUND", err.to_string())
        }
        PipelineError::DownloadFailed { .. } => (internal, "DOWNLOAD_FAILED", err.to_string()),
        PipelineError::Io(io) => {
            tracing::error!(error = %io, "Filesystem error while running job");
            (
                internal,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

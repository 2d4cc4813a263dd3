//! Handler for `POST /api/v1/convert`.
//!
//! Accepts the front, left and back views of an object as multipart
//! fields, runs one image-to-3D job and streams the resulting model back.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use forge3d_comfyui::config::InputView;
use forge3d_comfyui::fetcher::Artifact;
use forge3d_comfyui::pipeline::JobInputs;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Uploaded input files for one request.
///
/// Files are removed when this value is dropped, whether the job
/// succeeded, failed, or the request was abandoned mid-flight.
struct UploadedInputs {
    views: HashMap<InputView, PathBuf>,
    written: Vec<PathBuf>,
}

impl UploadedInputs {
    fn new() -> Self {
        Self {
            views: HashMap::new(),
            written: Vec::new(),
        }
    }

    fn insert(&mut self, view: InputView, path: PathBuf) {
        self.written.push(path.clone());
        self.views.insert(view, path);
    }

    /// All three views, or a 400 naming the first missing field.
    fn job_inputs(&self) -> AppResult<JobInputs> {
        let path = |view: InputView| {
            self.views.get(&view).cloned().ok_or_else(|| {
                AppError::BadRequest(format!("Missing image field '{}'", view.field_name()))
            })
        };
        Ok(JobInputs {
            front: path(InputView::Front)?,
            left: path(InputView::Left)?,
            back: path(InputView::Back)?,
        })
    }
}

impl Drop for UploadedInputs {
    fn drop(&mut self) {
        let paths = std::mem::take(&mut self.written);
        if paths.is_empty() {
            return;
        }
        tokio::spawn(async move {
            for path in paths {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    tracing::warn!(path = %path.display(), error = %e, "Failed to remove uploaded input");
                }
            }
        });
    }
}

/// POST /api/v1/convert
///
/// Multipart fields `front`, `left` and `back` are required; other fields
/// are ignored. Responds with the model bytes as an attachment named after
/// the resolved output file.
pub async fn convert_images(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let input_dir = &state.config.pipeline.output_dir;
    tokio::fs::create_dir_all(input_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create output dir: {e}")))?;

    let mut uploads = UploadedInputs::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let Some(view) = field.name().and_then(InputView::from_field_name) else {
            tracing::debug!(field = ?field.name(), "Ignoring unexpected form field");
            continue;
        };

        let original_name = field
            .file_name()
            .and_then(upload_basename)
            .unwrap_or_else(|| format!("{}.png", view.field_name()));

        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        if data.is_empty() {
            return Err(AppError::BadRequest(format!(
                "Image field '{}' is empty",
                view.field_name()
            )));
        }

        let path = input_dir.join(format!("{}_{original_name}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| AppError::InternalError(format!("Failed to save upload: {e}")))?;
        uploads.insert(view, path);
    }

    let inputs = uploads.job_inputs()?;

    let permit = state
        .job_permits
        .clone()
        .acquire_owned()
        .await
        .map_err(|e| AppError::InternalError(format!("Job limiter closed: {e}")))?;

    // The task outlives a dropped request: the drop guard cancels it and it
    // dequeues the prompt before releasing the permit and the inputs.
    let cancel = state.shutdown.child_token();
    let _cancel_on_drop = cancel.clone().drop_guard();
    let pipeline = Arc::clone(&state.pipeline);

    let job = tokio::spawn(async move {
        let _permit = permit;
        let _uploads = uploads;
        pipeline.run(&inputs, &cancel).await
    });

    let artifact = job
        .await
        .map_err(|e| AppError::InternalError(format!("Job task failed: {e}")))??;
    Ok(artifact_response(artifact))
}

/// Final path component of a client-supplied filename.
fn upload_basename(name: &str) -> Option<String> {
    let base = Path::new(name.rsplit(['/', '\\']).next()?)
        .file_name()?
        .to_str()?
        .trim();
    (!base.is_empty()).then(|| base.to_string())
}

/// MIME type for a model file, by extension.
fn model_mime(filename: &str) -> &'static str {
    let lower = filename.to_ascii_lowercase();
    if lower.ends_with(".glb") {
        "model/gltf-binary"
    } else if lower.ends_with(".obj") {
        "model/obj"
    } else {
        "application/octet-stream"
    }
}

fn artifact_response(artifact: Artifact) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        artifact.filename.replace(['"', '\\'], "_")
    );

    (
        StatusCode::OK,
        [
            (CONTENT_TYPE, model_mime(&artifact.filename).to_string()),
            (CONTENT_DISPOSITION, disposition),
        ],
        artifact.content,
    )
        .into_response()
}

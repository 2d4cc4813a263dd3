//! Pushes local input images to the backend's asset store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::ComfyBackend;
use crate::error::PipelineError;

/// A local file that the backend now knows under `backend_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedAsset {
    pub local_path: PathBuf,
    /// Opaque name assigned by the backend.
    pub backend_name: String,
}

/// Uploads input assets, one backend call per file, never retrying.
pub struct AssetStager {
    backend: Arc<dyn ComfyBackend>,
}

impl AssetStager {
    pub fn new(backend: Arc<dyn ComfyBackend>) -> Self {
        Self { backend }
    }

    /// Upload a single file.
    ///
    /// The backend name is taken from the upload response; backends that
    /// do not echo one keep the file's basename.
    pub async fn stage(&self, local_path: &Path) -> Result<StagedAsset, PipelineError> {
        let file = local_path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| PipelineError::StagingRejected {
                file: local_path.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;

        let response = self.backend.upload_image(local_path).await.map_err(|e| {
            tracing::warn!(file = %file, error = %e, "Backend rejected input asset");
            PipelineError::StagingRejected {
                file: file.clone(),
                reason: e.backend_message(),
            }
        })?;

        let backend_name = response
            .name
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| file.clone());

        tracing::debug!(file = %file, backend_name = %backend_name, "Staged input asset");

        Ok(StagedAsset {
            local_path: local_path.to_path_buf(),
            backend_name,
        })
    }

    /// Upload several files concurrently.
    ///
    /// Results keep the order of `paths`; the first failure aborts the
    /// whole batch.
    pub async fn stage_all(&self, paths: &[&Path]) -> Result<Vec<StagedAsset>, PipelineError> {
        futures::future::try_join_all(paths.iter().map(|path| self.stage(path))).await
    }
}

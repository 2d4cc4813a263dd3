//! Downloads a resolved artifact and persists it locally.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge3d_core::output::OutputDescriptor;
use tokio::io::AsyncWriteExt;

use crate::backend::ComfyBackend;
use crate::error::PipelineError;

/// A fully persisted output file.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// Name the artifact is delivered under.
    pub filename: String,
    /// Final local location.
    pub path: PathBuf,
    pub content: Vec<u8>,
}

pub struct ArtifactFetcher {
    backend: Arc<dyn ComfyBackend>,
    output_dir: PathBuf,
}

impl ArtifactFetcher {
    pub fn new(backend: Arc<dyn ComfyBackend>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            backend,
            output_dir: output_dir.into(),
        }
    }

    /// Download `descriptor` into `output_dir/<filename>`.
    ///
    /// Bytes land in a uniquely named `.part` file first and are renamed
    /// into place once fully written, so a failed fetch never leaves a
    /// truncated artifact behind. An existing file of the same name is
    /// overwritten.
    pub async fn fetch(&self, descriptor: &OutputDescriptor) -> Result<Artifact, PipelineError> {
        let filename =
            local_file_name(&descriptor.filename).ok_or_else(|| PipelineError::DownloadFailed {
                filename: descriptor.filename.clone(),
                reason: "artifact has no usable file name".to_string(),
            })?;

        let content = self.backend.view(descriptor).await.map_err(|e| {
            tracing::warn!(filename = %descriptor.filename, error = %e, "Artifact download failed");
            PipelineError::DownloadFailed {
                filename: descriptor.filename.clone(),
                reason: e.backend_message(),
            }
        })?;

        tokio::fs::create_dir_all(&self.output_dir).await?;

        let path = self.output_dir.join(&filename);
        let partial = self
            .output_dir
            .join(format!(".{filename}.{}.part", uuid::Uuid::new_v4()));

        if let Err(e) = persist(&partial, &path, &content).await {
            if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                tracing::debug!(path = %partial.display(), error = %cleanup, "No partial file to remove");
            }
            return Err(e.into());
        }

        tracing::info!(
            path = %path.display(),
            size_bytes = content.len(),
            "Artifact saved",
        );

        Ok(Artifact {
            filename,
            path,
            content,
        })
    }
}

async fn persist(partial: &Path, path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(partial).await?;
    file.write_all(content).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(partial, path).await
}

/// Final path component of a backend filename, rejecting anything that
/// could escape the output directory.
fn local_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    match base {
        "" | "." | ".." => None,
        base => Some(base.to_string()),
    }
}

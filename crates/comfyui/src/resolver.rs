//! Locates the 3D artifact produced by a completed job.
//!
//! Resolution runs an ordered list of [`ResolutionStrategy`]s and keeps the
//! first hit. The standard order is:
//!
//! 1. [`HistoryScan`]: walk the job's per-node outputs in the order the
//!    backend returned them and take the first file with a model extension.
//! 2. [`LatestListing`]: fall back to the backend-wide output listing and
//!    take the most recently modified `.glb` under a `mesh` subfolder.
//!
//! Which file wins is decided by the backend's ordering, not by name.

use std::sync::Arc;

use async_trait::async_trait;
use forge3d_core::output::{
    has_extension_in, ModelExtensions, OutputDescriptor, OutputFileEntry, FALLBACK_EXTENSION,
};

use crate::backend::ComfyBackend;
use crate::error::PipelineError;

/// One way of finding the artifact.
#[async_trait]
pub trait ResolutionStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// `Ok(None)` means "nothing here, try the next strategy".
    async fn resolve(
        &self,
        outputs: &serde_json::Value,
    ) -> Result<Option<OutputDescriptor>, PipelineError>;
}

// ---------------------------------------------------------------------------
// History scan
// ---------------------------------------------------------------------------

/// Scans `outputs.{node}.{output_type}[]` items for a model filename.
pub struct HistoryScan {
    extensions: ModelExtensions,
}

impl HistoryScan {
    pub fn new(extensions: ModelExtensions) -> Self {
        Self { extensions }
    }
}

#[async_trait]
impl ResolutionStrategy for HistoryScan {
    fn name(&self) -> &'static str {
        "history_scan"
    }

    async fn resolve(
        &self,
        outputs: &serde_json::Value,
    ) -> Result<Option<OutputDescriptor>, PipelineError> {
        Ok(scan_history_outputs(outputs, &self.extensions))
    }
}

/// First item, in backend order, whose `filename` has a model extension.
///
/// Nodes that are not objects, output types that are not arrays and items
/// without a string `filename` are skipped.
pub fn scan_history_outputs(
    outputs: &serde_json::Value,
    extensions: &ModelExtensions,
) -> Option<OutputDescriptor> {
    outputs
        .as_object()?
        .values()
        .filter_map(|node| node.as_object())
        .flat_map(|node| node.values())
        .filter_map(|items| items.as_array())
        .flatten()
        .find_map(|item| {
            let filename = item.get("filename")?.as_str()?;
            if !extensions.matches(filename) {
                return None;
            }
            let subfolder = item
                .get("subfolder")
                .and_then(|s| s.as_str())
                .unwrap_or_default();
            Some(OutputDescriptor::new(filename, subfolder))
        })
}

// ---------------------------------------------------------------------------
// Global listing fallback
// ---------------------------------------------------------------------------

/// Picks the newest matching file from the backend-wide output listing.
pub struct LatestListing {
    backend: Arc<dyn ComfyBackend>,
    extension: String,
    subfolder_marker: String,
}

impl LatestListing {
    pub fn new(
        backend: Arc<dyn ComfyBackend>,
        extension: impl Into<String>,
        subfolder_marker: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            extension: extension.into(),
            subfolder_marker: subfolder_marker.into(),
        }
    }
}

#[async_trait]
impl ResolutionStrategy for LatestListing {
    fn name(&self) -> &'static str {
        "latest_listing"
    }

    async fn resolve(
        &self,
        _outputs: &serde_json::Value,
    ) -> Result<Option<OutputDescriptor>, PipelineError> {
        let entries = self
            .backend
            .list_outputs()
            .await
            .map_err(|e| PipelineError::OutputListingFailed(e.to_string()))?;

        Ok(latest_matching(entries, &self.extension, &self.subfolder_marker))
    }
}

/// Newest entry (by `mtime`) whose filename ends in `extension` and whose
/// subfolder contains `subfolder_marker`. Ties keep listing order.
pub fn latest_matching(
    mut entries: Vec<OutputFileEntry>,
    extension: &str,
    subfolder_marker: &str,
) -> Option<OutputDescriptor> {
    entries.retain(|entry| {
        has_extension_in(&entry.filename, &[extension]) && entry.subfolder.contains(subfolder_marker)
    });
    entries.sort_by(|a, b| b.mtime.total_cmp(&a.mtime));
    entries.into_iter().next().map(OutputDescriptor::from)
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Runs resolution strategies in order until one finds the artifact.
pub struct OutputResolver {
    strategies: Vec<Box<dyn ResolutionStrategy>>,
}

impl OutputResolver {
    pub fn new(strategies: Vec<Box<dyn ResolutionStrategy>>) -> Self {
        Self { strategies }
    }

    /// History scan first, then the `.glb` listing fallback.
    pub fn standard(
        backend: Arc<dyn ComfyBackend>,
        extensions: ModelExtensions,
        subfolder_marker: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            Box::new(HistoryScan::new(extensions)),
            Box::new(LatestListing::new(
                backend,
                FALLBACK_EXTENSION,
                subfolder_marker,
            )),
        ])
    }

    /// Locate the artifact for `job_id`, failing with
    /// [`PipelineError::ArtifactNotFound`] when every strategy comes up empty.
    pub async fn resolve(
        &self,
        outputs: &serde_json::Value,
        job_id: &str,
    ) -> Result<OutputDescriptor, PipelineError> {
        for strategy in &self.strategies {
            if let Some(descriptor) = strategy.resolve(outputs).await? {
                tracing::info!(
                    prompt_id = %job_id,
                    strategy = strategy.name(),
                    filename = %descriptor.filename,
                    subfolder = %descriptor.subfolder,
                    "Resolved output artifact",
                );
                return Ok(descriptor);
            }
            tracing::debug!(prompt_id = %job_id, strategy = strategy.name(), "No artifact found");
        }

        Err(PipelineError::ArtifactNotFound {
            job_id: job_id.to_string(),
        })
    }
}

//! End-to-end image-to-3D job: load → stage → submit → poll → resolve → fetch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use forge3d_core::template::{JobTemplate, SlotBindings};
use tokio_util::sync::CancellationToken;

use crate::backend::ComfyBackend;
use crate::config::{InputView, PipelineConfig, SlotMap};
use crate::error::PipelineError;
use crate::fetcher::{Artifact, ArtifactFetcher};
use crate::poller::CompletionPoller;
use crate::resolver::OutputResolver;
use crate::stager::AssetStager;
use crate::submitter::JobSubmitter;

/// Local files for the three views of one job.
#[derive(Debug, Clone)]
pub struct JobInputs {
    pub front: PathBuf,
    pub left: PathBuf,
    pub back: PathBuf,
}

impl JobInputs {
    pub fn path(&self, view: InputView) -> &Path {
        match view {
            InputView::Front => &self.front,
            InputView::Left => &self.left,
            InputView::Back => &self.back,
        }
    }
}

/// Runs jobs against one backend. Holds no per-job state, so a single
/// instance can be shared by concurrent requests.
pub struct MeshPipeline {
    backend: Arc<dyn ComfyBackend>,
    template_path: PathBuf,
    slots: SlotMap,
    stager: AssetStager,
    submitter: JobSubmitter,
    poller: CompletionPoller,
    resolver: OutputResolver,
    fetcher: ArtifactFetcher,
}

impl MeshPipeline {
    /// Wire every stage to `backend` using the standard resolver.
    pub fn new(backend: Arc<dyn ComfyBackend>, config: &PipelineConfig) -> Self {
        let resolver = OutputResolver::standard(
            Arc::clone(&backend),
            config.model_extensions.clone(),
            config.fallback_subfolder_marker.clone(),
        );
        Self::with_resolver(backend, config, resolver)
    }

    /// Wire every stage to `backend` with a custom resolution chain.
    pub fn with_resolver(
        backend: Arc<dyn ComfyBackend>,
        config: &PipelineConfig,
        resolver: OutputResolver,
    ) -> Self {
        Self {
            stager: AssetStager::new(Arc::clone(&backend)),
            submitter: JobSubmitter::new(Arc::clone(&backend)),
            poller: CompletionPoller::new(Arc::clone(&backend), config.poll),
            fetcher: ArtifactFetcher::new(Arc::clone(&backend), config.output_dir.clone()),
            resolver,
            template_path: config.template_path.clone(),
            slots: config.slots.clone(),
            backend,
        }
    }

    pub fn backend(&self) -> &Arc<dyn ComfyBackend> {
        &self.backend
    }

    /// Run one job to completion.
    ///
    /// Stages run strictly in sequence and the first failure aborts the
    /// rest. When the wait ends without a result (timeout or cancellation)
    /// the prompt is removed from the backend queue on a best-effort basis.
    pub async fn run(
        &self,
        inputs: &JobInputs,
        cancel: &CancellationToken,
    ) -> Result<Artifact, PipelineError> {
        let template = JobTemplate::load(&self.template_path).await?;

        let paths: Vec<&Path> = InputView::ALL.iter().map(|v| inputs.path(*v)).collect();
        let staged = self.stager.stage_all(&paths).await?;

        let bindings: SlotBindings = InputView::ALL
            .iter()
            .zip(staged)
            .map(|(view, asset)| (self.slots.slot(*view).clone(), asset.backend_name))
            .collect();

        let mut job = self.submitter.submit(template, &bindings).await?;

        let outputs = match self.poller.await_completion(&mut job, cancel).await {
            Ok(outputs) => outputs,
            Err(e) => {
                if matches!(
                    e,
                    PipelineError::JobTimedOut { .. } | PipelineError::Cancelled { .. }
                ) {
                    self.abandon(job.id()).await;
                }
                return Err(e);
            }
        };

        let descriptor = self.resolver.resolve(&outputs, job.id()).await?;
        let artifact = self.fetcher.fetch(&descriptor).await?;

        tracing::info!(
            prompt_id = %job.id(),
            filename = %artifact.filename,
            "Job finished",
        );
        Ok(artifact)
    }

    async fn abandon(&self, prompt_id: &str) {
        if let Err(e) = self.backend.cancel_prompt(prompt_id).await {
            tracing::warn!(prompt_id = %prompt_id, error = %e, "Failed to dequeue abandoned prompt");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::config::PollConfig;
    use crate::fake::{completed_record, FakeBackend, HistoryReply};
    use assert_matches::assert_matches;
    use forge3d_core::error::CoreError;
    use forge3d_core::output::OutputDescriptor;
    use serde_json::json;

    const TEMPLATE: &str = r#"{
        "56": { "class_type": "LoadImage", "inputs": { "image": "front_placeholder.png" } },
        "78": { "class_type": "LoadImage", "inputs": { "image": "left_placeholder.png" } },
        "80": { "class_type": "LoadImage", "inputs": { "image": "back_placeholder.png" } },
        "90": { "class_type": "SaveGLB", "inputs": { "filename_prefix": "3d/mesh" } }
    }"#;

    struct Fixture {
        _dir: tempfile::TempDir,
        config: PipelineConfig,
        inputs: JobInputs,
    }

    fn fixture(template: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let template_path = dir.path().join("workflow.json");
        std::fs::write(&template_path, template).unwrap();

        let mut paths = Vec::new();
        for name in ["front.png", "left.png", "back.png"] {
            let path = dir.path().join(name);
            std::fs::write(&path, b"\x89PNG").unwrap();
            paths.push(path);
        }

        let config = PipelineConfig {
            template_path,
            output_dir: dir.path().join("outputs"),
            poll: PollConfig {
                interval: Duration::from_secs(2),
                timeout: Duration::from_secs(60),
            },
            ..PipelineConfig::default()
        };
        let inputs = JobInputs {
            front: paths[0].clone(),
            left: paths[1].clone(),
            back: paths[2].clone(),
        };

        Fixture {
            _dir: dir,
            config,
            inputs,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn end_to_end_delivers_obj_from_history() {
        let fx = fixture(TEMPLATE);
        let descriptor = OutputDescriptor::new("mesh.obj", "3d");
        let backend = Arc::new(
            FakeBackend::new()
                .with_history([
                    HistoryReply::Pending,
                    HistoryReply::Pending,
                    completed_record(json!({
                        "90": { "meshes": [{ "filename": "mesh.obj", "subfolder": "3d", "type": "output" }] }
                    })),
                ])
                .with_file(&descriptor, b"o mesh"),
        );
        let pipeline = MeshPipeline::new(backend.clone(), &fx.config);

        let artifact = pipeline
            .run(&fx.inputs, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(artifact.filename, "mesh.obj");
        assert_eq!(artifact.content, b"o mesh");
        assert!(artifact.path.starts_with(&fx.config.output_dir));
        assert_eq!(backend.history_calls(), 3);

        let submissions = backend.submissions.lock().unwrap();
        assert_eq!(submissions[0]["56"]["inputs"]["image"], "staged_front.png");
        assert_eq!(submissions[0]["78"]["inputs"]["image"], "staged_left.png");
        assert_eq!(submissions[0]["80"]["inputs"]["image"], "staged_back.png");
        assert_eq!(submissions[0]["90"]["inputs"]["filename_prefix"], "3d/mesh");
    }

    #[tokio::test]
    async fn missing_slot_aborts_before_submission() {
        let fx = fixture(r#"{"56": {"inputs": {}}, "78": {"inputs": {}}}"#);
        let backend = Arc::new(FakeBackend::new());
        let pipeline = MeshPipeline::new(backend.clone(), &fx.config);

        let result = pipeline.run(&fx.inputs, &CancellationToken::new()).await;

        assert_matches!(result, Err(PipelineError::Template(CoreError::UnknownSlot(slot))) if slot == "80");
        assert!(backend.submissions.lock().unwrap().is_empty());
        assert_eq!(backend.history_calls(), 0);
    }

    #[tokio::test]
    async fn missing_template_fails_first() {
        let mut fx = fixture(TEMPLATE);
        fx.config.template_path = fx.config.output_dir.join("nope.json");
        let backend = Arc::new(FakeBackend::new());
        let pipeline = MeshPipeline::new(backend.clone(), &fx.config);

        let result = pipeline.run(&fx.inputs, &CancellationToken::new()).await;

        assert_matches!(result, Err(PipelineError::Template(CoreError::TemplateNotFound { .. })));
        assert!(backend.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_dequeues_prompt() {
        let fx = fixture(TEMPLATE);
        let backend = Arc::new(FakeBackend::new());
        let pipeline = MeshPipeline::new(backend.clone(), &fx.config);

        let result = pipeline.run(&fx.inputs, &CancellationToken::new()).await;

        assert_matches!(result, Err(PipelineError::JobTimedOut { .. }));
        assert_eq!(*backend.cancelled.lock().unwrap(), vec!["abc123".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn unrecognized_outputs_without_listing_match_fail() {
        let fx = fixture(TEMPLATE);
        let backend = Arc::new(FakeBackend::new().with_history([completed_record(json!({
            "9": { "images": [{ "filename": "preview.png", "subfolder": "" }] }
        }))]));
        let pipeline = MeshPipeline::new(backend, &fx.config);

        let result = pipeline.run(&fx.inputs, &CancellationToken::new()).await;
        assert_matches!(result, Err(PipelineError::ArtifactNotFound { .. }));
    }
}

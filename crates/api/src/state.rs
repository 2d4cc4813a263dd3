use std::sync::Arc;

use forge3d_comfyui::backend::ComfyBackend;
use forge3d_comfyui::pipeline::MeshPipeline;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Job workflow bound to the configured backend.
    pub pipeline: Arc<MeshPipeline>,
    /// Bounds the number of jobs in flight against the backend.
    pub job_permits: Arc<Semaphore>,
    /// Master token; cancelled on shutdown so waiting jobs stop polling.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn ComfyBackend>) -> Self {
        let pipeline = MeshPipeline::new(backend, &config.pipeline);
        let permits = config.max_concurrent_jobs.max(1);

        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
            job_permits: Arc::new(Semaphore::new(permits)),
            shutdown: CancellationToken::new(),
        }
    }
}

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use forge3d_comfyui::config::{
    PipelineConfig, PollConfig, SlotMap, DEFAULT_BASE_URL, DEFAULT_POLL_INTERVAL_SECS,
    DEFAULT_SLOT_BACK, DEFAULT_SLOT_FRONT, DEFAULT_SLOT_LEFT, DEFAULT_TIMEOUT_SECS,
};
use forge3d_core::output::{ModelExtensions, DEFAULT_FALLBACK_SUBFOLDER_MARKER};

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Must exceed the
    /// job timeout, otherwise callers see 408 instead of 504.
    pub request_timeout_secs: u64,
    /// Per-call timeout for requests to the backend (default: `30`).
    pub backend_request_timeout_secs: u64,
    /// Jobs allowed in flight at once (default: `4`).
    pub max_concurrent_jobs: usize,
    /// Largest accepted multipart body in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,
    /// Job workflow settings handed to the pipeline.
    pub pipeline: PipelineConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                         | Default                    |
    /// |---------------------------------|----------------------------|
    /// | `HOST`                          | `0.0.0.0`                  |
    /// | `PORT`                          | `3000`                     |
    /// | `CORS_ORIGINS`                  | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`          | `300`                      |
    /// | `BACKEND_REQUEST_TIMEOUT_SECS`  | `30`                       |
    /// | `MAX_CONCURRENT_JOBS`           | `4`                        |
    /// | `MAX_UPLOAD_BYTES`              | `52428800`                 |
    /// | `COMFY_BASE_URL`                | `http://127.0.0.1:8188`    |
    /// | `WORKFLOW_PATH`                 | `workflows/3d-mdl-2.json`  |
    /// | `OUTPUT_DIR`                    | `outputs`                  |
    /// | `COMFY_POLL_INTERVAL_SECS`      | `2`                        |
    /// | `COMFY_TIMEOUT_SECS`            | `60`                       |
    /// | `SLOT_FRONT` / `SLOT_LEFT` / `SLOT_BACK` | `56` / `78` / `80` |
    /// | `MODEL_EXTENSIONS`              | `.glb,.obj`                |
    /// | `FALLBACK_SUBFOLDER_MARKER`     | `mesh`                     |
    ///
    /// Panics on unparseable values, and on a zero poll interval or job
    /// timeout, so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 3000);

        let cors_origins = split_list(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 300);
        let backend_request_timeout_secs: u64 = env_parse("BACKEND_REQUEST_TIMEOUT_SECS", 30);
        let max_concurrent_jobs: usize = env_parse("MAX_CONCURRENT_JOBS", 4);
        let max_upload_bytes: usize = env_parse("MAX_UPLOAD_BYTES", 50 * 1024 * 1024);

        let slots = SlotMap::new(
            std::env::var("SLOT_FRONT").unwrap_or_else(|_| DEFAULT_SLOT_FRONT.into()),
            std::env::var("SLOT_LEFT").unwrap_or_else(|_| DEFAULT_SLOT_LEFT.into()),
            std::env::var("SLOT_BACK").unwrap_or_else(|_| DEFAULT_SLOT_BACK.into()),
        )
        .unwrap_or_else(|e| panic!("Invalid slot configuration: {e}"));

        let model_extensions = std::env::var("MODEL_EXTENSIONS")
            .map(|raw| ModelExtensions::new(split_list(&raw)))
            .unwrap_or_default();

        let pipeline = PipelineConfig {
            base_url: std::env::var("COMFY_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into()),
            template_path: PathBuf::from(
                std::env::var("WORKFLOW_PATH").unwrap_or_else(|_| "workflows/3d-mdl-2.json".into()),
            ),
            output_dir: PathBuf::from(std::env::var("OUTPUT_DIR").unwrap_or_else(|_| "outputs".into())),
            poll: PollConfig {
                interval: env_secs_nonzero("COMFY_POLL_INTERVAL_SECS", DEFAULT_POLL_INTERVAL_SECS),
                timeout: env_secs_nonzero("COMFY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            },
            slots,
            model_extensions,
            fallback_subfolder_marker: std::env::var("FALLBACK_SUBFOLDER_MARKER")
                .unwrap_or_else(|_| DEFAULT_FALLBACK_SUBFOLDER_MARKER.into()),
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            backend_request_timeout_secs,
            max_concurrent_jobs,
            max_upload_bytes,
            pipeline,
        }
    }
}

/// Parse `key` from the environment, falling back to `default` when unset.
fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid {}: {e}", std::any::type_name::<T>())),
        Err(_) => default,
    }
}

/// A positive number of seconds from the environment. Zero is rejected
/// like any unparseable value.
fn env_secs_nonzero(key: &str, default: u64) -> Duration {
    let secs: u64 = env_parse(key, default);
    if secs == 0 {
        panic!("{key} must be greater than zero");
    }
    Duration::from_secs(secs)
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

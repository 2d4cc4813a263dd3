//! Shared helpers for API integration tests.
//!
//! Tests run the real router against an in-process fake ComfyUI server
//! bound to an ephemeral port, so the whole HTTP path (multipart upload,
//! prompt submission, history polling, output download) is exercised.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Multipart, Path as AxumPath, Query, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get as get_route, post};
use axum::{Json, Router};
use forge3d_api::config::ServerConfig;
use forge3d_api::router::build_app_router;
use forge3d_api::state::AppState;
use forge3d_comfyui::api::ComfyUIApi;
use forge3d_comfyui::config::{PipelineConfig, PollConfig};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

pub const PROMPT_ID: &str = "abc123";

pub const WORKFLOW: &str = r#"{
    "56": { "class_type": "LoadImage", "inputs": { "image": "front_placeholder.png" } },
    "78": { "class_type": "LoadImage", "inputs": { "image": "left_placeholder.png" } },
    "80": { "class_type": "LoadImage", "inputs": { "image": "back_placeholder.png" } },
    "90": { "class_type": "SaveGLB", "inputs": { "filename_prefix": "3d/mesh" } }
}"#;

// ---------------------------------------------------------------------------
// Fake ComfyUI backend
// ---------------------------------------------------------------------------

/// Scripted behaviour and recorded traffic of the fake backend.
#[derive(Default)]
pub struct FakeComfy {
    /// History queries answered with `{}` before the record appears.
    /// `None` means the job never finishes.
    pub ready_after: Option<usize>,
    /// `outputs` map of the finished history record.
    pub outputs: Value,
    /// Downloadable files keyed by `(subfolder, filename)`.
    pub files: HashMap<(String, String), Vec<u8>>,
    /// Entries returned by the output listing.
    pub listing: Value,
    pub history_calls: AtomicUsize,
    pub uploads: Mutex<Vec<String>>,
    pub prompts: Mutex<Vec<Value>>,
    pub dequeued: Mutex<Vec<Value>>,
}

impl FakeComfy {
    /// A backend that finishes after `ready_after` pending polls with a
    /// single `3d/mesh.obj` output.
    pub fn finishing_after(ready_after: usize) -> Self {
        let mut files = HashMap::new();
        files.insert(("3d".to_string(), "mesh.obj".to_string()), b"o mesh\nv 0 0 0\n".to_vec());
        Self {
            ready_after: Some(ready_after),
            outputs: json!({
                "90": { "meshes": [{ "filename": "mesh.obj", "subfolder": "3d", "type": "output" }] }
            }),
            files,
            listing: json!([]),
            ..Self::default()
        }
    }

    /// A backend whose job never produces outputs.
    pub fn never_finishing() -> Self {
        Self {
            ready_after: None,
            listing: json!([]),
            ..Self::default()
        }
    }
}

async fn upload_image(State(fake): State<Arc<FakeComfy>>, mut multipart: Multipart) -> Response {
    let mut name = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("image") {
            name = field.file_name().map(str::to_string);
            let _ = field.bytes().await;
        }
    }
    let Some(name) = name else {
        return (StatusCode::BAD_REQUEST, "missing image").into_response();
    };
    fake.uploads.lock().unwrap().push(name.clone());
    Json(json!({ "name": name, "subfolder": "", "type": "input" })).into_response()
}

async fn submit_prompt(State(fake): State<Arc<FakeComfy>>, Json(body): Json<Value>) -> Json<Value> {
    fake.prompts.lock().unwrap().push(body["prompt"].clone());
    Json(json!({ "prompt_id": PROMPT_ID, "number": 1, "node_errors": {} }))
}

async fn history(
    State(fake): State<Arc<FakeComfy>>,
    AxumPath(prompt_id): AxumPath<String>,
) -> Json<Value> {
    let calls = fake.history_calls.fetch_add(1, Ordering::SeqCst);
    match fake.ready_after {
        Some(n) if calls >= n => Json(json!({
            prompt_id: {
                "outputs": fake.outputs,
                "status": { "status_str": "success", "completed": true }
            }
        })),
        _ => Json(json!({})),
    }
}

async fn view(
    State(fake): State<Arc<FakeComfy>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(filename) = params.get("filename") else {
        return Json(fake.listing.clone()).into_response();
    };
    let subfolder = params.get("subfolder").cloned().unwrap_or_default();
    match fake.files.get(&(subfolder, filename.clone())) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

async fn queue(State(fake): State<Arc<FakeComfy>>, Json(body): Json<Value>) -> StatusCode {
    fake.dequeued.lock().unwrap().push(body);
    StatusCode::OK
}

async fn system_stats() -> Json<Value> {
    Json(json!({ "system": { "os": "posix", "comfyui_version": "test" }, "devices": [] }))
}

/// Serve `fake` on an ephemeral port and return its base URL.
pub async fn spawn_fake_comfy(fake: Arc<FakeComfy>) -> String {
    let app = Router::new()
        .route("/upload/image", post(upload_image))
        .route("/prompt", post(submit_prompt))
        .route("/history/{prompt_id}", get_route(history))
        .route("/view", get_route(view))
        .route("/queue", post(queue))
        .route("/system_stats", get_route(system_stats))
        .with_state(fake);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

/// Wait up to two seconds for the backend to see a dequeue request.
pub async fn wait_for_dequeue(fake: &FakeComfy) -> Vec<Value> {
    for _ in 0..100 {
        let dequeued = fake.dequeued.lock().unwrap().clone();
        if !dequeued.is_empty() {
            return dequeued;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    Vec::new()
}

// ---------------------------------------------------------------------------
// App construction
// ---------------------------------------------------------------------------

/// Build a test `ServerConfig` rooted in `dir`.
///
/// Writes the standard workflow into `dir`, polls every 20 ms and gives
/// each job two seconds.
pub fn test_config(dir: &Path, base_url: &str) -> ServerConfig {
    let template_path = dir.join("workflow.json");
    std::fs::write(&template_path, WORKFLOW).unwrap();

    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        backend_request_timeout_secs: 5,
        max_concurrent_jobs: 2,
        max_upload_bytes: 10 * 1024 * 1024,
        pipeline: PipelineConfig {
            base_url: base_url.to_string(),
            template_path,
            output_dir: dir.join("outputs"),
            poll: PollConfig {
                interval: Duration::from_millis(20),
                timeout: Duration::from_secs(2),
            },
            ..PipelineConfig::default()
        },
    }
}

/// Build the full application router against the backend at
/// `config.pipeline.base_url`.
pub fn build_test_app(config: ServerConfig) -> Router {
    let client = reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(config.backend_request_timeout_secs))
        .build()
        .unwrap();
    let backend = Arc::new(ComfyUIApi::with_client(client, config.pipeline.base_url.clone()));
    build_app_router(AppState::new(config, backend))
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub const BOUNDARY: &str = "forge3d-test-boundary";

/// Encode `(field, filename, bytes)` parts as a `multipart/form-data` body.
pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (field, filename, bytes) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(b"Content-Type: image/png\r\n\r\n");
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// The three standard views with small PNG-ish payloads.
pub fn three_views() -> Vec<u8> {
    multipart_body(&[
        ("front", "front.png", b"\x89PNG front"),
        ("left", "left.png", b"\x89PNG left"),
        ("back", "back.png", b"\x89PNG back"),
    ])
}

/// POST a multipart body to `uri`.
pub async fn post_multipart(app: Router, uri: &str, body: Vec<u8>) -> Response {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Send a GET request to `uri`.
pub async fn get(app: Router, uri: &str) -> Response {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

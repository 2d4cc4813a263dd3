//! In-memory [`ComfyBackend`] used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use forge3d_core::output::{OutputDescriptor, OutputFileEntry};
use serde_json::json;

use crate::api::{ComfyUIApiError, SubmitResponse, UploadResponse};
use crate::backend::ComfyBackend;

/// One scripted answer to `GET /history/{id}`.
#[derive(Debug, Clone)]
pub enum HistoryReply {
    /// `{}`: the prompt is not in history yet.
    Pending,
    /// Non-2xx answer.
    Error(u16),
    /// `{prompt_id: record}`.
    Record(serde_json::Value),
}

pub struct FakeBackend {
    pub prompt_id: Option<String>,
    pub upload_rejection: Option<String>,
    pub submit_rejection: Option<(u16, String)>,
    pub listing: Result<Vec<OutputFileEntry>, (u16, String)>,
    pub files: HashMap<String, Vec<u8>>,
    /// Latency added to every history query.
    pub history_delay: Option<Duration>,
    history: Mutex<VecDeque<HistoryReply>>,
    pub uploads: Mutex<Vec<PathBuf>>,
    pub submissions: Mutex<Vec<serde_json::Value>>,
    pub cancelled: Mutex<Vec<String>>,
    pub history_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self {
            prompt_id: Some("abc123".to_string()),
            upload_rejection: None,
            submit_rejection: None,
            listing: Ok(Vec::new()),
            files: HashMap::new(),
            history_delay: None,
            history: Mutex::new(VecDeque::new()),
            uploads: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            history_calls: AtomicUsize::new(0),
            listing_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_history(self, replies: impl IntoIterator<Item = HistoryReply>) -> Self {
        *self.history.lock().unwrap() = replies.into_iter().collect();
        self
    }

    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = Some(delay);
        self
    }

    pub fn with_file(mut self, descriptor: &OutputDescriptor, content: &[u8]) -> Self {
        self.files
            .insert(descriptor.relative_path(), content.to_vec());
        self
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }
}

/// Record with the given outputs, shaped like ComfyUI's history entry.
pub fn completed_record(outputs: serde_json::Value) -> HistoryReply {
    HistoryReply::Record(json!({
        "prompt": [],
        "outputs": outputs,
        "status": { "status_str": "success", "completed": true, "messages": [] }
    }))
}

#[async_trait]
impl ComfyBackend for FakeBackend {
    async fn upload_image(&self, path: &Path) -> Result<UploadResponse, ComfyUIApiError> {
        if let Some(body) = &self.upload_rejection {
            return Err(ComfyUIApiError::ApiError {
                status: 400,
                body: body.clone(),
            });
        }
        self.uploads.lock().unwrap().push(path.to_path_buf());
        let name = path.file_name().and_then(|n| n.to_str()).map(|n| format!("staged_{n}"));
        Ok(UploadResponse {
            name,
            subfolder: Some(String::new()),
            kind: Some("input".to_string()),
        })
    }

    async fn submit_prompt(
        &self,
        workflow: &serde_json::Value,
        _client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        if let Some((status, body)) = &self.submit_rejection {
            return Err(ComfyUIApiError::ApiError {
                status: *status,
                body: body.clone(),
            });
        }
        self.submissions.lock().unwrap().push(workflow.clone());
        Ok(SubmitResponse {
            prompt_id: self.prompt_id.clone(),
            number: Some(1),
            node_errors: json!({}),
        })
    }

    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.history_delay {
            tokio::time::sleep(delay).await;
        }
        let reply = self
            .history
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(HistoryReply::Pending);
        match reply {
            HistoryReply::Pending => Ok(json!({})),
            HistoryReply::Error(status) => Err(ComfyUIApiError::ApiError {
                status,
                body: "history unavailable".to_string(),
            }),
            HistoryReply::Record(record) => Ok(json!({ prompt_id: record })),
        }
    }

    async fn list_outputs(&self) -> Result<Vec<OutputFileEntry>, ComfyUIApiError> {
        self.listing_calls.fetch_add(1, Ordering::SeqCst);
        self.listing
            .clone()
            .map_err(|(status, body)| ComfyUIApiError::ApiError { status, body })
    }

    async fn view(&self, descriptor: &OutputDescriptor) -> Result<Vec<u8>, ComfyUIApiError> {
        self.files
            .get(&descriptor.relative_path())
            .cloned()
            .ok_or_else(|| ComfyUIApiError::ApiError {
                status: 404,
                body: "File not found".to_string(),
            })
    }

    async fn cancel_prompt(&self, prompt_id: &str) -> Result<(), ComfyUIApiError> {
        self.cancelled.lock().unwrap().push(prompt_id.to_string());
        Ok(())
    }

    async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        Ok(json!({ "system": {}, "devices": [] }))
    }
}

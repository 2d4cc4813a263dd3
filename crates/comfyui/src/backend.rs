//! Backend seam used by the workflow components.
//!
//! Components depend on [`ComfyBackend`] rather than on [`ComfyUIApi`]
//! directly so that each stage can be exercised against an in-memory
//! backend.

use std::path::Path;

use async_trait::async_trait;
use forge3d_core::output::{OutputDescriptor, OutputFileEntry};

use crate::api::{ComfyUIApi, ComfyUIApiError, SubmitResponse, UploadResponse};

/// Request/response operations offered by a ComfyUI-compatible backend.
#[async_trait]
pub trait ComfyBackend: Send + Sync {
    /// `POST /upload/image`
    async fn upload_image(&self, path: &Path) -> Result<UploadResponse, ComfyUIApiError>;

    /// `POST /prompt`
    async fn submit_prompt(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError>;

    /// `GET /history/{prompt_id}`
    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError>;

    /// `GET /view?type=output`
    async fn list_outputs(&self) -> Result<Vec<OutputFileEntry>, ComfyUIApiError>;

    /// `GET /view?filename=&subfolder=&type=output`
    async fn view(&self, descriptor: &OutputDescriptor) -> Result<Vec<u8>, ComfyUIApiError>;

    /// `POST /queue` with a delete request for one prompt.
    async fn cancel_prompt(&self, prompt_id: &str) -> Result<(), ComfyUIApiError>;

    /// `GET /system_stats`
    async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError>;
}

#[async_trait]
impl ComfyBackend for ComfyUIApi {
    async fn upload_image(&self, path: &Path) -> Result<UploadResponse, ComfyUIApiError> {
        ComfyUIApi::upload_image(self, path).await
    }

    async fn submit_prompt(
        &self,
        workflow: &serde_json::Value,
        client_id: &str,
    ) -> Result<SubmitResponse, ComfyUIApiError> {
        self.submit_workflow(workflow, client_id).await
    }

    async fn get_history(&self, prompt_id: &str) -> Result<serde_json::Value, ComfyUIApiError> {
        ComfyUIApi::get_history(self, prompt_id).await
    }

    async fn list_outputs(&self) -> Result<Vec<OutputFileEntry>, ComfyUIApiError> {
        ComfyUIApi::list_outputs(self).await
    }

    async fn view(&self, descriptor: &OutputDescriptor) -> Result<Vec<u8>, ComfyUIApiError> {
        ComfyUIApi::view(self, descriptor).await
    }

    async fn cancel_prompt(&self, prompt_id: &str) -> Result<(), ComfyUIApiError> {
        self.cancel_execution(prompt_id).await
    }

    async fn system_stats(&self) -> Result<serde_json::Value, ComfyUIApiError> {
        ComfyUIApi::system_stats(self).await
    }
}

//! Binds staged assets into the job template and queues it.

use std::sync::Arc;

use forge3d_core::job::Job;
use forge3d_core::template::{JobTemplate, SlotBindings};

use crate::api::ComfyUIApiError;
use crate::backend::ComfyBackend;
use crate::error::PipelineError;

pub struct JobSubmitter {
    backend: Arc<dyn ComfyBackend>,
}

impl JobSubmitter {
    pub fn new(backend: Arc<dyn ComfyBackend>) -> Self {
        Self { backend }
    }

    /// Bind every slot, then submit the template.
    ///
    /// The template is consumed. A missing slot fails before any network
    /// call is made.
    pub async fn submit(
        &self,
        mut template: JobTemplate,
        bindings: &SlotBindings,
    ) -> Result<Job, PipelineError> {
        template.bind(bindings)?;

        let workflow = template.into_value();
        let client_id = uuid::Uuid::new_v4().to_string();

        let response = self
            .backend
            .submit_prompt(&workflow, &client_id)
            .await
            .map_err(|e| match e {
                ComfyUIApiError::ApiError { status, body } => PipelineError::SubmissionRejected {
                    status: Some(status),
                    body,
                },
                other => PipelineError::SubmissionRejected {
                    status: None,
                    body: other.to_string(),
                },
            })?;

        if response
            .node_errors
            .as_object()
            .is_some_and(|errors| !errors.is_empty())
        {
            tracing::warn!(node_errors = %response.node_errors, "ComfyUI reported node errors");
        }

        let prompt_id = response
            .prompt_id
            .filter(|id| !id.is_empty())
            .ok_or(PipelineError::SubmissionIncomplete)?;

        tracing::info!(
            prompt_id = %prompt_id,
            client_id = %client_id,
            queue_number = ?response.number,
            "Workflow submitted to ComfyUI",
        );

        Ok(Job::submitted(prompt_id, workflow))
    }
}

//! Domain types for the image-to-3D job façade.
//!
//! Holds the job template and its slot binding rules, the job status
//! state machine, and the output descriptor / model-extension policy.
//! Everything here is backend-agnostic; HTTP lives in `forge3d-comfyui`.

pub mod error;
pub mod job;
pub mod output;
pub mod template;
pub mod types;

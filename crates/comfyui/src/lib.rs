//! ComfyUI REST client and the image-to-3D job workflow.
//!
//! [`api::ComfyUIApi`] wraps the backend's HTTP endpoints and implements
//! the [`backend::ComfyBackend`] seam. The workflow components (stager,
//! submitter, poller, resolver, fetcher) each hold a shared backend handle
//! and are composed by [`pipeline::MeshPipeline`].

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod pipeline;
pub mod poller;
pub mod resolver;
pub mod stager;
pub mod submitter;

#[cfg(test)]
pub(crate) mod fake;

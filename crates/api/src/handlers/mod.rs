//! Request handlers.
//!
//! Handlers delegate to the job pipeline in `forge3d_comfyui` and map
//! errors via [`AppError`](crate::error::AppError).

pub mod convert;

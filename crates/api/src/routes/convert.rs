//! Route definitions for the image-to-3D conversion endpoint.

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::Router;

use crate::handlers::convert;
use crate::state::AppState;

/// Routes mounted at `/convert`.
///
/// ```text
/// POST   /convert         -> convert_images
/// ```
///
/// The default 2 MB body limit is lifted to `max_upload_bytes` since the
/// request carries three images.
pub fn router(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/convert", post(convert::convert_images))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
}

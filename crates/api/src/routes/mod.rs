pub mod convert;
pub mod health;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /convert                 front/left/back images -> 3D model (POST)
/// ```
pub fn api_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new().merge(convert::router(max_upload_bytes))
}

pub mod health;
pub mod index;
pub mod jobs;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /jobs                       submit (POST)
/// /jobs/{id}/status           status snapshot (GET)
/// /jobs/{id}/result           result metadata (GET)
/// /jobs/{id}/download         video stream (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/jobs", jobs::router())
}

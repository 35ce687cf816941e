//! Route definitions for the `/jobs` resource.

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::handlers::jobs;
use crate::state::AppState;

/// Submissions carry the image inline as base64.
const MAX_SUBMISSION_BYTES: usize = 20 * 1024 * 1024;

/// Routes mounted at `/jobs`.
///
/// ```text
/// POST   /                  -> create_job
/// GET    /{id}/status       -> get_job_status
/// GET    /{id}/result       -> get_job_result
/// GET    /{id}/download     -> download_video
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            post(jobs::create_job).layer(DefaultBodyLimit::max(MAX_SUBMISSION_BYTES)),
        )
        .route("/{id}/status", get(jobs::get_job_status))
        .route("/{id}/result", get(jobs::get_job_result))
        .route("/{id}/download", get(jobs::download_video))
}

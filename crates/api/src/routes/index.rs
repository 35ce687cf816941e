use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET / -- service index.
async fn index() -> Json<Value> {
    Json(json!({
        "service": "motion-api",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "endpoints": {
            "health": "/health",
            "create_job": "POST /api/v1/jobs",
            "job_status": "GET /api/v1/jobs/{id}/status",
            "job_result": "GET /api/v1/jobs/{id}/result",
            "download": "GET /api/v1/jobs/{id}/download",
        },
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(index))
}

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// `healthy` or `unhealthy`.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub redis: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_length: Option<usize>,
    pub max_queue_size: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health -- store reachability and queue depth. 503 when the store
/// cannot be reached.
async fn health_check(State(state): State<AppState>) -> Response {
    let probe = async {
        state.repo.ping().await?;
        state.queue.len().await
    }
    .await;

    let max_queue_size = state.config.max_queue_size;
    match probe {
        Ok(queue_length) => Json(HealthResponse {
            status: "healthy",
            version: env!("CARGO_PKG_VERSION"),
            redis: "connected",
            queue_length: Some(queue_length),
            max_queue_size,
            error: None,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unhealthy",
                    version: env!("CARGO_PKG_VERSION"),
                    redis: "disconnected",
                    queue_length: None,
                    max_queue_size,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}

/// Mount health check routes (intended for root-level, NOT under `/api/v1`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

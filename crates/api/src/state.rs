use std::sync::Arc;

use motion_store::queue::WorkQueue;
use motion_store::repositories::JobRepo;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Job metadata and execution records.
    pub repo: JobRepo,
    /// Pending/in-flight job ids.
    pub queue: Arc<dyn WorkQueue>,
    pub config: Arc<ServerConfig>,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Queue is full. Maximum {capacity} jobs allowed.")]
    QueueFull { capacity: usize },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Artifact missing for job {job_id}: {path}")]
    ArtifactMissing { job_id: String, path: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

use motion_core::error::CoreError;
use motion_core::types::JobId;

/// Errors raised by the durable store, the work queue and the repository
/// layered on top of them.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the command.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored blob could not be (de)serialized.
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job {0} not found")]
    NotFound(JobId),

    /// The requested write would break the job state machine.
    #[error("Job {job_id}: {reason}")]
    InvalidTransition { job_id: JobId, reason: String },

    /// Concurrent writers kept changing a key faster than a conditional
    /// write could land.
    #[error("Too many concurrent writes to {0}")]
    Contention(String),
}

impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => CoreError::StorageUnavailable(msg),
            StoreError::NotFound(id) => CoreError::NotFound {
                entity: "Job",
                id: id.to_string(),
            },
            StoreError::InvalidTransition { reason, .. } => CoreError::Conflict(reason),
            StoreError::Contention(key) => {
                CoreError::Conflict(format!("too many concurrent writes to {key}"))
            }
            StoreError::Serialization(e) => CoreError::Internal(e.to_string()),
        }
    }
}

//! Execution-side view of a job, stored under `job:{id}:execution`.
//!
//! This is the link between the job record and the queue entry: which
//! queue admitted it, which worker picked it up, and the worker's live
//! progress.

use serde::{Deserialize, Serialize};

use motion_core::types::{JobId, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    Enqueued,
    Started,
    Finished,
    Failed,
}

impl ExecutionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Finished | ExecutionState::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub job_id: JobId,
    pub queue: String,
    pub state: ExecutionState,
    pub enqueued_at: Timestamp,
    #[serde(default)]
    pub worker_id: Option<String>,
    #[serde(default)]
    pub dequeued_at: Option<Timestamp>,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
}

impl ExecutionRecord {
    pub fn enqueued(job_id: JobId, queue: &str) -> Self {
        Self {
            job_id,
            queue: queue.to_string(),
            state: ExecutionState::Enqueued,
            enqueued_at: chrono::Utc::now(),
            worker_id: None,
            dequeued_at: None,
            progress: 0.0,
            message: None,
        }
    }
}

//! The worker's dequeue loop.

use std::sync::Arc;
use std::time::Duration;

use motion_core::types::JobId;
use motion_store::queue::WorkQueue;
use motion_store::repositories::JobRepo;
use motion_store::StoreError;
use tokio_util::sync::CancellationToken;

use crate::executor::{ExecutionError, JobExecutor};

/// Pause after a queue error before trying again.
const QUEUE_ERROR_BACKOFF: Duration = Duration::from_secs(5);

pub struct Worker {
    id: String,
    queue: Arc<dyn WorkQueue>,
    repo: JobRepo,
    executor: JobExecutor,
    dequeue_wait: Duration,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        queue: Arc<dyn WorkQueue>,
        repo: JobRepo,
        executor: JobExecutor,
        dequeue_wait: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            queue,
            repo,
            executor,
            dequeue_wait,
        }
    }

    /// Process jobs one at a time until `cancel` fires. A job already
    /// running when shutdown is requested is finished first.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(worker_id = %self.id, queue = self.queue.name(), "Worker started");

        while !cancel.is_cancelled() {
            if let Err(e) = self.process_next().await {
                tracing::error!(worker_id = %self.id, error = %e, "Queue error");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(QUEUE_ERROR_BACKOFF) => {}
                }
            }
        }

        tracing::info!(worker_id = %self.id, "Worker stopping");
    }

    /// Wait for one job and run it. Returns the job id, or `None` if nothing
    /// arrived within the dequeue wait.
    pub async fn process_next(&self) -> Result<Option<JobId>, StoreError> {
        let Some(job_id) = self.queue.dequeue(self.dequeue_wait).await? else {
            return Ok(None);
        };

        if let Err(e) = self.repo.mark_dequeued(job_id, &self.id).await {
            tracing::warn!(%job_id, error = %e, "Failed to update execution record");
        }

        match self.executor.execute(job_id).await {
            Ok(_) => self.queue.ack(job_id).await?,
            Err(ExecutionError::Store(StoreError::NotFound(_))) => {
                tracing::warn!(%job_id, "Dequeued job has no record (expired?)");
                self.queue.fail(job_id).await?;
            }
            Err(e) => {
                tracing::debug!(%job_id, error = %e, "Moving job to failed registry");
                self.queue.fail(job_id).await?;
            }
        }
        Ok(Some(job_id))
    }
}

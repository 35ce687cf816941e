//! Out-of-band observer for in-flight jobs.
//!
//! Each sweep walks the queue's in-flight list and:
//!
//! - fails PROCESSING jobs that have run longer than the maximum runtime
//! - fails jobs still QUEUED long after a worker took them (worker lost
//!   before it could start), dated from the dequeue when it was recorded
//!   and from admission otherwise
//! - settles entries whose job already reached a terminal state, which
//!   happens when a worker died between writing the outcome and acking
//!
//! Every write is conditional on the current status, so the watchdog can
//! race the owning worker safely: whichever terminal write lands first wins.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use motion_core::failure::FailureCategory;
use motion_core::scheduling::JobStatus;
use motion_core::types::{JobId, Timestamp};
use motion_store::queue::WorkQueue;
use motion_store::repositories::JobRepo;
use motion_store::StoreError;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub timed_out: usize,
    pub abandoned: usize,
    pub settled: usize,
}

pub struct Watchdog {
    queue: Arc<dyn WorkQueue>,
    repo: JobRepo,
    max_runtime: Duration,
    queued_grace: Duration,
}

impl Watchdog {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        repo: JobRepo,
        max_runtime: Duration,
        queued_grace: Duration,
    ) -> Self {
        Self {
            queue,
            repo,
            max_runtime,
            queued_grace,
        }
    }

    /// Sweep every `interval` until `cancel` fires.
    pub async fn run(self, interval: Duration, cancel: CancellationToken) {
        tracing::info!(
            interval_secs = interval.as_secs(),
            max_runtime_secs = self.max_runtime.as_secs(),
            "Watchdog started"
        );

        let mut ticker = tokio::time::interval(interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Watchdog stopping");
                    break;
                }
                _ = ticker.tick() => match self.sweep().await {
                    Ok(report) if report != SweepReport::default() => {
                        tracing::info!(
                            timed_out = report.timed_out,
                            abandoned = report.abandoned,
                            settled = report.settled,
                            "Watchdog sweep",
                        );
                    }
                    Ok(_) => tracing::debug!("Watchdog sweep: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Watchdog sweep failed"),
                },
            }
        }
    }

    pub async fn sweep(&self) -> Result<SweepReport, StoreError> {
        let mut report = SweepReport::default();

        for job_id in self.queue.in_flight().await? {
            let Some(record) = self.repo.find(job_id).await? else {
                tracing::warn!(%job_id, "In-flight entry has no record");
                self.queue.fail(job_id).await?;
                report.settled += 1;
                continue;
            };

            match record.status {
                JobStatus::Processing => {
                    if exceeded(record.started_at, self.max_runtime) && self.time_out(job_id).await? {
                        report.timed_out += 1;
                    }
                }
                JobStatus::Queued => {
                    // A worker that died between dequeue and bookkeeping left
                    // no dequeue time; the entry is in flight regardless.
                    let taken_at = match self.repo.find_execution(job_id).await? {
                        Some(execution) => execution.dequeued_at.unwrap_or(execution.enqueued_at),
                        None => record.created_at,
                    };
                    if exceeded(Some(taken_at), self.queued_grace) && self.abandon(job_id).await? {
                        report.abandoned += 1;
                    }
                }
                JobStatus::Completed => {
                    self.queue.ack(job_id).await?;
                    report.settled += 1;
                }
                JobStatus::Failed => {
                    self.queue.fail(job_id).await?;
                    report.settled += 1;
                }
            }
        }

        Ok(report)
    }

    async fn time_out(&self, job_id: JobId) -> Result<bool, StoreError> {
        let error = format!(
            "Job exceeded maximum runtime of {}s",
            self.max_runtime.as_secs()
        );
        let failed = self
            .repo
            .fail_if_processing(job_id, &error, FailureCategory::Timeout)
            .await?;
        if failed {
            tracing::warn!(%job_id, "Watchdog failed job by timeout");
        }
        Ok(failed)
    }

    async fn abandon(&self, job_id: JobId) -> Result<bool, StoreError> {
        match self.repo.mark_started(job_id).await {
            Ok(_) => {}
            // Someone else moved it on in the meantime.
            Err(StoreError::InvalidTransition { .. }) => return Ok(false),
            Err(e) => return Err(e),
        }
        let failed = self
            .repo
            .fail_if_processing(
                job_id,
                "Worker was lost before the job started",
                FailureCategory::Unknown,
            )
            .await?;
        if failed {
            tracing::warn!(%job_id, "Watchdog failed abandoned job");
            self.queue.fail(job_id).await?;
        }
        Ok(failed)
    }
}

fn exceeded(since: Option<Timestamp>, limit: Duration) -> bool {
    let Some(since) = since else {
        return false;
    };
    chrono::Duration::from_std(limit).is_ok_and(|limit| Utc::now() - since >= limit)
}

//! Execution of a single dequeued job.
//!
//! Order of writes for one attempt:
//!
//! 1. QUEUED -> PROCESSING, before any generation work
//! 2. progress updates from the engine, forwarded as they arrive
//! 3. COMPLETED with the output path, or FAILED with the diagnostic
//!
//! A failure is recorded on the job and then returned to the caller so the
//! queue can move the entry to its failed registry. [`JobExecutor::execute`]
//! returns only after the blocking run has ended and released the engine.

use std::path::PathBuf;
use std::time::Duration;

use motion_core::storage;
use motion_core::types::JobId;
use motion_pipeline::{
    CancelFlag, EngineHandle, GenerationError, GenerationOutcome, GenerationRequest, ProgressEvent,
};
use motion_store::models::job::JobRecord;
use motion_store::repositories::JobRepo;
use motion_store::StoreError;
use tokio::sync::mpsc;

use crate::timeout::TimeoutStrategy;

/// How long a timed-out run gets to notice its cancellation flag before the
/// worker reports it as stuck. The worker still waits for the run to return:
/// the engine is never shared between two jobs.
const CANCEL_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Generation(#[from] GenerationError),
}

pub struct JobExecutor {
    repo: JobRepo,
    engine: EngineHandle,
    timeout: TimeoutStrategy,
    hot_storage: PathBuf,
}

impl JobExecutor {
    pub fn new(
        repo: JobRepo,
        engine: EngineHandle,
        timeout: TimeoutStrategy,
        hot_storage: PathBuf,
    ) -> Self {
        Self {
            repo,
            engine,
            timeout,
            hot_storage,
        }
    }

    /// Run one job to a terminal state.
    pub async fn execute(&self, job_id: JobId) -> Result<JobRecord, ExecutionError> {
        let record = self.repo.mark_started(job_id).await?;
        tracing::info!(%job_id, user_id = record.user_id, "Job started");

        match self.generate(&record).await {
            Ok((outcome, fps, steps)) => {
                let video_path = outcome.video_path.to_string_lossy();
                let done = self.repo.complete(job_id, &video_path, fps, steps).await?;
                tracing::info!(%job_id, video_path = %video_path, "Job completed");
                Ok(done)
            }
            Err(err) => {
                let category = err.category();
                tracing::error!(
                    %job_id,
                    error = %err,
                    category = %category,
                    "Job failed",
                );
                let trace = err.trace();
                if let Err(e) = self
                    .repo
                    .fail(job_id, &err.summary(), category, trace.as_deref())
                    .await
                {
                    // Usually the watchdog already failed the job.
                    tracing::warn!(%job_id, error = %e, "Could not record job failure");
                }
                Err(err.into())
            }
        }
    }

    async fn generate(
        &self,
        record: &JobRecord,
    ) -> Result<(GenerationOutcome, u32, u32), GenerationError> {
        let job_id = record.job_id;
        let image_path = PathBuf::from(&record.image_path);
        if tokio::fs::metadata(&image_path).await.is_err() {
            return Err(GenerationError::Configuration(format!(
                "input image missing: {}",
                image_path.display()
            )));
        }

        let params = record.settings.resolve();
        let (fps, steps) = (params.fps, params.steps);
        tracing::debug!(%job_id, fps, steps, frames = params.num_frames, "Resolved parameters");

        let request = GenerationRequest {
            job_id,
            image_path,
            output_path: storage::output_path(&self.hot_storage, job_id),
            params,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let forwarder = tokio::spawn(forward_progress(self.repo.clone(), job_id, rx));

        let cancel = CancelFlag::new();
        let engine = self.engine.clone();
        let run_cancel = cancel.clone();
        let mut run = tokio::task::spawn_blocking(move || {
            engine.run(
                &request,
                &mut |event| {
                    let _ = tx.send(event);
                },
                &run_cancel,
            )
        });

        let joined = match self.timeout.deadline() {
            Some(limit) => match tokio::time::timeout(limit, &mut run).await {
                Ok(joined) => joined,
                Err(_) => {
                    cancel.cancel();
                    tracing::warn!(%job_id, limit_secs = limit.as_secs(), "Job hit its deadline");
                    if tokio::time::timeout(CANCEL_GRACE, &mut run).await.is_err() {
                        tracing::error!(
                            %job_id,
                            grace_secs = CANCEL_GRACE.as_secs(),
                            "Generation ignored cancellation; waiting for it to release the engine",
                        );
                        let _ = run.await;
                    }
                    let _ = forwarder.await;
                    return Err(GenerationError::TimedOut(limit));
                }
            },
            None => run.await,
        };

        let result = joined.map_err(|e| GenerationError::Failed(format!("generation panicked: {e}")))?;
        // The sender is gone once the blocking task returns.
        let _ = forwarder.await;
        result.map(|outcome| (outcome, fps, steps))
    }
}

/// Write engine progress to the store as it arrives.
async fn forward_progress(
    repo: JobRepo,
    job_id: JobId,
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
) {
    while let Some(event) = rx.recv().await {
        let message = event.message();
        match repo
            .update_progress(job_id, event.percent(), Some(&message))
            .await
        {
            Ok(true) => tracing::debug!(%job_id, percent = event.percent(), "Progress"),
            Ok(false) => {}
            Err(e) => tracing::warn!(%job_id, error = %e, "Failed to record progress"),
        }
    }
}

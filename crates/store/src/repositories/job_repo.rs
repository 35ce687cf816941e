//! Typed access to job records in the durable store.
//!
//! Every status change goes through [`state_machine::validate_transition`];
//! a write that would leave a terminal state is refused rather than applied.
//! Writes are compare-and-set against the value the decision was made on, so
//! the worker and the watchdog can race on the same record.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use motion_core::failure::FailureCategory;
use motion_core::progress::{clamp_percent, COMPLETE};
use motion_core::scheduling::{state_machine, JobStatus};
use motion_core::types::JobId;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::StoreError;
use crate::kv::KeyValueStore;
use crate::models::execution::{ExecutionRecord, ExecutionState};
use crate::models::job::JobRecord;

/// Default retention window for job records: 24 hours.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(86_400);

/// Conditional-write attempts before giving up on a contended key.
const MAX_WRITE_ATTEMPTS: usize = 16;

/// Error text stored when a failure carries no message of its own.
const UNKNOWN_ERROR: &str = "Unknown error";

pub fn metadata_key(job_id: JobId) -> String {
    format!("job:{job_id}:metadata")
}

pub fn execution_key(job_id: JobId) -> String {
    format!("job:{job_id}:execution")
}

/// Repository for job metadata and its execution sub-record.
///
/// Cheap to clone; every write re-applies the retention window.
#[derive(Clone)]
pub struct JobRepo {
    store: Arc<dyn KeyValueStore>,
    retention: Duration,
}

impl JobRepo {
    pub fn new(store: Arc<dyn KeyValueStore>, retention: Duration) -> Self {
        Self { store, retention }
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Probe the backing store.
    pub async fn ping(&self) -> Result<(), StoreError> {
        self.store.ping().await
    }

    // -----------------------------------------------------------------------
    // Job record
    // -----------------------------------------------------------------------

    /// Persist a newly submitted record.
    pub async fn create(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.save(record).await
    }

    pub async fn find(&self, job_id: JobId) -> Result<Option<JobRecord>, StoreError> {
        match self.store.get(&metadata_key(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Remove both sub-records. Used to roll back a submission the queue
    /// refused after the record was written.
    pub async fn delete(&self, job_id: JobId) -> Result<(), StoreError> {
        self.store.delete(&metadata_key(job_id)).await?;
        self.store.delete(&execution_key(job_id)).await
    }

    /// QUEUED -> PROCESSING. Must land before any generation work starts.
    pub async fn mark_started(&self, job_id: JobId) -> Result<JobRecord, StoreError> {
        let outcome = self
            .modify(&metadata_key(job_id), |record: &mut JobRecord| {
                transition(record, JobStatus::Processing)?;
                record.status = JobStatus::Processing;
                record.started_at = Some(Utc::now());
                record.progress = 0.0;
                record.message = Some("Starting...".to_string());
                Ok(true)
            })
            .await?;
        outcome.into_record(job_id)
    }

    /// Replace progress and message on a processing job.
    ///
    /// Progress never decreases within an attempt: a lower value keeps the
    /// stored one. Returns `false` (and writes nothing) when the job is no
    /// longer processing, e.g. after the watchdog failed it.
    pub async fn update_progress(
        &self,
        job_id: JobId,
        percent: f64,
        message: Option<&str>,
    ) -> Result<bool, StoreError> {
        let outcome = self
            .modify(&metadata_key(job_id), |record: &mut JobRecord| {
                if record.status != JobStatus::Processing {
                    tracing::debug!(
                        %job_id,
                        status = %record.status,
                        "Ignoring progress update for job that is not processing",
                    );
                    return Ok(false);
                }
                record.progress = record.progress.max(clamp_percent(percent));
                record.message = message.map(str::to_string);
                Ok(true)
            })
            .await?;

        let record = match outcome {
            Modified::Written(record) => record,
            Modified::Skipped(_) => return Ok(false),
            Modified::Missing => return Err(StoreError::NotFound(job_id)),
        };

        self.modify(&execution_key(job_id), |execution: &mut ExecutionRecord| {
            if execution.state.is_terminal() {
                return Ok(false);
            }
            execution.progress = record.progress;
            execution.message = record.message.clone();
            Ok(true)
        })
        .await?;
        Ok(true)
    }

    /// PROCESSING -> COMPLETED with the output location.
    pub async fn complete(
        &self,
        job_id: JobId,
        video_path: &str,
        applied_fps: u32,
        applied_steps: u32,
    ) -> Result<JobRecord, StoreError> {
        let record = self
            .modify(&metadata_key(job_id), |record: &mut JobRecord| {
                transition(record, JobStatus::Completed)?;
                record.status = JobStatus::Completed;
                record.progress = COMPLETE;
                record.message = Some("Video generation completed successfully".to_string());
                record.video_path = Some(video_path.to_string());
                record.applied_fps = Some(applied_fps);
                record.applied_steps = Some(applied_steps);
                record.completed_at = Some(Utc::now());
                Ok(true)
            })
            .await?
            .into_record(job_id)?;

        self.finish_execution(job_id, ExecutionState::Finished, COMPLETE)
            .await?;
        Ok(record)
    }

    /// PROCESSING -> FAILED with the captured diagnostic.
    pub async fn fail(
        &self,
        job_id: JobId,
        error: &str,
        category: FailureCategory,
        trace: Option<&str>,
    ) -> Result<JobRecord, StoreError> {
        let record = self
            .modify(&metadata_key(job_id), |record: &mut JobRecord| {
                transition(record, JobStatus::Failed)?;
                apply_failure(record, error, category, trace);
                Ok(true)
            })
            .await?
            .into_record(job_id)?;

        self.finish_execution(job_id, ExecutionState::Failed, record.progress)
            .await?;
        Ok(record)
    }

    /// Fail a job only if it is still processing. Used by the watchdog, which
    /// races the worker; a worker that already wrote a terminal state wins.
    pub async fn fail_if_processing(
        &self,
        job_id: JobId,
        error: &str,
        category: FailureCategory,
    ) -> Result<bool, StoreError> {
        let outcome = self
            .modify(&metadata_key(job_id), |record: &mut JobRecord| {
                if record.status != JobStatus::Processing {
                    return Ok(false);
                }
                apply_failure(record, error, category, None);
                Ok(true)
            })
            .await?;

        match outcome {
            Modified::Written(record) => {
                self.finish_execution(job_id, ExecutionState::Failed, record.progress)
                    .await?;
                Ok(true)
            }
            Modified::Skipped(_) | Modified::Missing => Ok(false),
        }
    }

    // -----------------------------------------------------------------------
    // Execution sub-record
    // -----------------------------------------------------------------------

    pub async fn put_execution(&self, execution: &ExecutionRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(execution)?;
        self.store
            .put(&execution_key(execution.job_id), &raw, self.retention)
            .await
    }

    pub async fn find_execution(
        &self,
        job_id: JobId,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        match self.store.get(&execution_key(job_id)).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Record which worker picked the job up.
    pub async fn mark_dequeued(&self, job_id: JobId, worker_id: &str) -> Result<(), StoreError> {
        self.modify(&execution_key(job_id), |execution: &mut ExecutionRecord| {
            if execution.state.is_terminal() {
                return Ok(false);
            }
            execution.state = ExecutionState::Started;
            execution.worker_id = Some(worker_id.to_string());
            execution.dequeued_at = Some(Utc::now());
            Ok(true)
        })
        .await?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn save(&self, record: &JobRecord) -> Result<(), StoreError> {
        let raw = serde_json::to_string(record)?;
        self.store
            .put(&metadata_key(record.job_id), &raw, self.retention)
            .await
    }

    /// Read-modify-write of one JSON sub-record under a conditional write.
    ///
    /// `apply` always sees the freshest stored value and returns whether to
    /// write it back. If another writer got in between the read and the
    /// write, the value is re-read and `apply` decides again.
    async fn modify<R, F>(&self, key: &str, mut apply: F) -> Result<Modified<R>, StoreError>
    where
        R: Serialize + DeserializeOwned + Send,
        F: FnMut(&mut R) -> Result<bool, StoreError> + Send,
    {
        for _ in 0..MAX_WRITE_ATTEMPTS {
            let Some(raw) = self.store.get(key).await? else {
                return Ok(Modified::Missing);
            };
            let mut value: R = serde_json::from_str(&raw)?;
            if !apply(&mut value)? {
                return Ok(Modified::Skipped(value));
            }

            let updated = serde_json::to_string(&value)?;
            if self
                .store
                .compare_and_put(key, &raw, &updated, self.retention)
                .await?
            {
                return Ok(Modified::Written(value));
            }
            tracing::debug!(key, "Concurrent write detected; re-reading");
        }
        Err(StoreError::Contention(key.to_string()))
    }

    async fn finish_execution(
        &self,
        job_id: JobId,
        state: ExecutionState,
        progress: f64,
    ) -> Result<(), StoreError> {
        self.modify(&execution_key(job_id), |execution: &mut ExecutionRecord| {
            execution.state = state;
            execution.progress = progress;
            Ok(true)
        })
        .await?;
        Ok(())
    }
}

/// Result of [`JobRepo::modify`].
enum Modified<R> {
    Missing,
    Skipped(R),
    Written(R),
}

impl Modified<JobRecord> {
    fn into_record(self, job_id: JobId) -> Result<JobRecord, StoreError> {
        match self {
            Modified::Written(record) | Modified::Skipped(record) => Ok(record),
            Modified::Missing => Err(StoreError::NotFound(job_id)),
        }
    }
}

fn apply_failure(
    record: &mut JobRecord,
    error: &str,
    category: FailureCategory,
    trace: Option<&str>,
) {
    let error = if error.trim().is_empty() {
        UNKNOWN_ERROR
    } else {
        error
    };
    record.status = JobStatus::Failed;
    record.error = Some(error.to_string());
    record.error_category = Some(category);
    record.error_trace = trace.map(str::to_string);
    record.message = category.remediation().map(str::to_string);
    record.video_path = None;
    record.completed_at = Some(Utc::now());
}

fn transition(record: &JobRecord, to: JobStatus) -> Result<(), StoreError> {
    state_machine::validate_transition(record.status, to).map_err(|reason| {
        StoreError::InvalidTransition {
            job_id: record.job_id,
            reason,
        }
    })
}

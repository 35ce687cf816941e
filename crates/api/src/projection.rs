//! Client-facing snapshot of a job.
//!
//! The job record is authoritative for status and outcome. While a job is
//! running the worker also mirrors progress onto the execution record, so
//! the snapshot takes whichever progress is further along. Queue position
//! comes live from the work queue and is only reported while QUEUED.

use motion_core::failure::FailureCategory;
use motion_core::progress::{clamp_percent, COMPLETE};
use motion_core::scheduling::JobStatus;
use motion_core::types::{JobId, Timestamp};
use motion_store::models::execution::ExecutionRecord;
use motion_store::models::job::JobRecord;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobSnapshot {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<usize>,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_category: Option<FailureCategory>,
}

pub fn project_snapshot(
    record: &JobRecord,
    execution: Option<&ExecutionRecord>,
    queue_position: Option<usize>,
) -> JobSnapshot {
    let (progress, message) = match record.status {
        JobStatus::Queued => (0.0, record.message.clone()),
        JobStatus::Processing => match execution {
            Some(exec) if exec.progress > record.progress => (
                exec.progress,
                exec.message.clone().or_else(|| record.message.clone()),
            ),
            _ => (record.progress, record.message.clone()),
        },
        JobStatus::Completed => (COMPLETE, record.message.clone()),
        JobStatus::Failed => (record.progress, record.message.clone()),
    };

    JobSnapshot {
        job_id: record.job_id,
        status: record.status,
        queue_position: queue_position.filter(|_| record.status == JobStatus::Queued),
        progress: clamp_percent(progress),
        message,
        created_at: record.created_at,
        started_at: record.started_at,
        completed_at: record.completed_at,
        error: record.error.clone(),
        error_category: record.error_category,
    }
}

#[cfg(test)]
mod tests {
    use motion_core::generation::{GenerationSettings, MotionPreset, Resolution};
    use motion_store::models::execution::ExecutionRecord;

    use super::*;

    fn record(status: JobStatus) -> JobRecord {
        let settings = GenerationSettings {
            duration: 6,
            resolution: Resolution::P720,
            motion_preset: MotionPreset::Smooth,
            visual_style: None,
            quality_mode: None,
            user_prompt: None,
            custom_fps: None,
            custom_steps: None,
        };
        let mut record = JobRecord::queued(uuid::Uuid::new_v4(), 1, "in.png".into(), settings);
        record.status = status;
        record
    }

    #[test]
    fn queued_job_reports_position() {
        let snapshot = project_snapshot(&record(JobStatus::Queued), None, Some(3));
        assert_eq!(snapshot.queue_position, Some(3));
        assert_eq!(snapshot.progress, 0.0);
    }

    #[test]
    fn position_dropped_once_processing() {
        let snapshot = project_snapshot(&record(JobStatus::Processing), None, Some(1));
        assert_eq!(snapshot.queue_position, None);
    }

    #[test]
    fn execution_progress_used_when_ahead() {
        let mut rec = record(JobStatus::Processing);
        rec.progress = 20.0;
        let mut exec = ExecutionRecord::enqueued(rec.job_id, "svd_jobs");
        exec.progress = 57.5;
        exec.message = Some("Generating: 10/20".into());

        let snapshot = project_snapshot(&rec, Some(&exec), None);
        assert_eq!(snapshot.progress, 57.5);
        assert_eq!(snapshot.message.as_deref(), Some("Generating: 10/20"));

        exec.progress = 5.0;
        let snapshot = project_snapshot(&rec, Some(&exec), None);
        assert_eq!(snapshot.progress, 20.0);
    }

    #[test]
    fn completed_job_is_pinned_at_100() {
        let mut rec = record(JobStatus::Completed);
        rec.progress = 90.0;
        let snapshot = project_snapshot(&rec, None, None);
        assert_eq!(snapshot.progress, 100.0);
    }

    #[test]
    fn failed_job_carries_error_and_category() {
        let mut rec = record(JobStatus::Failed);
        rec.error = Some("CUDA out of memory".into());
        rec.error_category = Some(FailureCategory::OutOfMemory);

        let json = serde_json::to_value(project_snapshot(&rec, None, None)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_category"], "out_of_memory");
        assert!(json.get("queue_position").is_none());
    }
}

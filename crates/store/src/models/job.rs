//! The canonical job record stored under `job:{id}:metadata`.

use serde::{Deserialize, Serialize};

use motion_core::failure::FailureCategory;
use motion_core::generation::GenerationSettings;
use motion_core::progress::COMPLETE;
use motion_core::scheduling::JobStatus;
use motion_core::types::{JobId, Timestamp, UserId};

/// One image-to-video request and everything known about its execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub user_id: UserId,
    /// Where the submitted image was written.
    pub image_path: String,
    #[serde(flatten)]
    pub settings: GenerationSettings,
    pub status: JobStatus,
    #[serde(default)]
    pub progress: f64,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_category: Option<FailureCategory>,
    /// Full diagnostic chain captured when the job failed.
    #[serde(default)]
    pub error_trace: Option<String>,
    #[serde(default)]
    pub video_path: Option<String>,
    /// Frame rate and step count the worker actually used.
    #[serde(default)]
    pub applied_fps: Option<u32>,
    #[serde(default)]
    pub applied_steps: Option<u32>,
    pub created_at: Timestamp,
    #[serde(default)]
    pub started_at: Option<Timestamp>,
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl JobRecord {
    /// A freshly submitted job.
    pub fn queued(
        job_id: JobId,
        user_id: UserId,
        image_path: String,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            job_id,
            user_id,
            image_path,
            settings,
            status: JobStatus::Queued,
            progress: 0.0,
            message: None,
            error: None,
            error_category: None,
            error_trace: None,
            video_path: None,
            applied_fps: None,
            applied_steps: None,
            created_at: chrono::Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Check the record-level invariants: error iff failed, output iff
    /// completed, progress pinned at 100 when completed.
    pub fn invariant_violation(&self) -> Option<String> {
        let failed = self.status == JobStatus::Failed;
        let completed = self.status == JobStatus::Completed;
        let has_error = self.error.as_deref().is_some_and(|e| !e.is_empty());

        if failed != has_error {
            return Some(format!("status {} with error {:?}", self.status, self.error));
        }
        if completed != self.video_path.is_some() {
            return Some(format!(
                "status {} with video_path {:?}",
                self.status, self.video_path
            ));
        }
        if completed && self.progress != COMPLETE {
            return Some(format!("completed with progress {}", self.progress));
        }
        None
    }
}

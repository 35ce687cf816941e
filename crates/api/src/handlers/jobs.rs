//! Handlers for the `/jobs` resource.
//!
//! Submission admits a job to the work queue; the other endpoints read the
//! job back for polling clients and serve the finished video.

use std::path::{Path as FsPath, PathBuf};

use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use base64::Engine as _;
use image::ImageFormat;
use motion_core::error::CoreError;
use motion_core::estimation::estimate_wait_secs;
use motion_core::generation::{
    validate_duration, GenerationSettings, MotionPreset, QualityMode, Resolution, VisualStyle,
    MAX_CUSTOM_FPS, MAX_CUSTOM_STEPS, MAX_PROMPT_CHARS, MIN_CUSTOM_FPS, MIN_CUSTOM_STEPS,
};
use motion_core::scheduling::JobStatus;
use motion_core::storage;
use motion_core::types::{JobId, Timestamp, UserId};
use motion_store::models::execution::ExecutionRecord;
use motion_store::models::job::JobRecord;
use motion_store::queue::Admission;
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::projection::{project_snapshot, JobSnapshot};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Validate)]
pub struct CreateJobRequest {
    pub user_id: UserId,
    /// Base64 image, optionally with a `data:image/...;base64,` prefix.
    #[validate(length(min = 1, message = "image_data must not be empty"))]
    pub image_data: String,
    pub duration: u32,
    pub resolution: Resolution,
    pub motion_preset: MotionPreset,
    #[serde(default)]
    pub visual_style: Option<VisualStyle>,
    #[serde(default)]
    pub quality_mode: Option<QualityMode>,
    #[serde(default)]
    #[validate(length(max = MAX_PROMPT_CHARS, message = "user_prompt is too long"))]
    pub user_prompt: Option<String>,
    #[serde(default)]
    #[validate(range(min = MIN_CUSTOM_FPS, max = MAX_CUSTOM_FPS))]
    pub custom_fps: Option<u32>,
    #[serde(default)]
    #[validate(range(min = MIN_CUSTOM_STEPS, max = MAX_CUSTOM_STEPS))]
    pub custom_steps: Option<u32>,
}

impl CreateJobRequest {
    fn settings(&self) -> GenerationSettings {
        GenerationSettings {
            duration: self.duration,
            resolution: self.resolution,
            motion_preset: self.motion_preset,
            visual_style: self.visual_style,
            quality_mode: self.quality_mode,
            user_prompt: self.user_prompt.clone(),
            custom_fps: self.custom_fps,
            custom_steps: self.custom_steps,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub status: JobStatus,
    pub queue_position: usize,
    /// Rough wait in seconds before the job starts.
    pub estimated_time: u64,
}

#[derive(Debug, Serialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub created_at: Timestamp,
    #[serde(flatten)]
    pub output: Option<JobOutput>,
}

/// Present only once the job has completed.
#[derive(Debug, Serialize)]
pub struct JobOutput {
    pub video_url: String,
    pub video_path: String,
    pub duration: u32,
    pub resolution: Resolution,
    pub motion_preset: MotionPreset,
    pub fps: Option<u32>,
    pub steps: Option<u32>,
    pub completed_at: Option<Timestamp>,
    pub file_size: u64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

async fn find_job(state: &AppState, job_id: JobId) -> AppResult<JobRecord> {
    state.repo.find(job_id).await?.ok_or_else(|| {
        AppError::Core(CoreError::NotFound {
            entity: "Job",
            id: job_id.to_string(),
        })
    })
}

/// Decode the submitted image and write it to `path` as PNG.
///
/// Anything the image decoder rejects is the caller's fault (400); a failed
/// write is ours (500).
async fn store_input_image(encoded: &str, path: PathBuf) -> AppResult<()> {
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|e| AppError::BadRequest(format!("Invalid image data: {e}")))?;

    tokio::task::spawn_blocking(move || {
        let img = image::load_from_memory(&bytes)
            .map_err(|e| AppError::BadRequest(format!("Invalid image data: {e}")))?;
        img.save_with_format(&path, ImageFormat::Png)
            .map_err(|e| AppError::InternalError(format!("Failed to save input image: {e}")))
    })
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?
}

/// Undo a submission that could not be admitted.
async fn discard_submission(state: &AppState, job_id: JobId, image_path: &FsPath) {
    if let Err(e) = state.repo.delete(job_id).await {
        tracing::warn!(%job_id, error = %e, "Failed to delete rejected job record");
    }
    if let Err(e) = tokio::fs::remove_file(image_path).await {
        tracing::warn!(%job_id, error = %e, "Failed to delete rejected input image");
    }
}

/// Resolve the output file of a completed job, with its size.
async fn locate_artifact(record: &JobRecord) -> AppResult<(PathBuf, u64)> {
    let missing = |path: &str| {
        AppError::Core(CoreError::ArtifactMissing {
            job_id: record.job_id.to_string(),
            path: path.to_string(),
        })
    };

    let path = record.video_path.as_deref().ok_or_else(|| missing(""))?;
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok((PathBuf::from(path), meta.len())),
        _ => Err(missing(path)),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/v1/jobs
///
/// Validate the request, store the image, and admit the job to the queue.
/// Rejected with 429 once the queue holds `max_queue_size` pending jobs.
pub async fn create_job(
    State(state): State<AppState>,
    payload: Result<Json<CreateJobRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<DataResponse<JobCreated>>)> {
    let Json(input) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    input
        .validate()
        .map_err(|e| CoreError::Validation(e.to_string()))?;
    validate_duration(input.duration)?;

    let capacity = state.config.max_queue_size;
    if state.queue.len().await? >= capacity {
        tracing::info!(user_id = input.user_id, capacity, "Rejected submission, queue full");
        return Err(CoreError::QueueFull { capacity }.into());
    }

    let job_id = JobId::new_v4();
    let image_path = storage::input_path(&state.config.hot_storage, job_id);
    store_input_image(&input.image_data, image_path.clone()).await?;

    let record = JobRecord::queued(
        job_id,
        input.user_id,
        image_path.to_string_lossy().into_owned(),
        input.settings(),
    );
    let execution = ExecutionRecord::enqueued(job_id, state.queue.name());

    let admitted = async {
        state.repo.create(&record).await?;
        state.repo.put_execution(&execution).await?;
        state.queue.enqueue(job_id, capacity).await
    }
    .await;

    let position = match admitted {
        Ok(Admission::Admitted { position }) => position,
        Ok(Admission::Full { capacity }) => {
            // Lost the race for the last slot.
            discard_submission(&state, job_id, &image_path).await;
            return Err(CoreError::QueueFull { capacity }.into());
        }
        Err(e) => {
            discard_submission(&state, job_id, &image_path).await;
            return Err(e.into());
        }
    };

    tracing::info!(
        %job_id,
        user_id = input.user_id,
        position,
        duration = input.duration,
        resolution = input.resolution.as_str(),
        "Job queued",
    );

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobCreated {
                job_id,
                status: JobStatus::Queued,
                queue_position: position,
                estimated_time: estimate_wait_secs(position),
            },
        }),
    ))
}

/// GET /api/v1/jobs/{id}/status
pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobSnapshot>>> {
    let record = find_job(&state, job_id).await?;
    let execution = state.repo.find_execution(job_id).await?;
    let position = if record.status == JobStatus::Queued {
        state.queue.position_of(job_id).await?
    } else {
        None
    };

    Ok(Json(DataResponse {
        data: project_snapshot(&record, execution.as_ref(), position),
    }))
}

/// GET /api/v1/jobs/{id}/result
///
/// Status only until the job completes; then the output location,
/// the parameters used and the file size.
pub async fn get_job_result(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Json<DataResponse<JobResult>>> {
    let record = find_job(&state, job_id).await?;

    let output = if record.status == JobStatus::Completed {
        let (path, file_size) = locate_artifact(&record).await?;
        Some(JobOutput {
            video_url: format!("/api/v1/jobs/{job_id}/download"),
            video_path: path.to_string_lossy().into_owned(),
            duration: record.settings.duration,
            resolution: record.settings.resolution,
            motion_preset: record.settings.motion_preset,
            fps: record.applied_fps,
            steps: record.applied_steps,
            completed_at: record.completed_at,
            file_size,
        })
    } else {
        None
    };

    Ok(Json(DataResponse {
        data: JobResult {
            job_id,
            status: record.status,
            created_at: record.created_at,
            output,
        },
    }))
}

/// GET /api/v1/jobs/{id}/download
///
/// Streams the MP4. 409 while the job has not completed.
pub async fn download_video(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<Response> {
    let record = find_job(&state, job_id).await?;
    if record.status != JobStatus::Completed {
        return Err(CoreError::Conflict(format!(
            "Job is {}, video not available yet",
            record.status
        ))
        .into());
    }

    let (path, file_size) = locate_artifact(&record).await?;
    let file = tokio::fs::File::open(&path)
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;
    let stream = ReaderStream::new(file);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, file_size.to_string())
        .header(
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                storage::download_filename(job_id)
            ),
        )
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::InternalError(e.to_string()))
}

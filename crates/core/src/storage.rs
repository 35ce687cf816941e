//! File naming inside hot storage.

use std::path::{Path, PathBuf};

use crate::types::JobId;

/// Where the submitted image for `job_id` is written.
pub fn input_path(hot_storage: &Path, job_id: JobId) -> PathBuf {
    hot_storage.join(format!("{job_id}_input.png"))
}

/// Where the worker writes the video for `job_id`.
pub fn output_path(hot_storage: &Path, job_id: JobId) -> PathBuf {
    hot_storage.join(format!("{job_id}_output.mp4"))
}

/// File name offered to clients downloading the video.
pub fn download_filename(job_id: JobId) -> String {
    format!("video_{job_id}.mp4")
}

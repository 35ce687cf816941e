//! Generation contract.

use std::path::PathBuf;

use motion_core::generation::ResolvedParams;
use motion_core::progress;
use motion_core::types::JobId;
use serde::Serialize;

use crate::engine::CancelFlag;
use crate::error::GenerationError;

/// Inputs for one run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRequest {
    pub job_id: JobId,
    pub image_path: PathBuf,
    /// Where the generator must write the video.
    pub output_path: PathBuf,
    #[serde(flatten)]
    pub params: ResolvedParams,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationOutcome {
    pub video_path: PathBuf,
}

/// Stage reported by the engine while a run is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    ModelLoading,
    ModelReady,
    Step { completed: u32, total: u32 },
    Finalizing,
}

impl ProgressEvent {
    pub fn percent(self) -> f64 {
        match self {
            ProgressEvent::ModelLoading => progress::MODEL_LOADING,
            ProgressEvent::ModelReady => progress::MODEL_READY,
            ProgressEvent::Step { completed, total } => {
                progress::generation_progress(completed, total)
            }
            ProgressEvent::Finalizing => progress::FINALIZING,
        }
    }

    pub fn message(self) -> String {
        match self {
            ProgressEvent::ModelLoading => "Loading model...".to_string(),
            ProgressEvent::ModelReady => "Preparing image...".to_string(),
            ProgressEvent::Step { completed, total } => {
                format!("Generating frames ({completed}/{total})")
            }
            ProgressEvent::Finalizing => "Encoding video...".to_string(),
        }
    }
}

/// A model capable of turning one image into one video.
///
/// Calls are blocking and may hold the accelerator for minutes; the worker
/// runs them on a blocking thread. Implementations should check `cancel`
/// between steps and return [`GenerationError::Cancelled`] once it is set.
pub trait Generator: Send + Sync {
    /// Make the model resident. Called before every run; cheap when already
    /// loaded.
    fn load(&self) -> Result<(), GenerationError>;

    fn generate(
        &self,
        request: &GenerationRequest,
        on_step: &mut dyn FnMut(u32, u32),
        cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError>;

    /// Return accelerator memory held for the last run.
    fn release(&self) {}
}

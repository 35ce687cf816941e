use std::time::Duration;

use motion_core::failure::FailureCategory;

/// Errors raised while producing a video.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Generation cancelled")]
    Cancelled,

    /// The generator process ran but exited with a non-zero code.
    #[error("Generator exited with code {exit_code}")]
    ProcessFailed { exit_code: i32, stderr: String },

    #[error("Generation failed: {0}")]
    Failed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenerationError {
    /// Category recorded on the failed job.
    pub fn category(&self) -> FailureCategory {
        match self {
            GenerationError::ModelLoad(_) => FailureCategory::ModelLoad,
            GenerationError::OutOfMemory(_) => FailureCategory::OutOfMemory,
            GenerationError::Configuration(_) => FailureCategory::Configuration,
            GenerationError::TimedOut(_) | GenerationError::Cancelled => FailureCategory::Timeout,
            GenerationError::ProcessFailed { stderr, .. } => FailureCategory::classify(stderr),
            GenerationError::Failed(msg) => FailureCategory::classify(msg),
            GenerationError::Io(e) => FailureCategory::classify(&e.to_string()),
        }
    }

    /// Error text stored on the job. For a crashed process this is the last
    /// meaningful stderr line rather than the exit code.
    pub fn summary(&self) -> String {
        match self {
            GenerationError::ProcessFailed { exit_code, stderr } => stderr
                .lines()
                .rev()
                .map(str::trim)
                .find(|l| !l.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("Generator exited with code {exit_code}")),
            other => other.to_string(),
        }
    }

    /// Full diagnostic detail, when there is more than the summary.
    pub fn trace(&self) -> Option<String> {
        match self {
            GenerationError::ProcessFailed { exit_code, stderr } if !stderr.trim().is_empty() => {
                Some(format!("exit code {exit_code}\n{stderr}"))
            }
            GenerationError::Io(e) => Some(format!("{e:?}")),
            _ => None,
        }
    }
}

//! Wire types read back from the job API.
//!
//! Parsing is lenient: a missing progress reads as zero, and `message` and
//! `error` are kept as raw JSON so a non-string value never fails a poll.

use motion_core::failure::FailureCategory;
use motion_core::scheduling::JobStatus;
use motion_core::types::JobId;
use serde::Deserialize;
use serde_json::Value;

/// The `{ "data": T }` envelope every job endpoint answers with.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// Submission acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct Submitted {
    pub job_id: JobId,
    pub status: JobStatus,
    pub queue_position: usize,
    pub estimated_time: u64,
}

/// One status read.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatusPayload {
    pub job_id: JobId,
    pub status: JobStatus,
    #[serde(default)]
    pub queue_position: Option<usize>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    #[serde(default)]
    pub error_category: Option<FailureCategory>,
}

impl StatusPayload {
    /// Progress as a percentage, absent read as zero.
    pub fn progress_or_zero(&self) -> f64 {
        self.progress.filter(|p| p.is_finite()).unwrap_or(0.0)
    }

    /// The status message as text. Strings pass through, other scalars are
    /// stringified, null and structured values are ignored.
    pub fn message_text(&self) -> Option<String> {
        value_text(self.message.as_ref())
    }

    pub fn error_text(&self) -> Option<String> {
        value_text(self.error.as_ref())
    }
}

fn value_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

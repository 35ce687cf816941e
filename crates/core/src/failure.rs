//! Machine-readable classification of execution failures.
//!
//! The category is stored next to the human-readable error so clients can
//! offer a remediation (e.g. a lower resolution after running out of
//! accelerator memory) without parsing free text.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

const OOM_MARKERS: &[&str] = &[
    "out of memory",
    "outofmemory",
    "cuda oom",
    "oom",
    "cannot allocate memory",
    "failed to allocate",
];

const CONFIG_MARKERS: &[&str] = &[
    "invalid configuration",
    "invalid parameter",
    "configuration error",
    "missing metadata",
];

const MODEL_LOAD_MARKERS: &[&str] = &["failed to load model", "model load", "loading model"];

const TIMEOUT_MARKERS: &[&str] = &["timed out", "timeout", "deadline exceeded"];

// ---------------------------------------------------------------------------
// FailureCategory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    OutOfMemory,
    Configuration,
    ModelLoad,
    Timeout,
    Unknown,
}

impl FailureCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::OutOfMemory => "out_of_memory",
            FailureCategory::Configuration => "configuration",
            FailureCategory::ModelLoad => "model_load",
            FailureCategory::Timeout => "timeout",
            FailureCategory::Unknown => "unknown",
        }
    }

    /// Classify a diagnostic message. Memory exhaustion wins over every other
    /// marker because it is the one failure with a user-side fix.
    pub fn classify(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |markers: &[&str]| markers.iter().any(|m| contains_word(&lower, m));

        if has(OOM_MARKERS) {
            FailureCategory::OutOfMemory
        } else if has(TIMEOUT_MARKERS) {
            FailureCategory::Timeout
        } else if has(MODEL_LOAD_MARKERS) {
            FailureCategory::ModelLoad
        } else if has(CONFIG_MARKERS) {
            FailureCategory::Configuration
        } else {
            FailureCategory::Unknown
        }
    }

    /// Suggested user action, if any.
    pub fn remediation(self) -> Option<&'static str> {
        match self {
            FailureCategory::OutOfMemory => {
                Some("Not enough GPU memory. Try a lower resolution or a shorter duration.")
            }
            FailureCategory::Timeout => {
                Some("Processing took too long. Try again with lower settings.")
            }
            FailureCategory::Configuration | FailureCategory::ModelLoad => {
                Some("The service is misconfigured. Please try again later.")
            }
            FailureCategory::Unknown => None,
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substring match that refuses to match short markers inside longer words
/// ("oom" must not match "room").
fn contains_word(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        let before = haystack[..idx].chars().next_back();
        let after = haystack[idx + needle.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

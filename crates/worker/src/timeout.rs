//! How a running job is bounded in time.
//!
//! A hard deadline raises the engine's cancellation flag and fails the job
//! with category `timeout`. Where the generation step cannot be interrupted
//! the worker runs without a deadline and the [`crate::watchdog`] is the only
//! bound.

use std::time::Duration;

/// Default limit for one generation run: 15 minutes.
pub const DEFAULT_JOB_TIMEOUT: Duration = Duration::from_secs(900);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStrategy {
    HardDeadline(Duration),
    WatchdogOnly,
}

impl TimeoutStrategy {
    /// Pick the strongest strategy this platform supports.
    pub fn for_platform(limit: Duration) -> Self {
        if cfg!(unix) {
            TimeoutStrategy::HardDeadline(limit)
        } else {
            TimeoutStrategy::WatchdogOnly
        }
    }

    /// Parse `WORKER_TIMEOUT_MODE`: `auto`, `hard` or `watchdog`.
    pub fn from_mode(mode: &str, limit: Duration) -> Result<Self, String> {
        match mode.trim().to_ascii_lowercase().as_str() {
            "" | "auto" => Ok(Self::for_platform(limit)),
            "hard" | "deadline" => Ok(TimeoutStrategy::HardDeadline(limit)),
            "watchdog" => Ok(TimeoutStrategy::WatchdogOnly),
            other => Err(format!(
                "unknown timeout mode '{other}' (expected auto, hard or watchdog)"
            )),
        }
    }

    pub fn deadline(self) -> Option<Duration> {
        match self {
            TimeoutStrategy::HardDeadline(d) => Some(d),
            TimeoutStrategy::WatchdogOnly => None,
        }
    }
}

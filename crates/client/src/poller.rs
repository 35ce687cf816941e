//! Status polling loop.
//!
//! Reads job status at a fixed interval until the job reaches a terminal
//! state, the wait budget runs out, or too many consecutive reads fail.
//! No pause, including a retry backoff, runs past the wait budget.
//! Giving up never touches the job server-side: a timed-out poll leaves the
//! job running and a later read still shows its true state.

use std::time::Duration;

use async_trait::async_trait;
use motion_core::scheduling::JobStatus;
use motion_core::types::JobId;
use tokio::time::Instant;

use crate::backoff::{delay_for_attempt, RetryConfig};
use crate::error::ClientError;
use crate::render::render_progress;
use crate::status::StatusPayload;

/// Default pause between successful reads.
pub const POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Default total time a client waits for a job.
pub const MAX_WAIT: Duration = Duration::from_secs(600);

/// Anything that can report a job's status.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn fetch_status(&self, job_id: JobId) -> Result<StatusPayload, ClientError>;
}

/// Destination for rendered progress text (a chat message being edited,
/// a terminal line, ...).
#[async_trait]
pub trait ProgressSink: Send {
    async fn update(&mut self, text: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Clone)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_wait: Duration,
    pub retry: RetryConfig,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: POLL_INTERVAL,
            max_wait: MAX_WAIT,
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Completed(StatusPayload),
    Failed(StatusPayload),
    /// The wait budget ran out; the job may still be running.
    TimedOut { waited: Duration },
    /// Consecutive failed reads hit the retry ceiling.
    RetriesExceeded { attempts: u32, last_error: String },
}

/// State carried from one poll iteration to the next.
#[derive(Debug, Default)]
pub struct PollState {
    /// Text last accepted by the sink. A render equal to it is not sent.
    pub last_rendered: Option<String>,
    /// Consecutive failed reads.
    pub failed_reads: u32,
}

impl PollState {
    /// Send `text` to `sink` unless it is what the sink already shows.
    /// Returns whether an update was sent.
    pub async fn publish(&mut self, sink: &mut dyn ProgressSink, text: String) -> bool {
        if self.last_rendered.as_deref() == Some(text.as_str()) {
            return false;
        }
        match sink.update(&text).await {
            Ok(()) => {
                self.last_rendered = Some(text);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to update progress");
                false
            }
        }
    }
}

/// Poll `job_id` until it finishes or the client gives up.
pub async fn poll_job(
    source: &dyn StatusSource,
    sink: &mut dyn ProgressSink,
    job_id: JobId,
    config: &PollConfig,
) -> PollOutcome {
    let started = Instant::now();
    let mut state = PollState::default();

    loop {
        let waited = started.elapsed();
        if waited >= config.max_wait {
            tracing::info!(%job_id, waited_secs = waited.as_secs(), "Giving up waiting for job");
            return PollOutcome::TimedOut { waited };
        }

        let delay = match source.fetch_status(job_id).await {
            Ok(status) => {
                state.failed_reads = 0;
                state.publish(sink, render_progress(&status)).await;

                match status.status {
                    JobStatus::Completed => return PollOutcome::Completed(status),
                    JobStatus::Failed => return PollOutcome::Failed(status),
                    JobStatus::Queued | JobStatus::Processing => config.interval,
                }
            }
            Err(e) => {
                state.failed_reads += 1;
                tracing::warn!(
                    %job_id,
                    attempt = state.failed_reads,
                    error = %e,
                    "Status read failed",
                );
                if state.failed_reads >= config.retry.max_attempts {
                    tracing::error!(%job_id, attempts = state.failed_reads, "Max retries exceeded");
                    return PollOutcome::RetriesExceeded {
                        attempts: state.failed_reads,
                        last_error: e.to_string(),
                    };
                }
                delay_for_attempt(state.failed_reads, &config.retry)
            }
        };

        let remaining = config.max_wait.saturating_sub(started.elapsed());
        tokio::time::sleep(delay.min(remaining)).await;
    }
}

use std::path::PathBuf;
use std::time::Duration;

use crate::timeout::{TimeoutStrategy, DEFAULT_JOB_TIMEOUT};

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub redis_url: String,
    pub queue_name: String,
    /// Identifier recorded on every job this process picks up.
    pub worker_id: String,
    pub hot_storage: PathBuf,
    pub archive_storage: PathBuf,
    /// Retention window re-applied on every job record write.
    pub job_retention: Duration,
    pub timeout: TimeoutStrategy,
    /// Upper bound on one blocking dequeue, so shutdown is noticed promptly.
    pub dequeue_wait: Duration,
    pub watchdog_interval: Duration,
    /// Processing jobs older than this are failed by the watchdog.
    pub watchdog_max_runtime: Duration,
    /// How long a dequeued job may stay QUEUED before it counts as abandoned.
    pub watchdog_queued_grace: Duration,
    /// Command line of the external generator program.
    pub generator_command: Option<String>,
    /// Files in hot and archive storage older than this are deleted.
    pub storage_retention: Duration,
    pub cleanup_interval: Duration,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                    |
    /// |----------------------------------|----------------------------|
    /// | `REDIS_URL`                      | `redis://localhost:6379/0` |
    /// | `WORKER_QUEUE_NAME`              | `svd_jobs`                 |
    /// | `WORKER_ID`                      | `worker-<pid>`             |
    /// | `STORAGE_HOT_PATH`               | `./storage/hot`            |
    /// | `STORAGE_ARCHIVE_PATH`           | `./storage/archive`        |
    /// | `JOB_RETENTION_SECS`             | `86400`                    |
    /// | `WORKER_TIMEOUT_SECS`            | `900`                      |
    /// | `WORKER_TIMEOUT_MODE`            | `auto`                     |
    /// | `WORKER_DEQUEUE_WAIT_SECS`       | `5`                        |
    /// | `WATCHDOG_INTERVAL_SECS`         | `60`                       |
    /// | `WATCHDOG_MAX_RUNTIME_SECS`      | `1200`                     |
    /// | `WATCHDOG_QUEUED_GRACE_SECS`     | `300`                      |
    /// | `GENERATOR_COMMAND`              | unset                      |
    /// | `STORAGE_RETENTION_DAYS`         | `7`                        |
    /// | `CLEANUP_INTERVAL_SECS`          | `3600`                     |
    pub fn from_env() -> Self {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".into());
        let queue_name = std::env::var("WORKER_QUEUE_NAME").unwrap_or_else(|_| "svd_jobs".into());
        let worker_id = std::env::var("WORKER_ID")
            .unwrap_or_else(|_| format!("worker-{}", std::process::id()));

        let hot_storage: PathBuf = std::env::var("STORAGE_HOT_PATH")
            .unwrap_or_else(|_| "./storage/hot".into())
            .into();
        let archive_storage: PathBuf = std::env::var("STORAGE_ARCHIVE_PATH")
            .unwrap_or_else(|_| "./storage/archive".into())
            .into();

        let timeout_limit = secs("WORKER_TIMEOUT_SECS", DEFAULT_JOB_TIMEOUT.as_secs());
        let timeout_mode = std::env::var("WORKER_TIMEOUT_MODE").unwrap_or_else(|_| "auto".into());
        let timeout = TimeoutStrategy::from_mode(&timeout_mode, timeout_limit)
            .expect("WORKER_TIMEOUT_MODE must be auto, hard or watchdog");

        let generator_command = std::env::var("GENERATOR_COMMAND")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let retention_days: u64 = std::env::var("STORAGE_RETENTION_DAYS")
            .unwrap_or_else(|_| "7".into())
            .parse()
            .expect("STORAGE_RETENTION_DAYS must be a valid u64");

        Self {
            redis_url,
            queue_name,
            worker_id,
            hot_storage,
            archive_storage,
            job_retention: secs("JOB_RETENTION_SECS", 86_400),
            timeout,
            dequeue_wait: secs("WORKER_DEQUEUE_WAIT_SECS", 5),
            watchdog_interval: secs("WATCHDOG_INTERVAL_SECS", 60),
            watchdog_max_runtime: secs("WATCHDOG_MAX_RUNTIME_SECS", 1200),
            watchdog_queued_grace: secs("WATCHDOG_QUEUED_GRACE_SECS", 300),
            generator_command,
            storage_retention: Duration::from_secs(retention_days * 86_400),
            cleanup_interval: secs("CLEANUP_INTERVAL_SECS", 3600),
        }
    }
}

fn secs(var: &str, default: u64) -> Duration {
    let value: u64 = match std::env::var(var) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|_| panic!("{var} must be a valid u64")),
        Err(_) => default,
    };
    Duration::from_secs(value)
}

use std::path::PathBuf;
use std::time::Duration;

use motion_core::generation::MAX_QUEUE_SIZE;
use motion_store::repositories::job_repo::DEFAULT_RETENTION;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub redis_url: String,
    /// Name of the work queue jobs are admitted to.
    pub queue_name: String,
    /// Directory submitted images are written to.
    pub hot_storage: PathBuf,
    /// Admission limit on pending jobs.
    pub max_queue_size: usize,
    /// How long job records live after their last write.
    pub job_retention: Duration,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `8000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    /// | `REDIS_URL`            | `redis://localhost:6379/0` |
    /// | `WORKER_QUEUE_NAME`    | `svd_jobs`                 |
    /// | `STORAGE_HOT_PATH`     | `./storage/hot`            |
    /// | `MAX_QUEUE_SIZE`       | `10`                       |
    /// | `JOB_RETENTION_SECS`   | `86400`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".into());

        let queue_name = std::env::var("WORKER_QUEUE_NAME").unwrap_or_else(|_| "svd_jobs".into());

        let hot_storage = std::env::var("STORAGE_HOT_PATH")
            .unwrap_or_else(|_| "./storage/hot".into())
            .into();

        let max_queue_size: usize = std::env::var("MAX_QUEUE_SIZE")
            .map(|v| v.parse().expect("MAX_QUEUE_SIZE must be a valid usize"))
            .unwrap_or(MAX_QUEUE_SIZE);

        let job_retention = std::env::var("JOB_RETENTION_SECS")
            .map(|v| {
                Duration::from_secs(v.parse().expect("JOB_RETENTION_SECS must be a valid u64"))
            })
            .unwrap_or(DEFAULT_RETENTION);

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            redis_url,
            queue_name,
            hot_storage,
            max_queue_size,
            job_retention,
        }
    }
}

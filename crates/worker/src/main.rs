use std::sync::Arc;
use std::time::Duration;

use motion_pipeline::external::ExternalCommandGenerator;
use motion_pipeline::EngineHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use motion_worker::backends::RedisBackends;
use motion_worker::cleanup;
use motion_worker::config::WorkerConfig;
use motion_worker::executor::JobExecutor;
use motion_worker::runner::Worker;
use motion_worker::watchdog::Watchdog;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_worker=debug,motion_pipeline=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = WorkerConfig::from_env();
    tracing::info!(
        worker_id = %config.worker_id,
        queue = %config.queue_name,
        timeout = ?config.timeout,
        "Loaded worker configuration"
    );

    let Some(command_line) = config.generator_command.as_deref() else {
        tracing::error!("GENERATOR_COMMAND must be set");
        std::process::exit(1);
    };

    for dir in [&config.hot_storage, &config.archive_storage] {
        tokio::fs::create_dir_all(dir)
            .await
            .expect("Failed to create storage directory");
    }

    // --- Redis ---
    let RedisBackends {
        repo,
        queue,
        watchdog_queue,
    } = RedisBackends::connect(&config.redis_url, &config.queue_name, config.job_retention)
        .await
        .expect("Failed to connect to Redis");
    tracing::info!("Redis connections established");

    // --- Engine ---
    let generator =
        ExternalCommandGenerator::from_command_line(command_line, tokio::runtime::Handle::current())
            .expect("Invalid GENERATOR_COMMAND");
    let engine = EngineHandle::new(Arc::new(generator));

    // --- Background tasks ---
    let cancel = CancellationToken::new();

    let watchdog = Watchdog::new(
        watchdog_queue,
        repo.clone(),
        config.watchdog_max_runtime,
        config.watchdog_queued_grace,
    );
    let watchdog_handle = tokio::spawn(watchdog.run(config.watchdog_interval, cancel.clone()));

    let cleanup_handle = tokio::spawn(cleanup::run(
        vec![config.hot_storage.clone(), config.archive_storage.clone()],
        config.storage_retention,
        config.cleanup_interval,
        cancel.clone(),
    ));

    // --- Worker loop ---
    let executor = JobExecutor::new(
        repo.clone(),
        engine,
        config.timeout,
        config.hot_storage.clone(),
    );
    let worker = Worker::new(
        config.worker_id.clone(),
        queue,
        repo,
        executor,
        config.dequeue_wait,
    );
    let worker_handle = tokio::spawn(worker.run(cancel.clone()));

    shutdown_signal().await;
    tracing::info!("Shutdown requested, finishing current job");
    cancel.cancel();

    let _ = worker_handle.await;
    let _ = tokio::time::timeout(Duration::from_secs(5), watchdog_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(5), cleanup_handle).await;

    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

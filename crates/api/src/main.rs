use std::net::SocketAddr;
use std::sync::Arc;

use motion_store::kv::RedisStore;
use motion_store::queue::{RedisWorkQueue, WorkQueue};
use motion_store::repositories::JobRepo;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use motion_api::config::ServerConfig;
use motion_api::router::build_app_router;
use motion_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "motion_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        queue = %config.queue_name,
        max_queue_size = config.max_queue_size,
        "Loaded server configuration"
    );

    tokio::fs::create_dir_all(&config.hot_storage)
        .await
        .expect("Failed to create hot storage directory");

    // --- Redis ---
    let conn = motion_store::connect(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");
    tracing::info!("Redis connection established");

    let repo = JobRepo::new(Arc::new(RedisStore::new(conn.clone())), config.job_retention);
    repo.ping().await.expect("Redis health check failed");
    tracing::info!("Redis health check passed");

    let queue: Arc<dyn WorkQueue> = Arc::new(RedisWorkQueue::new(conn, &config.queue_name));

    // --- App state ---
    let state = AppState {
        repo,
        queue,
        config: Arc::new(config.clone()),
    };

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
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

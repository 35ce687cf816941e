#![allow(dead_code)]

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use base64::Engine as _;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use motion_api::config::ServerConfig;
use motion_api::router::build_app_router;
use motion_api::state::AppState;
use motion_store::kv::MemoryStore;
use motion_store::queue::MemoryWorkQueue;
use motion_store::repositories::JobRepo;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config(hot_storage: &Path) -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        redis_url: "redis://unused".to_string(),
        queue_name: "svd_jobs".to_string(),
        hot_storage: hot_storage.to_path_buf(),
        max_queue_size: 10,
        job_retention: Duration::from_secs(86_400),
    }
}

/// The application under test plus handles on its in-memory backends.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub queue: Arc<MemoryWorkQueue>,
    pub repo: JobRepo,
    pub hot: TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        let hot = tempfile::tempdir().unwrap();
        let config = test_config(hot.path());
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(MemoryWorkQueue::new("svd_jobs"));
        let repo = JobRepo::new(store.clone(), config.job_retention);

        let state = AppState {
            repo: repo.clone(),
            queue: queue.clone(),
            config: Arc::new(config.clone()),
        };

        Self {
            router: build_app_router(state, &config),
            store,
            queue,
            repo,
            hot,
        }
    }

    pub fn app(&self) -> Router {
        self.router.clone()
    }

    /// Number of files written to hot storage.
    pub fn stored_files(&self) -> usize {
        std::fs::read_dir(self.hot.path()).unwrap().count()
    }
}

/// A tiny valid PNG, base64 encoded.
pub fn png_base64() -> String {
    let img = image::RgbImage::from_pixel(4, 4, image::Rgb([200, 120, 40]));
    let mut bytes = Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
    base64::engine::general_purpose::STANDARD.encode(bytes.into_inner())
}

/// A valid submission body.
pub fn job_body() -> Value {
    json!({
        "user_id": 42,
        "image_data": png_base64(),
        "duration": 6,
        "resolution": "720p",
        "motion_preset": "smooth",
    })
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

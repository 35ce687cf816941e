//! Redis wiring for the worker process.

use std::sync::Arc;
use std::time::Duration;

use motion_store::kv::RedisStore;
use motion_store::queue::{RedisWorkQueue, WorkQueue};
use motion_store::repositories::JobRepo;
use motion_store::StoreError;

/// Store and queue handles for one worker process.
///
/// The worker's queue blocks on BRPOPLPUSH for up to the dequeue wait, so
/// the repository and the watchdog each sit on a connection of their own.
pub struct RedisBackends {
    pub repo: JobRepo,
    pub queue: Arc<dyn WorkQueue>,
    pub watchdog_queue: Arc<dyn WorkQueue>,
}

impl RedisBackends {
    pub async fn connect(
        redis_url: &str,
        queue_name: &str,
        retention: Duration,
    ) -> Result<Self, StoreError> {
        let store_conn = motion_store::connect(redis_url).await?;
        let queue_conn = motion_store::connect(redis_url).await?;
        let watchdog_conn = motion_store::connect(redis_url).await?;

        Ok(Self {
            repo: JobRepo::new(Arc::new(RedisStore::new(store_conn)), retention),
            queue: Arc::new(RedisWorkQueue::new(queue_conn, queue_name)),
            watchdog_queue: Arc::new(RedisWorkQueue::new(watchdog_conn, queue_name)),
        })
    }
}

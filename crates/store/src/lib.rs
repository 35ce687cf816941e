//! Durable job metadata and the work queue.
//!
//! Both concerns sit behind async traits ([`kv::KeyValueStore`] and
//! [`queue::WorkQueue`]) with a Redis implementation for deployments and an
//! in-memory implementation for tests and single-process runs.

pub mod error;
pub mod kv;
pub mod models;
pub mod queue;
pub mod repositories;

pub use error::StoreError;

use redis::aio::ConnectionManager;

/// Open a managed Redis connection (reconnects automatically).
pub async fn connect(redis_url: &str) -> Result<ConnectionManager, StoreError> {
    let client = redis::Client::open(redis_url)?;
    let conn = ConnectionManager::new(client).await?;
    Ok(conn)
}

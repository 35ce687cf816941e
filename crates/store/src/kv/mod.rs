//! TTL-bound key-value storage for job metadata.
//!
//! Every write carries the retention window and refreshes expiry, so a job
//! that keeps receiving progress updates outlives a quiescent one only by
//! virtue of those writes.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreError;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

/// Per-key atomic string store with expiry.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Write `value` under `key`, replacing any previous value and resetting
    /// its expiry to `ttl`.
    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError>;

    /// Read the value under `key`; `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Replace the value under `key` only if it still equals `expected`.
    ///
    /// Returns `false` and writes nothing when the key was changed, deleted
    /// or expired since `expected` was read.
    async fn compare_and_put(
        &self,
        key: &str,
        expected: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError>;

    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Cheap reachability probe used by health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

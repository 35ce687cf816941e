//! Ordered, bounded queue of job references.
//!
//! Entries move through three lists:
//!
//! - pending: admitted, waiting for a worker (strict FIFO)
//! - in-flight: dequeued by exactly one worker, kept for crash bookkeeping
//! - failed: execution attempts that ended in an error
//!
//! [`WorkQueue::dequeue`] is the serialization point: an entry is moved from
//! pending to in-flight atomically, so two workers can never both receive it.

mod memory;
mod redis_queue;

use std::time::Duration;

use async_trait::async_trait;
use motion_core::types::JobId;

use crate::error::StoreError;

pub use memory::MemoryWorkQueue;
pub use redis_queue::RedisWorkQueue;

/// Upper bound on the failed registry; older entries are trimmed.
pub const FAILED_REGISTRY_LIMIT: usize = 1000;

/// Result of an admission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Entry accepted at this 1-indexed position.
    Admitted { position: usize },
    /// Queue already holds `capacity` entries; nothing was written.
    Full { capacity: usize },
}

#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Queue name, used to key the execution sub-record.
    fn name(&self) -> &str;

    /// Admit `job_id` unless the pending list already holds `capacity`
    /// entries. The capacity check and the push are a single atomic step.
    async fn enqueue(&self, job_id: JobId, capacity: usize) -> Result<Admission, StoreError>;

    /// Live 1-indexed position of a pending entry; `None` once dequeued.
    async fn position_of(&self, job_id: JobId) -> Result<Option<usize>, StoreError>;

    /// Number of pending entries.
    async fn len(&self) -> Result<usize, StoreError>;

    async fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len().await? == 0)
    }

    /// Wait up to `wait` for the oldest pending entry and move it to the
    /// in-flight list.
    async fn dequeue(&self, wait: Duration) -> Result<Option<JobId>, StoreError>;

    /// Drop a finished entry from the in-flight list.
    async fn ack(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Move an in-flight entry to the failed registry. Idempotent: an entry
    /// appears in the registry at most once.
    async fn fail(&self, job_id: JobId) -> Result<(), StoreError>;

    /// Remove a pending entry. Returns whether one was removed.
    async fn remove(&self, job_id: JobId) -> Result<bool, StoreError>;

    async fn in_flight(&self) -> Result<Vec<JobId>, StoreError>;

    /// Most recent failed entries, newest first.
    async fn failed(&self) -> Result<Vec<JobId>, StoreError>;
}

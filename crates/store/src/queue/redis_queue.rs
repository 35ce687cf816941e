use std::time::Duration;

use async_trait::async_trait;
use motion_core::types::JobId;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};

use super::{Admission, WorkQueue, FAILED_REGISTRY_LIMIT};
use crate::error::StoreError;

/// Push unless full. Returns the new length (the entry's position, since
/// entries are pushed on the left and popped from the right) or -1.
const ENQUEUE_SCRIPT: &str = r"
local len = redis.call('LLEN', KEYS[1])
if len >= tonumber(ARGV[2]) then
    return -1
end
return redis.call('LPUSH', KEYS[1], ARGV[1])
";

/// 1-indexed distance from the pop end, or -1 when absent.
const POSITION_SCRIPT: &str = r"
local idx = redis.call('LPOS', KEYS[1], ARGV[1])
if not idx then
    return -1
end
return redis.call('LLEN', KEYS[1]) - idx
";

/// [`WorkQueue`] backed by three Redis lists.
///
/// `BRPOPLPUSH` moves an entry from `{name}` to `{name}:processing` in one
/// step, so a crashed worker leaves its entry behind for the watchdog.
/// Blocking dequeues hold the connection, so give the queue its own
/// [`ConnectionManager`] rather than sharing the store's.
#[derive(Clone)]
pub struct RedisWorkQueue {
    redis: ConnectionManager,
    queue_name: String,
    processing_queue: String,
    failed_queue: String,
}

impl RedisWorkQueue {
    pub fn new(redis: ConnectionManager, queue_name: &str) -> Self {
        Self {
            redis,
            queue_name: queue_name.to_string(),
            processing_queue: format!("{queue_name}:processing"),
            failed_queue: format!("{queue_name}:failed"),
        }
    }
}

fn parse_ids(raw: Vec<String>, list: &str) -> Vec<JobId> {
    raw.into_iter()
        .filter_map(|s| match s.parse::<JobId>() {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(list, entry = %s, error = %e, "Skipping malformed queue entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    fn name(&self) -> &str {
        &self.queue_name
    }

    async fn enqueue(&self, job_id: JobId, capacity: usize) -> Result<Admission, StoreError> {
        let mut conn = self.redis.clone();
        let position: i64 = Script::new(ENQUEUE_SCRIPT)
            .key(&self.queue_name)
            .arg(job_id.to_string())
            .arg(capacity)
            .invoke_async(&mut conn)
            .await?;

        if position < 0 {
            Ok(Admission::Full { capacity })
        } else {
            Ok(Admission::Admitted {
                position: position as usize,
            })
        }
    }

    async fn position_of(&self, job_id: JobId) -> Result<Option<usize>, StoreError> {
        let mut conn = self.redis.clone();
        let position: i64 = Script::new(POSITION_SCRIPT)
            .key(&self.queue_name)
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await?;
        Ok((position > 0).then_some(position as usize))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        let mut conn = self.redis.clone();
        let len: usize = conn.llen(&self.queue_name).await?;
        Ok(len)
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<JobId>, StoreError> {
        let mut conn = self.redis.clone();
        // A zero timeout would block forever.
        let timeout_secs = wait.as_secs().max(1);

        let entry: Option<String> = redis::cmd("BRPOPLPUSH")
            .arg(&self.queue_name)
            .arg(&self.processing_queue)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await?;

        match entry {
            Some(raw) => match raw.parse::<JobId>() {
                Ok(id) => Ok(Some(id)),
                Err(e) => {
                    tracing::warn!(entry = %raw, error = %e, "Discarding malformed queue entry");
                    conn.lrem::<_, _, ()>(&self.processing_queue, 1, &raw).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn ack(&self, job_id: JobId) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        conn.lrem::<_, _, ()>(&self.processing_queue, 1, job_id.to_string())
            .await?;
        Ok(())
    }

    async fn fail(&self, job_id: JobId) -> Result<(), StoreError> {
        let mut conn = self.redis.clone();
        let id = job_id.to_string();
        redis::pipe()
            .atomic()
            .lrem(&self.processing_queue, 1, &id)
            .ignore()
            .lrem(&self.failed_queue, 0, &id)
            .ignore()
            .lpush(&self.failed_queue, &id)
            .ignore()
            .ltrim(&self.failed_queue, 0, FAILED_REGISTRY_LIMIT as isize - 1)
            .ignore()
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove(&self, job_id: JobId) -> Result<bool, StoreError> {
        let mut conn = self.redis.clone();
        let removed: i64 = conn
            .lrem(&self.queue_name, 1, job_id.to_string())
            .await?;
        Ok(removed > 0)
    }

    async fn in_flight(&self) -> Result<Vec<JobId>, StoreError> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.lrange(&self.processing_queue, 0, -1).await?;
        Ok(parse_ids(raw, &self.processing_queue))
    }

    async fn failed(&self) -> Result<Vec<JobId>, StoreError> {
        let mut conn = self.redis.clone();
        let raw: Vec<String> = conn.lrange(&self.failed_queue, 0, -1).await?;
        Ok(parse_ids(raw, &self.failed_queue))
    }
}

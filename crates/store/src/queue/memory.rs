use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use motion_core::types::JobId;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use super::{Admission, WorkQueue, FAILED_REGISTRY_LIMIT};
use crate::error::StoreError;

#[derive(Default)]
struct Lists {
    pending: VecDeque<JobId>,
    in_flight: Vec<JobId>,
    failed: VecDeque<JobId>,
}

/// In-process [`WorkQueue`] with the same semantics as the Redis one.
pub struct MemoryWorkQueue {
    name: String,
    lists: Mutex<Lists>,
    available: Notify,
}

impl MemoryWorkQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            lists: Mutex::new(Lists::default()),
            available: Notify::new(),
        }
    }
}

#[async_trait]
impl WorkQueue for MemoryWorkQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn enqueue(&self, job_id: JobId, capacity: usize) -> Result<Admission, StoreError> {
        let mut lists = self.lists.lock().await;
        if lists.pending.len() >= capacity {
            return Ok(Admission::Full { capacity });
        }
        lists.pending.push_back(job_id);
        let position = lists.pending.len();
        drop(lists);

        self.available.notify_one();
        Ok(Admission::Admitted { position })
    }

    async fn position_of(&self, job_id: JobId) -> Result<Option<usize>, StoreError> {
        let lists = self.lists.lock().await;
        Ok(lists
            .pending
            .iter()
            .position(|id| *id == job_id)
            .map(|idx| idx + 1))
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lists.lock().await.pending.len())
    }

    async fn dequeue(&self, wait: Duration) -> Result<Option<JobId>, StoreError> {
        let deadline = Instant::now() + wait;
        loop {
            {
                let mut lists = self.lists.lock().await;
                if let Some(job_id) = lists.pending.pop_front() {
                    lists.in_flight.push(job_id);
                    return Ok(Some(job_id));
                }
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            // Either a wake-up or the deadline; both re-check the list.
            let _ = tokio::time::timeout(remaining, self.available.notified()).await;
        }
    }

    async fn ack(&self, job_id: JobId) -> Result<(), StoreError> {
        self.lists.lock().await.in_flight.retain(|id| *id != job_id);
        Ok(())
    }

    async fn fail(&self, job_id: JobId) -> Result<(), StoreError> {
        let mut lists = self.lists.lock().await;
        lists.in_flight.retain(|id| *id != job_id);
        lists.failed.retain(|id| *id != job_id);
        lists.failed.push_front(job_id);
        lists.failed.truncate(FAILED_REGISTRY_LIMIT);
        Ok(())
    }

    async fn remove(&self, job_id: JobId) -> Result<bool, StoreError> {
        let mut lists = self.lists.lock().await;
        let before = lists.pending.len();
        lists.pending.retain(|id| *id != job_id);
        Ok(lists.pending.len() != before)
    }

    async fn in_flight(&self) -> Result<Vec<JobId>, StoreError> {
        Ok(self.lists.lock().await.in_flight.clone())
    }

    async fn failed(&self) -> Result<Vec<JobId>, StoreError> {
        Ok(self.lists.lock().await.failed.iter().copied().collect())
    }
}

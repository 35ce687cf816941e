//! Integration tests for the worker loop over the in-memory store and queue
//! with scripted generators:
//! - success path ends COMPLETED at 100 with non-decreasing progress
//! - out-of-memory mid-generation ends FAILED with a memory diagnostic
//! - hard deadline fails the job by timeout and releases the engine first
//! - racing workers start a job exactly once
//! - watchdog timeouts and reconciliation

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use motion_core::failure::FailureCategory;
use motion_core::generation::{GenerationSettings, MotionPreset, QualityMode, Resolution};
use motion_core::scheduling::JobStatus;
use motion_core::storage;
use motion_pipeline::{
    CancelFlag, EngineHandle, GenerationError, GenerationOutcome, GenerationRequest, Generator,
};
use motion_store::kv::MemoryStore;
use motion_store::models::execution::ExecutionRecord;
use motion_store::models::job::JobRecord;
use motion_store::queue::{MemoryWorkQueue, WorkQueue};
use motion_store::repositories::JobRepo;
use motion_worker::executor::JobExecutor;
use motion_worker::runner::Worker;
use motion_worker::timeout::TimeoutStrategy;
use motion_worker::watchdog::{SweepReport, Watchdog};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Scripted generators
// ---------------------------------------------------------------------------

/// Steps through `total` steps and writes the output file.
struct StepGenerator {
    total: u32,
}

impl Generator for StepGenerator {
    fn load(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        on_step: &mut dyn FnMut(u32, u32),
        _cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        for step in 1..=self.total {
            on_step(step, self.total);
        }
        std::fs::write(&request.output_path, b"mp4")?;
        Ok(GenerationOutcome {
            video_path: request.output_path.clone(),
        })
    }
}

/// Runs out of accelerator memory halfway through.
struct OomGenerator;

impl Generator for OomGenerator {
    fn load(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        _request: &GenerationRequest,
        on_step: &mut dyn FnMut(u32, u32),
        _cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        on_step(10, 40);
        on_step(20, 40);
        Err(GenerationError::OutOfMemory(
            "CUDA out of memory. Tried to allocate 2.00 GiB".into(),
        ))
    }
}

/// Spins until cancelled.
struct StuckGenerator;

impl Generator for StuckGenerator {
    fn load(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        _request: &GenerationRequest,
        _on_step: &mut dyn FnMut(u32, u32),
        cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        while !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(10));
        }
        Err(GenerationError::Cancelled)
    }
}

/// Ignores cancellation and runs for a fixed time; counts engine releases.
struct DeafGenerator {
    runtime: Duration,
    releases: Arc<AtomicUsize>,
}

impl Generator for DeafGenerator {
    fn load(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        _on_step: &mut dyn FnMut(u32, u32),
        _cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        std::thread::sleep(self.runtime);
        std::fs::write(&request.output_path, b"mp4")?;
        Ok(GenerationOutcome {
            video_path: request.output_path.clone(),
        })
    }

    fn release(&self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Harness {
    repo: JobRepo,
    queue: Arc<MemoryWorkQueue>,
    hot: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let repo = JobRepo::new(Arc::new(MemoryStore::new()), Duration::from_secs(3600));
        Self {
            repo,
            queue: Arc::new(MemoryWorkQueue::new("svd_jobs")),
            hot: tempfile::tempdir().unwrap(),
        }
    }

    fn hot(&self) -> &Path {
        self.hot.path()
    }

    async fn submit(&self) -> Uuid {
        let job_id = Uuid::new_v4();
        let image_path = storage::input_path(self.hot(), job_id);
        std::fs::write(&image_path, b"png").unwrap();

        let settings = GenerationSettings {
            duration: 3,
            resolution: Resolution::P720,
            motion_preset: MotionPreset::DollyIn,
            visual_style: None,
            quality_mode: Some(QualityMode::Fast),
            user_prompt: None,
            custom_fps: None,
            custom_steps: None,
        };
        let record = JobRecord::queued(
            job_id,
            7,
            image_path.to_string_lossy().into_owned(),
            settings,
        );
        self.repo.create(&record).await.unwrap();
        self.repo
            .put_execution(&ExecutionRecord::enqueued(job_id, self.queue.name()))
            .await
            .unwrap();
        self.queue.enqueue(job_id, 10).await.unwrap();
        job_id
    }

    fn worker(&self, id: &str, generator: Arc<dyn Generator>, timeout: TimeoutStrategy) -> Worker {
        let executor = JobExecutor::new(
            self.repo.clone(),
            EngineHandle::new(generator),
            timeout,
            self.hot().to_path_buf(),
        );
        Worker::new(
            id,
            self.queue.clone(),
            self.repo.clone(),
            executor,
            Duration::from_millis(50),
        )
    }
}

// ---------------------------------------------------------------------------
// Test: successful job ends COMPLETED at 100 and is acked
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn successful_job_completes() {
    let h = Harness::new();
    let job_id = h.submit().await;
    let worker = h.worker("w1", Arc::new(StepGenerator { total: 30 }), TimeoutStrategy::WatchdogOnly);

    assert_eq!(worker.process_next().await.unwrap(), Some(job_id));

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.progress, 100.0);
    assert_eq!(record.applied_fps, Some(18));
    assert_eq!(record.applied_steps, Some(30));
    let video = record.video_path.clone().unwrap();
    assert!(Path::new(&video).exists());
    assert!(record.invariant_violation().is_none());

    assert!(h.queue.in_flight().await.unwrap().is_empty());
    assert!(h.queue.failed().await.unwrap().is_empty());

    let execution = h.repo.find_execution(job_id).await.unwrap().unwrap();
    assert_eq!(execution.worker_id.as_deref(), Some("w1"));
}

// ---------------------------------------------------------------------------
// Test: progress observed by a poller never decreases and ends at 100
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn observed_progress_is_monotonic() {
    let h = Harness::new();
    let job_id = h.submit().await;
    let worker = h.worker("w1", Arc::new(StepGenerator { total: 200 }), TimeoutStrategy::WatchdogOnly);

    let samples = Arc::new(Mutex::new(Vec::new()));
    let done = CancellationToken::new();
    let poller = {
        let repo = h.repo.clone();
        let samples = samples.clone();
        let done = done.clone();
        tokio::spawn(async move {
            while !done.is_cancelled() {
                if let Some(r) = repo.find(job_id).await.unwrap() {
                    samples.lock().unwrap().push(r.progress);
                }
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
    };

    worker.process_next().await.unwrap();
    done.cancel();
    poller.await.unwrap();

    let samples = samples.lock().unwrap();
    assert!(samples.windows(2).all(|w| w[0] <= w[1]), "{samples:?}");
    assert_eq!(h.repo.find(job_id).await.unwrap().unwrap().progress, 100.0);
}

// ---------------------------------------------------------------------------
// Test: out-of-memory ends FAILED with a memory diagnostic
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oom_mid_generation_fails_job() {
    let h = Harness::new();
    let job_id = h.submit().await;
    let worker = h.worker("w1", Arc::new(OomGenerator), TimeoutStrategy::WatchdogOnly);

    worker.process_next().await.unwrap();

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_category, Some(FailureCategory::OutOfMemory));
    assert!(record.error.as_deref().unwrap().contains("out of memory"));
    assert!(record.completed_at.is_some());
    assert!(record.video_path.is_none());
    assert!(record.message.as_deref().unwrap().contains("lower resolution"));

    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
    assert!(h.queue.in_flight().await.unwrap().is_empty());
}

// ---------------------------------------------------------------------------
// Test: missing input image fails as a configuration error
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_input_image_fails() {
    let h = Harness::new();
    let job_id = h.submit().await;
    std::fs::remove_file(storage::input_path(h.hot(), job_id)).unwrap();
    let worker = h.worker("w1", Arc::new(StepGenerator { total: 5 }), TimeoutStrategy::WatchdogOnly);

    worker.process_next().await.unwrap();

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_category, Some(FailureCategory::Configuration));
}

// ---------------------------------------------------------------------------
// Test: hard deadline cancels the run and fails by timeout
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn hard_deadline_fails_by_timeout() {
    let h = Harness::new();
    let job_id = h.submit().await;
    let worker = h.worker(
        "w1",
        Arc::new(StuckGenerator),
        TimeoutStrategy::HardDeadline(Duration::from_millis(200)),
    );

    worker.process_next().await.unwrap();

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_category, Some(FailureCategory::Timeout));
    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
}

// ---------------------------------------------------------------------------
// Test: a run that ignores cancellation still releases the engine before the
// worker takes the next job
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn deadline_waits_for_engine_release() {
    let h = Harness::new();
    let first = h.submit().await;
    let second = h.submit().await;
    let releases = Arc::new(AtomicUsize::new(0));
    let worker = h.worker(
        "w1",
        Arc::new(DeafGenerator {
            runtime: Duration::from_millis(600),
            releases: releases.clone(),
        }),
        TimeoutStrategy::HardDeadline(Duration::from_millis(200)),
    );

    assert_eq!(worker.process_next().await.unwrap(), Some(first));
    assert_eq!(releases.load(Ordering::SeqCst), 1);

    let record = h.repo.find(first).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_category, Some(FailureCategory::Timeout));

    // The next job is still waiting; nothing started it while the engine was busy.
    assert_eq!(
        h.repo.find(second).await.unwrap().unwrap().status,
        JobStatus::Queued
    );
    assert_eq!(h.queue.position_of(second).await.unwrap(), Some(1));
}

// ---------------------------------------------------------------------------
// Test: two workers racing for one job start it exactly once
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_workers_start_job_once() {
    let h = Harness::new();
    let job_id = h.submit().await;
    let a = h.worker("a", Arc::new(StepGenerator { total: 3 }), TimeoutStrategy::WatchdogOnly);
    let b = h.worker("b", Arc::new(StepGenerator { total: 3 }), TimeoutStrategy::WatchdogOnly);

    let (ra, rb) = tokio::join!(a.process_next(), b.process_next());
    let picked: Vec<_> = [ra.unwrap(), rb.unwrap()].into_iter().flatten().collect();

    assert_eq!(picked, vec![job_id]);
    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Completed);
}

// ---------------------------------------------------------------------------
// Test: the run loop drains the queue and stops on cancel
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn run_loop_drains_queue_until_cancelled() {
    let h = Harness::new();
    let first = h.submit().await;
    let second = h.submit().await;
    let worker = h.worker("w1", Arc::new(StepGenerator { total: 2 }), TimeoutStrategy::WatchdogOnly);

    let cancel = CancellationToken::new();
    let handle = tokio::spawn(worker.run(cancel.clone()));

    for _ in 0..200 {
        if h.queue.is_empty().await.unwrap() && h.queue.in_flight().await.unwrap().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    cancel.cancel();
    handle.await.unwrap();

    for job_id in [first, second] {
        let record = h.repo.find(job_id).await.unwrap().unwrap();
        assert_eq!(record.status, JobStatus::Completed);
    }
}

// ---------------------------------------------------------------------------
// Test: watchdog fails an overrunning job; the worker's late write loses
// ---------------------------------------------------------------------------

#[tokio::test]
async fn watchdog_times_out_processing_job() {
    let h = Harness::new();
    let job_id = h.submit().await;
    h.queue.dequeue(Duration::ZERO).await.unwrap();
    h.repo.mark_started(job_id).await.unwrap();

    let watchdog = Watchdog::new(h.queue.clone(), h.repo.clone(), Duration::ZERO, Duration::from_secs(300));
    let report = watchdog.sweep().await.unwrap();
    assert_eq!(report.timed_out, 1);

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert_eq!(record.error_category, Some(FailureCategory::Timeout));

    // Worker finishing afterwards cannot overwrite the terminal state.
    assert!(h.repo.complete(job_id, "/late.mp4", 24, 40).await.is_err());

    // Next sweep settles the in-flight entry into the failed registry.
    let report = watchdog.sweep().await.unwrap();
    assert_eq!(report.settled, 1);
    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
    assert!(h.queue.in_flight().await.unwrap().is_empty());
}

#[tokio::test]
async fn watchdog_leaves_young_jobs_alone() {
    let h = Harness::new();
    let job_id = h.submit().await;
    h.queue.dequeue(Duration::ZERO).await.unwrap();
    h.repo.mark_started(job_id).await.unwrap();

    let watchdog = Watchdog::new(
        h.queue.clone(),
        h.repo.clone(),
        Duration::from_secs(1200),
        Duration::from_secs(300),
    );
    assert_eq!(watchdog.sweep().await.unwrap(), SweepReport::default());
    assert_eq!(
        h.repo.find(job_id).await.unwrap().unwrap().status,
        JobStatus::Processing
    );
}

#[tokio::test]
async fn watchdog_fails_job_abandoned_before_start() {
    let h = Harness::new();
    let job_id = h.submit().await;
    h.queue.dequeue(Duration::ZERO).await.unwrap();
    h.repo.mark_dequeued(job_id, "dead-worker").await.unwrap();

    let watchdog = Watchdog::new(h.queue.clone(), h.repo.clone(), Duration::from_secs(1200), Duration::ZERO);
    let report = watchdog.sweep().await.unwrap();
    assert_eq!(report.abandoned, 1);

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.error.is_some());
    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
}

#[tokio::test]
async fn watchdog_reclaims_entry_dequeued_without_bookkeeping() {
    let h = Harness::new();
    let job_id = h.submit().await;
    // Worker died right after taking the entry.
    h.queue.dequeue(Duration::ZERO).await.unwrap();

    let watchdog = Watchdog::new(h.queue.clone(), h.repo.clone(), Duration::from_secs(1200), Duration::ZERO);
    let report = watchdog.sweep().await.unwrap();
    assert_eq!(report.abandoned, 1);

    let record = h.repo.find(job_id).await.unwrap().unwrap();
    assert_eq!(record.status, JobStatus::Failed);
    assert!(h.queue.in_flight().await.unwrap().is_empty());
    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
}

#[tokio::test]
async fn watchdog_acks_completed_entry_left_in_flight() {
    let h = Harness::new();
    let job_id = h.submit().await;
    h.queue.dequeue(Duration::ZERO).await.unwrap();
    h.repo.mark_started(job_id).await.unwrap();
    h.repo.complete(job_id, "/out.mp4", 24, 40).await.unwrap();

    let watchdog = Watchdog::new(h.queue.clone(), h.repo.clone(), Duration::ZERO, Duration::ZERO);
    assert_eq!(watchdog.sweep().await.unwrap().settled, 1);
    assert!(h.queue.in_flight().await.unwrap().is_empty());
    assert!(h.queue.failed().await.unwrap().is_empty());
}

#[tokio::test]
async fn watchdog_settles_expired_record() {
    let h = Harness::new();
    let job_id = h.submit().await;
    h.queue.dequeue(Duration::ZERO).await.unwrap();
    h.repo.delete(job_id).await.unwrap();

    let watchdog = Watchdog::new(h.queue.clone(), h.repo.clone(), Duration::ZERO, Duration::ZERO);
    assert_eq!(watchdog.sweep().await.unwrap().settled, 1);
    assert_eq!(h.queue.failed().await.unwrap(), vec![job_id]);
}

//! Integration tests for the worker's Redis wiring.
//!
//! These tests need a running Redis.
//! Run with: REDIS_URL=redis://localhost:6379/0 cargo test -p motion-worker --test redis_backends -- --ignored

use std::time::{Duration, Instant};

use motion_worker::backends::RedisBackends;
use uuid::Uuid;

fn redis_url() -> String {
    std::env::var("REDIS_URL").expect("REDIS_URL environment variable must be set for integration tests")
}

async fn connect() -> RedisBackends {
    let queue_name = format!("test_jobs_{}", Uuid::new_v4().simple());
    RedisBackends::connect(&redis_url(), &queue_name, Duration::from_secs(60))
        .await
        .unwrap()
}

#[tokio::test]
#[ignore] // Run with: cargo test -p motion-worker --test redis_backends -- --ignored
async fn watchdog_is_not_blocked_by_waiting_dequeue() {
    let backends = connect().await;

    let queue = backends.queue.clone();
    let dequeue = tokio::spawn(async move { queue.dequeue(Duration::from_secs(3)).await });
    // Let BRPOPLPUSH reach the server.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let started = Instant::now();
    assert!(backends.watchdog_queue.in_flight().await.unwrap().is_empty());
    backends.repo.ping().await.unwrap();
    assert!(
        started.elapsed() < Duration::from_secs(1),
        "watchdog waited {:?} behind the blocking dequeue",
        started.elapsed()
    );

    assert_eq!(dequeue.await.unwrap().unwrap(), None);
}

#[tokio::test]
#[ignore] // Run with: cargo test -p motion-worker --test redis_backends -- --ignored
async fn watchdog_sees_worker_in_flight_entry() {
    let backends = connect().await;
    let job_id = Uuid::new_v4();

    backends.queue.enqueue(job_id, 10).await.unwrap();
    assert_eq!(
        backends.queue.dequeue(Duration::from_secs(1)).await.unwrap(),
        Some(job_id)
    );
    assert_eq!(backends.watchdog_queue.in_flight().await.unwrap(), vec![job_id]);

    backends.queue.ack(job_id).await.unwrap();
    assert!(backends.watchdog_queue.in_flight().await.unwrap().is_empty());
}

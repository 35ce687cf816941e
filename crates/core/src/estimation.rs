//! Rough wait-time estimate returned on submission.

/// Assumed processing time per job ahead in the queue, in seconds.
pub const SECS_PER_QUEUED_JOB: u64 = 60;

/// Estimated seconds until a job at `queue_position` (1-indexed) finishes.
///
/// Linear in position; intentionally coarse.
pub fn estimate_wait_secs(queue_position: usize) -> u64 {
    queue_position as u64 * SECS_PER_QUEUED_JOB
}

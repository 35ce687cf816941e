//! Worker process: pulls job references off the work queue and drives each
//! one through generation, plus the background tasks that keep the queue
//! and storage honest (watchdog, stale file cleanup).

pub mod backends;
pub mod cleanup;
pub mod config;
pub mod executor;
pub mod runner;
pub mod timeout;
pub mod watchdog;

pub mod execution;
pub mod job;

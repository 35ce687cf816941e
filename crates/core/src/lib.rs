//! Domain logic shared by the API server, the worker and the polling client.
//!
//! This crate has zero internal dependencies so every other crate in the
//! workspace can use it without cycles.

pub mod error;
pub mod estimation;
pub mod failure;
pub mod generation;
pub mod progress;
pub mod scheduling;
pub mod storage;
pub mod types;

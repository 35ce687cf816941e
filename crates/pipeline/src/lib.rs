//! The generation step as seen by the worker.
//!
//! The diffusion model itself is opaque: it consumes an image plus numeric
//! parameters, writes an output file and reports `(completed, total)` steps.
//! This crate defines that contract ([`generator::Generator`]), the owned
//! per-process [`engine::EngineHandle`] that brackets every run with
//! accelerator acquire/release, and an adapter that drives an external
//! program ([`external::ExternalCommandGenerator`]).

pub mod engine;
pub mod error;
pub mod external;
pub mod generator;

pub use engine::{CancelFlag, EngineHandle};
pub use error::GenerationError;
pub use generator::{GenerationOutcome, GenerationRequest, Generator, ProgressEvent};

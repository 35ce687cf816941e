//! Client side of the job API: submission, status polling with retry and
//! wait-budget handling, and progress rendering for chat-style front-ends.

pub mod api;
pub mod backoff;
pub mod error;
pub mod poller;
pub mod render;
pub mod status;

pub use api::MotionApi;
pub use error::ClientError;
pub use poller::{poll_job, PollConfig, PollOutcome, PollState, ProgressSink, StatusSource};
pub use status::StatusPayload;

//! Owned, per-process handle to the generation engine.
//!
//! The worker receives one [`EngineHandle`] at startup. Every run goes
//! through [`EngineHandle::run`], which holds an [`EngineLease`] for the
//! duration of the call; dropping the lease releases accelerator memory,
//! including when the generator panics.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::GenerationError;
use crate::generator::{GenerationOutcome, GenerationRequest, Generator, ProgressEvent};

// ---------------------------------------------------------------------------
// Cancellation flag
// ---------------------------------------------------------------------------

/// Cooperative cancellation shared between the worker and a blocking run.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Engine handle
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct EngineHandle {
    generator: Arc<dyn Generator>,
}

/// Scope guard for one run; releases the engine on drop.
pub struct EngineLease<'a> {
    generator: &'a dyn Generator,
}

impl Drop for EngineLease<'_> {
    fn drop(&mut self) {
        self.generator.release();
        tracing::debug!("Released generation engine");
    }
}

impl EngineHandle {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    pub fn acquire(&self) -> EngineLease<'_> {
        EngineLease {
            generator: self.generator.as_ref(),
        }
    }

    /// Run one generation, reporting every stage through `on_progress`.
    ///
    /// Blocking; call from a blocking thread.
    pub fn run(
        &self,
        request: &GenerationRequest,
        on_progress: &mut dyn FnMut(ProgressEvent),
        cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        let lease = self.acquire();

        on_progress(ProgressEvent::ModelLoading);
        lease.generator.load()?;
        on_progress(ProgressEvent::ModelReady);

        if cancel.is_cancelled() {
            return Err(GenerationError::Cancelled);
        }

        let outcome = lease.generator.generate(
            request,
            &mut |completed, total| on_progress(ProgressEvent::Step { completed, total }),
            cancel,
        )?;

        on_progress(ProgressEvent::Finalizing);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    use assert_matches::assert_matches;
    use motion_core::generation::{GenerationSettings, MotionPreset, Resolution};
    use uuid::Uuid;

    use super::*;

    #[derive(Default)]
    struct CountingGenerator {
        releases: AtomicUsize,
        fail_with_oom: bool,
        panic: bool,
    }

    impl Generator for CountingGenerator {
        fn load(&self) -> Result<(), GenerationError> {
            Ok(())
        }

        fn generate(
            &self,
            request: &GenerationRequest,
            on_step: &mut dyn FnMut(u32, u32),
            _cancel: &CancelFlag,
        ) -> Result<GenerationOutcome, GenerationError> {
            on_step(1, 2);
            if self.panic {
                panic!("model exploded");
            }
            if self.fail_with_oom {
                return Err(GenerationError::OutOfMemory("CUDA out of memory".into()));
            }
            on_step(2, 2);
            Ok(GenerationOutcome {
                video_path: request.output_path.clone(),
            })
        }

        fn release(&self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request() -> GenerationRequest {
        let settings = GenerationSettings {
            duration: 3,
            resolution: Resolution::P360,
            motion_preset: MotionPreset::Smooth,
            visual_style: None,
            quality_mode: None,
            user_prompt: None,
            custom_fps: None,
            custom_steps: None,
        };
        GenerationRequest {
            job_id: Uuid::new_v4(),
            image_path: PathBuf::from("in.jpg"),
            output_path: PathBuf::from("out.mp4"),
            params: settings.resolve(),
        }
    }

    #[test]
    fn successful_run_reports_bands_in_order() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = EngineHandle::new(generator.clone());

        let mut seen = Vec::new();
        let outcome = engine
            .run(&request(), &mut |e| seen.push(e.percent()), &CancelFlag::new())
            .unwrap();

        assert_eq!(outcome.video_path, PathBuf::from("out.mp4"));
        assert_eq!(seen, vec![5.0, 20.0, 57.5, 85.0, 90.0]);
        assert_eq!(generator.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_run_still_releases() {
        let generator = Arc::new(CountingGenerator {
            fail_with_oom: true,
            ..Default::default()
        });
        let engine = EngineHandle::new(generator.clone());

        let result = engine.run(&request(), &mut |_| {}, &CancelFlag::new());
        assert_matches!(result, Err(GenerationError::OutOfMemory(_)));
        assert_eq!(generator.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn panicking_run_still_releases() {
        let generator = Arc::new(CountingGenerator {
            panic: true,
            ..Default::default()
        });
        let engine = EngineHandle::new(generator.clone());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            engine.run(&request(), &mut |_| {}, &CancelFlag::new())
        }));
        assert!(result.is_err());
        assert_eq!(generator.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cancelled_before_generation() {
        let generator = Arc::new(CountingGenerator::default());
        let engine = EngineHandle::new(generator.clone());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let result = engine.run(&request(), &mut |_| {}, &cancel);
        assert_matches!(result, Err(GenerationError::Cancelled));
        assert_eq!(generator.releases.load(Ordering::SeqCst), 1);
    }
}

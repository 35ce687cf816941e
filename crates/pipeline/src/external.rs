//! [`Generator`] backed by an external program.
//!
//! The program receives the request as JSON on stdin and the input/output
//! paths in `MOTION_INPUT_PATH` / `MOTION_OUTPUT_PATH`. It reports progress
//! by printing `progress <completed>/<total>` lines on stdout and signals
//! failure with a non-zero exit code; stderr is kept as the diagnostic.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;
use tokio::runtime::Handle;

use crate::engine::CancelFlag;
use crate::error::GenerationError;
use crate::generator::{GenerationOutcome, GenerationRequest, Generator};

/// Maximum stderr captured per run (1 MiB).
const MAX_STDERR_BYTES: u64 = 1024 * 1024;

/// How often a running process is checked for cancellation.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct ExternalCommandGenerator {
    program: PathBuf,
    args: Vec<String>,
    runtime: Handle,
}

impl ExternalCommandGenerator {
    /// `runtime` drives the child's I/O from the blocking thread the worker
    /// calls [`Generator::generate`] on.
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>, runtime: Handle) -> Self {
        Self {
            program: program.into(),
            args,
            runtime,
        }
    }

    /// Build from a whitespace-separated command line such as
    /// `python3 generate.py --model svd`.
    pub fn from_command_line(command_line: &str, runtime: Handle) -> Result<Self, GenerationError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| GenerationError::Configuration("empty generator command".into()))?;
        Ok(Self::new(program, parts.collect(), runtime))
    }

    async fn run(
        &self,
        request: &GenerationRequest,
        on_step: &mut dyn FnMut(u32, u32),
        cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        let payload = serde_json::to_vec(request)
            .map_err(|e| GenerationError::Configuration(e.to_string()))?;

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .env("MOTION_INPUT_PATH", &request.image_path)
            .env("MOTION_OUTPUT_PATH", &request.output_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        if let Some(mut stdin) = child.stdin.take() {
            // The program may exit without reading its input.
            let _ = stdin.write_all(&payload).await;
            drop(stdin);
        }

        let stderr_task = tokio::spawn(read_capped(child.stderr.take()));
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| GenerationError::Failed("generator stdout not captured".into()))?;
        let mut lines = BufReader::new(stdout).lines();
        let mut ticker = tokio::time::interval(CANCEL_POLL_INTERVAL);

        loop {
            tokio::select! {
                line = lines.next_line() => match line? {
                    Some(line) => match parse_progress(&line) {
                        Some((completed, total)) => on_step(completed, total),
                        None => tracing::debug!(job_id = %request.job_id, line = %line, "generator output"),
                    },
                    None => break,
                },
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        let _ = child.kill().await;
                        return Err(GenerationError::Cancelled);
                    }
                }
            }
        }

        let status = child.wait().await?;
        let stderr_bytes = stderr_task.await.unwrap_or_default();
        let stderr = String::from_utf8_lossy(&stderr_bytes).into_owned();

        if !status.success() {
            return Err(GenerationError::ProcessFailed {
                exit_code: status.code().unwrap_or(-1),
                stderr,
            });
        }
        if tokio::fs::metadata(&request.output_path).await.is_err() {
            return Err(GenerationError::Failed(format!(
                "generator exited without writing {}",
                request.output_path.display()
            )));
        }

        Ok(GenerationOutcome {
            video_path: request.output_path.clone(),
        })
    }
}

impl Generator for ExternalCommandGenerator {
    fn load(&self) -> Result<(), GenerationError> {
        Ok(())
    }

    fn generate(
        &self,
        request: &GenerationRequest,
        on_step: &mut dyn FnMut(u32, u32),
        cancel: &CancelFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        self.runtime.block_on(self.run(request, on_step, cancel))
    }
}

/// Parse a `progress <completed>/<total>` line.
pub fn parse_progress(line: &str) -> Option<(u32, u32)> {
    let rest = line.trim().strip_prefix("progress")?;
    let (completed, total) = rest.trim().split_once('/')?;
    Some((completed.trim().parse().ok()?, total.trim().parse().ok()?))
}

async fn read_capped<R: AsyncRead + Unpin>(handle: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(h) = handle {
        let _ = h.take(MAX_STDERR_BYTES).read_to_end(&mut buf).await;
    }
    buf
}

//! Text rendering of poll state for chat-style front-ends.
//!
//! Output is bounded: status messages are cut to [`MAX_MESSAGE_CHARS`] and
//! whole texts to [`MAX_TEXT_CHARS`], counted in characters.

use motion_core::failure::FailureCategory;

use crate::poller::PollOutcome;
use crate::status::StatusPayload;

pub const MAX_MESSAGE_CHARS: usize = 150;
pub const MAX_TEXT_CHARS: usize = 4090;
const MAX_ERROR_CHARS: usize = 1000;
const BAR_WIDTH: usize = 10;

/// Cut `text` to at most `limit` characters, marking the cut with `...`.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    let mut out: String = text.chars().take(keep).collect();
    out.push_str("...");
    out
}

/// Ten-cell bar, one filled cell per whole 10 %.
pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) as usize) / 10).min(BAR_WIDTH);
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Progress text for one status read.
///
/// Queued jobs show their position; running jobs show percent, bar and,
/// when present, the status message.
pub fn render_progress(status: &StatusPayload) -> String {
    let percent = status.progress_or_zero();
    let bar = progress_bar(percent);

    let text = match status.queue_position {
        Some(position) if position > 0 => {
            format!("⏳ Queue: {position}\n[{bar}] {percent:.0}%")
        }
        _ => {
            let mut text = format!("🎬 {percent:.0}%\n[{bar}]");
            if let Some(message) = status.message_text() {
                text.push('\n');
                text.push_str(&truncate(&message, MAX_MESSAGE_CHARS));
            }
            text
        }
    };
    truncate(&text, MAX_TEXT_CHARS)
}

/// Final user-facing text for a poll outcome.
pub fn render_outcome(outcome: &PollOutcome) -> String {
    let text = match outcome {
        PollOutcome::Completed(_) => "✅ Video is ready.".to_string(),
        PollOutcome::Failed(status) => {
            let error = status
                .error_text()
                .unwrap_or_else(|| "Unknown error".to_string());
            let mut text = format!(
                "❌ Technical error.\n\nError: {}",
                truncate(&error, MAX_ERROR_CHARS)
            );
            if let Some(hint) = status.error_category.and_then(FailureCategory::remediation) {
                text.push_str("\n\n");
                text.push_str(hint);
            }
            text
        }
        PollOutcome::TimedOut { waited } => format!(
            "⏱️ Processing took longer than {} minutes. Please try again with lower settings.",
            waited.as_secs() / 60
        ),
        PollOutcome::RetriesExceeded { .. } => {
            "❌ Too many failed attempts to reach the server. Please try again later.".to_string()
        }
    };
    truncate(&text, MAX_TEXT_CHARS)
}

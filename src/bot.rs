//! Capture handler: one chat message in, one reply out.
//!
//! ```text
//! Message ─▶ extract_capture ─┬─ None ──────────────────────────▶ Skipped
//!                             └─ CaptureEvent ─┬─ daily ─▶ merge into inbox-<date>.md ─▶ Saved
//!                                              ├─ note  ─▶ inbox-<timestamp>.md       ─▶ Saved
//!                                              └─ queue ─▶ inbox:<millis>:<uuid>      ─▶ Queued
//! ```
//!
//! Failures are returned to the caller, which replies with
//! [`failure_reply`] and then surfaces the error.

use std::time::Duration;
use tracing::info;

use crate::capture::extract_capture;
use crate::config::{CaptureMode, Config};
use crate::contents::{write_daily_file, write_note};
use crate::error::Result;
use crate::format::{format_daily_entry, format_markdown};
use crate::models::QueueMessage;
use crate::queue::enqueue;
use crate::telegram::Message;
use crate::traits::{DocumentStore, Queue};

/// Characters of the note echoed back in the "saved" reply.
pub const PREVIEW_CHARS: usize = 50;

/// Capture settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct CaptureSettings {
    pub mode: CaptureMode,
    pub inbox_dir: String,
    /// Read-merge-write attempts on the daily file.
    pub max_attempts: u32,
    pub queue_ttl: Duration,
}

impl CaptureSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.capture.mode,
            inbox_dir: config.store.inbox_dir.clone(),
            max_attempts: config.store.max_attempts,
            queue_ttl: Duration::from_secs(config.queue.ttl_secs),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// The message had no text.
    Skipped,
    /// Written to the inbox as `filename`.
    Saved { filename: String, preview: String },
    /// Parked in the queue under `key`.
    Queued { key: String },
}

impl CaptureOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            CaptureOutcome::Skipped => "Skipped: not a text message".to_string(),
            CaptureOutcome::Saved { filename, preview } => {
                format!("Saved to inbox: {}\n\"{}\"", filename, preview)
            }
            CaptureOutcome::Queued { .. } => "Queued for classification".to_string(),
        }
    }
}

pub fn failure_reply(error: &dyn std::fmt::Display) -> String {
    format!("Failed to save: {}", error)
}

/// First [`PREVIEW_CHARS`] characters, with `...` when cut.
pub fn preview(text: &str) -> String {
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Capture `message` and persist it according to `settings.mode`.
pub async fn handle_capture(
    store: &dyn DocumentStore,
    queue: &dyn Queue,
    settings: &CaptureSettings,
    message: Option<&Message>,
) -> Result<CaptureOutcome> {
    let Some(event) = extract_capture(message) else {
        return Ok(CaptureOutcome::Skipped);
    };

    match settings.mode {
        CaptureMode::Daily => {
            let output = format_daily_entry(&event);
            let path =
                write_daily_file(store, &settings.inbox_dir, &output, settings.max_attempts)
                    .await?;
            info!(path = %path, source_type = event.source_type.as_str(), "captured to daily file");
            Ok(CaptureOutcome::Saved {
                filename: file_name(&path).to_string(),
                preview: preview(&event.raw_text),
            })
        }
        CaptureMode::Note => {
            let output = format_markdown(&event);
            let path = write_note(store, &settings.inbox_dir, &output).await?;
            info!(path = %path, source_type = event.source_type.as_str(), "captured note");
            Ok(CaptureOutcome::Saved {
                filename: file_name(&path).to_string(),
                preview: preview(&event.raw_text),
            })
        }
        CaptureMode::Queue => {
            let mut queued = QueueMessage::from(&event);
            queued.user_id = message.and_then(|m| m.from.as_ref()).map(|u| u.id);
            let key = enqueue(queue, &queued, settings.queue_ttl).await?;
            info!(key = %key, "captured to queue");
            Ok(CaptureOutcome::Queued { key })
        }
    }
}

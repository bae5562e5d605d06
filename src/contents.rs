//! Write paths into the document store.
//!
//! # Optimistic read-modify-write
//!
//! [`update_document`] is the single place that closes the concurrency
//! loop for shared files:
//!
//! ```text
//! ┌──────┐   ┌────────────┐   ┌──────────────────────┐
//! │ read │──▶│ apply(old) │──▶│ write if rev == old  │── ok ──▶ done
//! └──────┘   └────────────┘   └──────────┬───────────┘
//!     ▲                                  │ conflict / 422
//!     └──────────── re-read ◀────────────┘   (bounded)
//! ```
//!
//! Re-reading is mandatory: retrying the write with the old merged text
//! would silently drop whatever the concurrent writer added.
//!
//! # Forward progress
//!
//! When the bound is exhausted, or a standalone create collides, the write
//! is retried once under an alternate filename carrying a random suffix.

use tracing::{debug, warn};
use uuid::Uuid;

use crate::daily::merge_entry;
use crate::error::{Error, Result};
use crate::models::{DailyFileOutput, MarkdownOutput};
use crate::traits::DocumentStore;

/// Commit message used for captured notes.
pub const CAPTURE_COMMIT_MESSAGE: &str = "sprite: capture inbox item";

/// Read `path`, transform it with `apply`, and write it back conditioned
/// on the revision that was read. Conflicts restart from the read, up to
/// `max_attempts` times in total.
///
/// `apply` receives the current content (`None` when the document does
/// not exist) and returns the new content, or `None` to leave it as is.
/// Returns whether a write happened.
pub async fn update_document<F>(
    store: &dyn DocumentStore,
    path: &str,
    message: &str,
    max_attempts: u32,
    mut apply: F,
) -> Result<bool>
where
    F: FnMut(Option<&str>) -> Option<String>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=max_attempts {
        let current = store.read(path).await?;
        let Some(updated) = apply(current.as_ref().map(|d| d.content.as_str())) else {
            return Ok(false);
        };
        let revision = current.as_ref().map(|d| d.revision.as_str());

        match store.write(path, &updated, revision, message).await {
            Ok(()) => {
                debug!(path, attempt, "document updated");
                return Ok(true);
            }
            Err(e) if e.is_write_retryable() => {
                warn!(path, attempt, max_attempts, error = %e, "write conflict, re-reading");
                last_err = Some(e);
            }
            Err(e) => return Err(e),
        }
    }

    Err(last_err.unwrap_or_else(|| Error::Conflict {
        path: path.to_string(),
    }))
}

/// `name.md` → `name-<8 hex chars>.md`.
pub fn alternate_filename(filename: &str) -> String {
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    match filename.strip_suffix(".md") {
        Some(stem) => format!("{}-{}.md", stem, suffix),
        None => format!("{}-{}", filename, suffix),
    }
}

fn join_path(dir: &str, filename: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        filename.to_string()
    } else {
        format!("{}/{}", dir, filename)
    }
}

/// Merge a capture into its daily file under `inbox_dir`.
///
/// Returns the path actually written, which is the alternate file when the
/// daily file stayed contended for all `max_attempts`.
pub async fn write_daily_file(
    store: &dyn DocumentStore,
    inbox_dir: &str,
    output: &DailyFileOutput,
    max_attempts: u32,
) -> Result<String> {
    let path = join_path(inbox_dir, &output.filename);
    let merge = |existing: Option<&str>| Some(merge_entry(existing, output));

    match update_document(store, &path, CAPTURE_COMMIT_MESSAGE, max_attempts, merge).await {
        Ok(_) => Ok(path),
        Err(e) if e.is_write_retryable() => {
            let fallback = join_path(inbox_dir, &alternate_filename(&output.filename));
            warn!(path = %path, fallback = %fallback, error = %e, "daily file contended, writing alternate file");
            update_document(store, &fallback, CAPTURE_COMMIT_MESSAGE, 1, merge).await?;
            Ok(fallback)
        }
        Err(e) => Err(e),
    }
}

/// Create a standalone note under `inbox_dir`.
///
/// A conflict or 422 on the first create is retried exactly once under an
/// alternate filename; any failure of that retry is returned.
pub async fn write_note(
    store: &dyn DocumentStore,
    inbox_dir: &str,
    output: &MarkdownOutput,
) -> Result<String> {
    let path = join_path(inbox_dir, &output.filename);
    match store
        .write(&path, &output.content, None, CAPTURE_COMMIT_MESSAGE)
        .await
    {
        Ok(()) => Ok(path),
        Err(e) if e.is_write_retryable() => {
            let retry_path = join_path(inbox_dir, &alternate_filename(&output.filename));
            warn!(path = %path, retry_path = %retry_path, error = %e, "note create collided, retrying with suffix");
            store
                .write(&retry_path, &output.content, None, CAPTURE_COMMIT_MESSAGE)
                .await?;
            Ok(retry_path)
        }
        Err(e) => Err(e),
    }
}

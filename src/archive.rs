//! Write classified notes into their category folders.
//!
//! Each classification item becomes one file:
//!
//! ```text
//! <category dir>/<sanitized topic>/<YYYY-MM-DD>-<HH-MM-SS>.md
//! ```
//!
//! Files are written one at a time. A failed write stops the stage but
//! files already written stay; the queue still owns every message, so the
//! next drain cycle retries them.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::config::CategoryDirs;
use crate::contents::update_document;
use crate::error::Result;
use crate::format::escape_yaml_string;
use crate::models::{Category, ClassificationItem, ProcessedMessage};
use crate::traits::DocumentStore;

/// Topic folder used when sanitizing leaves nothing.
pub const DEFAULT_TOPIC: &str = "Misc";
pub const MAX_TOPIC_CHARS: usize = 80;
pub const INDEX_FILENAME: &str = "Index.md";

/// Attempts for each archive write and each topic index update. Every
/// retry re-reads the current revision first.
const WRITE_ATTEMPTS: u32 = 3;

/// A rendered archive file, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub path: String,
    pub topic_dir: String,
    pub filename: String,
    pub content: String,
    pub message: String,
}

/// Result of mapping classification items onto files.
#[derive(Debug, Default)]
pub struct ArchivePlan {
    pub files: Vec<ArchiveFile>,
    /// Items dropped for an unknown category or an out-of-range index.
    pub skipped: usize,
}

/// Keep letters, digits, space, `-` and `_`; trim; cap the length.
pub fn sanitize_topic(topic: &str) -> String {
    let clean: String = topic
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '-' | '_'))
        .collect();
    let capped: String = clean.trim().chars().take(MAX_TOPIC_CHARS).collect();
    let capped = capped.trim_end().to_string();
    if capped.is_empty() {
        DEFAULT_TOPIC.to_string()
    } else {
        capped
    }
}

/// `YYYY-MM-DD-HH-MM-SS.md` from the message's capture time (UTC).
pub fn generate_filename(message: &ProcessedMessage) -> String {
    format!(
        "{}.md",
        message.message.created_at.format("%Y-%m-%d-%H-%M-%S")
    )
}

/// Front matter, optional AI summary, then the note body.
pub fn format_archive_markdown(
    message: &ProcessedMessage,
    item: &ClassificationItem,
    category: Category,
) -> String {
    let source = if message.message.source_url.is_empty() {
        "text"
    } else {
        message.message.source_url.as_str()
    };

    let mut out = String::new();
    out.push_str("---\n");
    out.push_str(&format!("source: {}\n", escape_yaml_string(source)));
    out.push_str(&format!(
        "date: {}\n",
        message.message.created_at.format("%Y-%m-%d")
    ));
    out.push_str(&format!("type: {}\n", message.message.source_type.as_str()));
    out.push_str(&format!("category: {}\n", category.as_str()));
    out.push_str(&format!("topic: {}\n", escape_yaml_string(&item.topic)));
    out.push_str("---\n\n");

    if !item.summary.trim().is_empty() {
        out.push_str(&format!("## AI Summary\n\n{}\n\n---\n\n", item.summary.trim()));
    }

    out.push_str(message.text());
    out
}

/// Map classification items onto archive files.
///
/// Two items landing on the same path within one batch get `-2`, `-3`, …
/// suffixes so neither overwrites the other.
pub fn plan_archive(
    messages: &[ProcessedMessage],
    items: &[ClassificationItem],
    dirs: &CategoryDirs,
) -> ArchivePlan {
    let mut plan = ArchivePlan::default();
    let mut taken: HashSet<String> = HashSet::new();

    for item in items {
        let Some(message) = usize::try_from(item.index)
            .ok()
            .and_then(|i| messages.get(i))
        else {
            warn!(index = item.index, "classification index out of range, skipping");
            plan.skipped += 1;
            continue;
        };

        let Some(category) = Category::parse(&item.category) else {
            warn!(category = %item.category, index = item.index, "unknown category, skipping");
            plan.skipped += 1;
            continue;
        };

        let topic = sanitize_topic(&item.topic);
        let topic_dir = format!("{}/{}", dirs.dir_for(category), topic);
        let base = generate_filename(message);

        let mut filename = base.clone();
        let mut n = 2;
        while taken.contains(&format!("{}/{}", topic_dir, filename)) {
            filename = format!("{}-{}.md", base.trim_end_matches(".md"), n);
            n += 1;
        }
        let path = format!("{}/{}", topic_dir, filename);
        taken.insert(path.clone());

        plan.files.push(ArchiveFile {
            path,
            topic_dir,
            filename,
            content: format_archive_markdown(message, item, category),
            message: format!("Add: {}", item.topic),
        });
    }

    plan
}

/// Write every planned file in order, creating or overwriting each.
///
/// Stops at the first failure. With `update_index`, each topic folder's
/// `Index.md` gains a link to the new file; index failures are only logged.
pub async fn write_archive(
    store: &dyn DocumentStore,
    files: &[ArchiveFile],
    update_index: bool,
) -> Result<usize> {
    let mut written = 0;
    for file in files {
        let content = file.content.clone();
        update_document(store, &file.path, &file.message, WRITE_ATTEMPTS, |_| {
            Some(content.clone())
        })
        .await?;
        info!(path = %file.path, "archived note");
        written += 1;

        if update_index {
            if let Err(e) = append_to_index(store, file).await {
                warn!(path = %file.path, error = %e, "failed to update topic index");
            }
        }
    }
    Ok(written)
}

async fn append_to_index(store: &dyn DocumentStore, file: &ArchiveFile) -> Result<bool> {
    let topic = file.topic_dir.rsplit('/').next().unwrap_or(&file.topic_dir);
    let link = format!("- [[{}/{}]]\n", topic, file.filename);
    let index_path = format!("{}/{}", file.topic_dir, INDEX_FILENAME);
    let message = format!("Update index: {}", topic);

    update_document(store, &index_path, &message, WRITE_ATTEMPTS, |existing| {
        match existing {
            Some(current) if current.contains(&link) => None,
            Some(current) => {
                let mut updated = current.to_string();
                if !updated.is_empty() && !updated.ends_with('\n') {
                    updated.push('\n');
                }
                updated.push_str(&link);
                Some(updated)
            }
            None => Some(format!("# {}\n\n{}", topic, link)),
        }
    })
    .await
}

//! Markdown rendering for captured notes.
//!
//! Two shapes are produced from a [`CaptureEvent`]:
//!
//! - [`format_markdown`] — a standalone note file with YAML front matter.
//! - [`format_daily_entry`] — an entry to be merged into the shared daily
//!   file by [`daily::merge_entry`](crate::daily::merge_entry).
//!
//! Both are pure.

use chrono::Timelike;

use crate::models::{CaptureEvent, DailyFileOutput, InboxEntry, MarkdownOutput};

const YAML_SPECIAL: &[char] = &[
    ':', '[', ']', '{', '}', '&', '*', '?', '|', '>', '!', '%', '#', '@', '`', '\'', '"', ',',
    '\n',
];

/// Render a YAML scalar, quoting it when a bare form would be ambiguous.
///
/// Quoted form escapes backslashes, double quotes and newlines.
pub fn escape_yaml_string(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value.contains(YAML_SPECIAL)
        || value.starts_with(' ')
        || value.ends_with(' ');

    if !needs_quotes {
        return value.to_string();
    }

    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

fn yaml_sequence(values: &[String]) -> String {
    if values.is_empty() {
        return "[]".to_string();
    }
    values
        .iter()
        .map(|v| format!("\n  - {}", escape_yaml_string(v)))
        .collect()
}

/// Render `event` as a standalone inbox note.
///
/// The filename is `inbox-<createdAt>.md` with `:` replaced by `-` so it is
/// valid on every filesystem.
pub fn format_markdown(event: &CaptureEvent) -> MarkdownOutput {
    let created_at = event.created_at_iso();
    let filename = format!("inbox-{}.md", created_at.replace(':', "-"));

    let fields = [
        ("source-type", escape_yaml_string(event.source_type.as_str())),
        ("source-url", escape_yaml_string(&event.source_url)),
        ("created-at", escape_yaml_string(&created_at)),
        ("tags", yaml_sequence(&event.tags)),
        ("language", escape_yaml_string(&event.language)),
    ];

    let front_matter = fields
        .iter()
        .map(|(key, value)| format!("{}: {}", key, value))
        .collect::<Vec<_>>()
        .join("\n");

    MarkdownOutput {
        filename,
        content: format!("---\n{}\n---\n\n{}", front_matter, event.raw_text),
    }
}

/// Build the daily-file entry for `event`, keyed by its UTC hour.
pub fn format_daily_entry(event: &CaptureEvent) -> DailyFileOutput {
    let created_at = event.created_at_iso();
    let date = created_at[..10].to_string();
    let hour = event.created_at.hour();
    let minute = event.created_at.minute();

    DailyFileOutput {
        filename: format!("inbox-{}.md", date),
        date,
        entry: InboxEntry {
            time: format!("{:02}:{:02}", hour, minute),
            hour: format!("{:02}:00", hour),
            text: event.raw_text.clone(),
            source_type: event.source_type,
            source_url: event.source_url.clone(),
        },
    }
}

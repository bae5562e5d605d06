//! The shared daily inbox file: parse, merge, serialize.
//!
//! A daily file looks like:
//!
//! ```text
//! ---
//! date: 2024-01-15
//! ---
//!
//! ## 09:00
//!
//! - 09:15 Morning note
//!
//! - 09:40 Link worth reading
//!   source: https://example.com
//!
//! ## 14:00
//!
//! - 14:30 Afternoon note
//! ```
//!
//! The file is never held in memory between operations. Every merge parses
//! the current stored text into a [`DailyDocument`], appends one entry, and
//! renders the whole document again. Rendering is deterministic: hour
//! sections ascend, entries keep their order within a section.
//!
//! Parsing never fails. Anything before the first `## HH:00` header is
//! dropped (the front matter is regenerated from the date) and sections
//! without entries disappear.
//!
//! [`merge_entry`] is pure. Pairing it with a conditional write and a
//! re-read on conflict is the job of [`contents`](crate::contents).

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::models::{DailyFileOutput, InboxEntry, SourceType};

static HOUR_HEADER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^## (\d{2}:00)$").expect("valid hour header regex"));
static ENTRY_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- (\d{2}:\d{2})(?: (.*))?$").expect("valid entry marker regex")
});
static SOURCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*source: (\S+)\s*$").expect("valid source line regex"));

/// Hour key (`HH:00`) to entries, in append order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailyDocument {
    pub sections: BTreeMap<String, Vec<InboxEntry>>,
}

impl DailyDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a stored daily file. Malformed content is skipped, never fatal.
    pub fn parse(content: &str) -> Self {
        let mut parser = Parser::default();
        for line in content.lines() {
            parser.feed(line);
        }
        parser.finish()
    }

    /// Append `entry` to the end of its hour section, creating the section
    /// if needed.
    pub fn push(&mut self, entry: InboxEntry) {
        self.sections
            .entry(entry.hour.clone())
            .or_default()
            .push(entry);
    }

    pub fn get(&self, hour: &str) -> Option<&[InboxEntry]> {
        self.sections.get(hour).map(Vec::as_slice)
    }

    /// Number of hour sections holding at least one entry.
    pub fn len(&self) -> usize {
        self.sections.values().filter(|e| !e.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the document with a `date` front matter header.
    pub fn render(&self, date: &str) -> String {
        let mut out = format!("---\ndate: {}\n---\n", date);
        for (hour, entries) in &self.sections {
            if entries.is_empty() {
                continue;
            }
            out.push_str(&format!("\n## {}\n\n", hour));
            let rendered: Vec<String> = entries.iter().map(render_entry).collect();
            out.push_str(&rendered.join("\n\n"));
            out.push('\n');
        }
        out
    }
}

fn render_entry(entry: &InboxEntry) -> String {
    let mut line = format!("- {} {}", entry.time, entry.text);
    if !entry.source_url.is_empty() {
        line.push_str(&format!("\n  source: {}", entry.source_url));
    }
    line
}

#[derive(Default)]
struct Parser {
    doc: DailyDocument,
    hour: Option<String>,
    pending: Option<PendingEntry>,
}

struct PendingEntry {
    time: String,
    lines: Vec<String>,
}

impl Parser {
    fn feed(&mut self, line: &str) {
        if let Some(caps) = HOUR_HEADER.captures(line) {
            self.flush();
            self.hour = Some(caps[1].to_string());
            return;
        }
        if self.hour.is_none() {
            return;
        }
        if let Some(caps) = ENTRY_MARKER.captures(line) {
            self.flush();
            let first = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            self.pending = Some(PendingEntry {
                time: caps[1].to_string(),
                lines: vec![first.to_string()],
            });
            return;
        }
        if let Some(pending) = self.pending.as_mut() {
            pending.lines.push(line.to_string());
        }
    }

    fn flush(&mut self) {
        let (Some(pending), Some(hour)) = (self.pending.take(), self.hour.as_ref()) else {
            return;
        };

        let mut lines = pending.lines;
        while lines.last().is_some_and(|l| l.trim().is_empty()) {
            lines.pop();
        }

        let mut source_url = String::new();
        if lines.len() > 1 {
            if let Some(url) = lines
                .last()
                .and_then(|l| SOURCE_LINE.captures(l))
                .map(|caps| caps[1].to_string())
            {
                lines.pop();
                source_url = url;
            }
        }

        let source_type = if source_url.is_empty() {
            SourceType::Text
        } else {
            SourceType::Url
        };

        self.doc.push(InboxEntry {
            time: pending.time,
            hour: hour.clone(),
            text: lines.join("\n"),
            source_type,
            source_url,
        });
    }

    fn finish(mut self) -> DailyDocument {
        self.flush();
        self.doc
    }
}

/// Parse a daily file into its hour sections.
pub fn parse_daily_file(content: &str) -> DailyDocument {
    DailyDocument::parse(content)
}

/// Render a daily file from its hour sections.
pub fn create_daily_file_content(date: &str, doc: &DailyDocument) -> String {
    doc.render(date)
}

/// Merge `output.entry` into `existing` (or a fresh file when `None`).
pub fn merge_entry(existing: Option<&str>, output: &DailyFileOutput) -> String {
    let mut doc = existing.map(DailyDocument::parse).unwrap_or_default();
    doc.push(output.entry.clone());
    doc.render(&output.date)
}

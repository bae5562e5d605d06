//! Core data models used throughout Sprite.
//!
//! These types represent the captured notes, daily inbox entries, queued
//! messages, and classification results that flow through the capture and
//! drain pipelines.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Where a note's content came from.
///
/// Captures are only ever `Text` or `Url`; `Youtube` is assigned during
/// preprocessing when the URL points at a video platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    #[default]
    Text,
    Url,
    Youtube,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Text => "text",
            SourceType::Url => "url",
            SourceType::Youtube => "youtube",
        }
    }
}

/// A normalized note extracted from one inbound chat message.
///
/// `source_url` is non-empty iff `source_type` is [`SourceType::Url`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    pub raw_text: String,
    pub source_type: SourceType,
    pub source_url: String,
    pub created_at: DateTime<Utc>,
    pub tags: Vec<String>,
    pub language: String,
}

impl CaptureEvent {
    /// `created_at` as ISO-8601 with millisecond precision, e.g.
    /// `2024-01-15T10:30:00.000Z`.
    pub fn created_at_iso(&self) -> String {
        self.created_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

/// A standalone note file ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkdownOutput {
    pub filename: String,
    pub content: String,
}

/// One captured note inside a shared daily file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboxEntry {
    /// `HH:MM`
    pub time: String,
    /// `HH:00`, always `time` truncated to the hour.
    pub hour: String,
    pub text: String,
    pub source_type: SourceType,
    pub source_url: String,
}

/// An entry destined for the daily file `filename`.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyFileOutput {
    pub filename: String,
    /// `YYYY-MM-DD`
    pub date: String,
    pub entry: InboxEntry,
}

/// A captured note waiting in the queue for batch classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub text: String,
    #[serde(default)]
    pub source_url: String,
    #[serde(default)]
    pub source_type: SourceType,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

impl From<&CaptureEvent> for QueueMessage {
    fn from(event: &CaptureEvent) -> Self {
        Self {
            text: event.raw_text.clone(),
            source_url: event.source_url.clone(),
            source_type: event.source_type,
            created_at: event.created_at,
            user_id: None,
        }
    }
}

/// A queue entry as listed from the queue: its key plus decoded message.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedItem {
    pub key: String,
    pub message: QueueMessage,
}

/// A [`QueueMessage`] after cleaning and (optional) URL enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedMessage {
    pub message: QueueMessage,
    /// Scraped page content, set only when enrichment ran and succeeded.
    pub enriched_content: Option<String>,
    pub needs_enrichment: bool,
}

impl ProcessedMessage {
    pub fn text(&self) -> &str {
        &self.message.text
    }
}

/// PARA category labels the classifier may assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Projects,
    Areas,
    Resources,
    Archives,
    Jobs,
}

impl Category {
    /// Parse a classifier label. Unknown labels yield `None`.
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "projects" => Some(Category::Projects),
            "areas" => Some(Category::Areas),
            "resources" => Some(Category::Resources),
            "archives" => Some(Category::Archives),
            "jobs" => Some(Category::Jobs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Projects => "projects",
            Category::Areas => "areas",
            Category::Resources => "resources",
            Category::Archives => "archives",
            Category::Jobs => "jobs",
        }
    }
}

/// One classification decision, addressing a message by batch position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationItem {
    pub index: i64,
    pub category: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub items: Vec<ClassificationItem>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_created_at_iso_has_millis() {
        let event = CaptureEvent {
            raw_text: "x".to_string(),
            source_type: SourceType::Text,
            source_url: String::new(),
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            tags: vec![],
            language: String::new(),
        };
        assert_eq!(event.created_at_iso(), "2024-01-15T10:30:00.000Z");
    }

    #[test]
    fn test_queue_message_camel_case() {
        let json = r#"{"text":"hi","sourceUrl":"https://a.b","sourceType":"url","createdAt":"2024-01-15T10:30:00.000Z"}"#;
        let msg: QueueMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.source_type, SourceType::Url);
        assert_eq!(msg.source_url, "https://a.b");
        assert!(msg.user_id.is_none());
    }

    #[test]
    fn test_category_parse() {
        assert_eq!(Category::parse("Resources"), Some(Category::Resources));
        assert_eq!(Category::parse("misc"), None);
    }
}

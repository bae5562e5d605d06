//! Turn an inbound chat message into a [`CaptureEvent`].
//!
//! The first `url` or `text_link` annotation wins. An explicit `url` on the
//! annotation is preferred; a bare `url` annotation is resolved by slicing
//! the text at its UTF-16 offset. When the text carries no link, the
//! caption annotations are checked the same way against the caption.

use chrono::{DateTime, Utc};

use crate::models::{CaptureEvent, SourceType};
use crate::telegram::{Message, MessageEntity};

/// Extract a capture from `message`, stamped with the current time.
///
/// Returns `None` when there is no message or it carries no text.
pub fn extract_capture(message: Option<&Message>) -> Option<CaptureEvent> {
    extract_capture_at(message, Utc::now())
}

/// [`extract_capture`] with an explicit capture instant.
pub fn extract_capture_at(message: Option<&Message>, now: DateTime<Utc>) -> Option<CaptureEvent> {
    let message = message?;
    let raw_text = message.text.as_deref().filter(|t| !t.is_empty())?;

    let source_url = find_link(&message.entities, raw_text)
        .or_else(|| {
            let caption = message.caption.as_deref().unwrap_or("");
            find_link(&message.caption_entities, caption)
        })
        .unwrap_or_default();

    let source_type = if source_url.is_empty() {
        SourceType::Text
    } else {
        SourceType::Url
    };

    Some(CaptureEvent {
        raw_text: raw_text.to_string(),
        source_type,
        source_url,
        created_at: now,
        tags: Vec::new(),
        language: String::new(),
    })
}

fn find_link(entities: &[MessageEntity], text: &str) -> Option<String> {
    let entity = entities.iter().find(|e| e.is_link())?;

    if let Some(url) = entity.url.as_deref().filter(|u| !u.is_empty()) {
        return Some(url.to_string());
    }
    if entity.kind == "url" {
        return utf16_slice(text, entity.offset, entity.length).filter(|s| !s.is_empty());
    }
    None
}

/// Slice `text` by UTF-16 code unit offsets, as the Bot API measures them.
fn utf16_slice(text: &str, offset: usize, length: usize) -> Option<String> {
    let units: Vec<u16> = text.encode_utf16().collect();
    let end = offset.checked_add(length)?.min(units.len());
    let slice = units.get(offset..end)?;
    String::from_utf16(slice).ok()
}

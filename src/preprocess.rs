//! Clean queued captures and enrich bare links before classification.

use futures_util::future::join_all;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::models::{ProcessedMessage, QueueMessage, QueuedItem, SourceType};
use crate::traits::ContentEnricher;

static URL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(链接[：:]\s*|link[：:]\s*)").expect("valid URL prefix regex")
});
static VIDEO_HOST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)youtube\.com|youtu\.be").expect("valid video host regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    Youtube,
    Normal,
}

/// Strip a leading `链接:` / `link:` announcement and surrounding whitespace.
pub fn clean_text(text: &str) -> String {
    URL_PREFIX.replace(text, "").trim().to_string()
}

/// Classify a URL by host. Unparseable URLs fall back to a substring match.
pub fn detect_url_type(url: &str) -> UrlKind {
    if url.is_empty() {
        return UrlKind::Normal;
    }
    let is_video = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.host_str().is_some_and(|host| {
            let host = host.to_ascii_lowercase();
            ["youtube.com", "youtu.be"]
                .iter()
                .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
        }),
        Err(_) => VIDEO_HOST.is_match(url),
    };
    if is_video {
        UrlKind::Youtube
    } else {
        UrlKind::Normal
    }
}

/// Clean one message and decide whether it needs enrichment.
///
/// The URL is removed from the body so it is not duplicated next to the
/// `source` field. A message that is nothing but a link keeps the URL as
/// its text and is flagged for enrichment.
pub fn preprocess_message(message: &QueueMessage) -> ProcessedMessage {
    let mut text = clean_text(&message.text);
    let url = message.source_url.as_str();

    if !url.is_empty() {
        text = text.replacen(url, "", 1).trim().to_string();
    }

    let needs_enrichment = text.is_empty() && !url.is_empty();
    let source_type = if url.is_empty() {
        SourceType::Text
    } else {
        match detect_url_type(url) {
            UrlKind::Youtube => SourceType::Youtube,
            UrlKind::Normal => SourceType::Url,
        }
    };

    ProcessedMessage {
        message: QueueMessage {
            text: if text.is_empty() { url.to_string() } else { text },
            source_type,
            ..message.clone()
        },
        enriched_content: None,
        needs_enrichment,
    }
}

/// Preprocess a whole batch, enriching bare non-video links concurrently.
///
/// Output order matches input order. Enrichment failures leave the message
/// as preprocessed.
pub async fn preprocess_batch(
    items: &[QueuedItem],
    enricher: &dyn ContentEnricher,
) -> Vec<ProcessedMessage> {
    let processed = items.iter().map(|item| preprocess_message(&item.message));

    join_all(processed.map(|msg| async move {
        let wants_enrichment = msg.needs_enrichment
            && !msg.message.source_url.is_empty()
            && msg.message.source_type != SourceType::Youtube;
        if !wants_enrichment {
            return msg;
        }

        match enricher.fetch(&msg.message.source_url).await {
            Some(content) => {
                debug!(url = %msg.message.source_url, bytes = content.len(), "enriched link");
                ProcessedMessage {
                    message: QueueMessage {
                        text: content.clone(),
                        ..msg.message
                    },
                    enriched_content: Some(content),
                    needs_enrichment: false,
                }
            }
            None => msg,
        }
    }))
    .await
}

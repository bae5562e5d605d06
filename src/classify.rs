//! Batch PARA classification through a language model.
//!
//! One prompt covers the whole batch; each message is addressed by its
//! position. The answer must be `{"items": [{index, category, topic,
//! summary}]}`. A response that does not decode is a hard failure for the
//! batch, since indices from a partially understood answer cannot be trusted.

use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::models::{ClassificationResult, ProcessedMessage};
use crate::traits::{ChatMessage, CompletionOptions, LanguageModel, ResponseFormat};

/// Characters of each message included in the prompt.
pub const MAX_MESSAGE_CHARS: usize = 4000;

const SYSTEM_PROMPT: &str = "You are a PARA classifier. Return JSON only.";

const INSTRUCTIONS: &str = r#"You are a PARA classifier. Return JSON only.

Schema:
{
  "items": [
    {
      "index": 0,
      "category": "projects|areas|resources|archives|jobs",
      "topic": "topic-name",
      "summary": "short summary"
    }
  ]
}

Classification Guidelines:
- projects: Active work with deadlines
- areas: Ongoing responsibilities (health, finance, learning)
- resources: Reference materials, articles, tools
- archives: Completed or inactive items
- jobs: Job postings, career opportunities

Output Rules:
- topic: Use the SAME LANGUAGE as the input. Be specific and searchable (e.g., "React-Hooks" not "frontend", "语音转文字" not "AI")
- summary: Use the SAME LANGUAGE as the input. Keep it concise but informative.

Task:
Classify the following messages. If a message contains a URL, use the content to determine the category.
"#;

/// Render the single prompt covering every message in `messages`.
pub fn build_classification_prompt(messages: &[ProcessedMessage]) -> String {
    let listed: Vec<String> = messages
        .iter()
        .enumerate()
        .map(|(index, m)| {
            let text: String = m.text().chars().take(MAX_MESSAGE_CHARS).collect();
            let source = if m.message.source_url.is_empty() {
                "none"
            } else {
                m.message.source_url.as_str()
            };
            format!(
                "[{}] {}\n  Type: {}\n  Source: {}",
                index,
                text,
                m.message.source_type.as_str(),
                source
            )
        })
        .collect();

    format!("{}\nMessages:\n{}", INSTRUCTIONS, listed.join("\n\n"))
}

/// Remove a surrounding Markdown code fence (```` ```json ... ``` ````), if any.
pub fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) up to the first newline.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// Decode a classifier answer.
pub fn parse_classification_result(response: &str) -> Result<ClassificationResult> {
    serde_json::from_str(strip_code_fence(response)).map_err(|e| {
        error!(error = %e, "failed to parse classification result");
        Error::MalformedResponse(e.to_string())
    })
}

/// Classify `messages` with a single model call.
pub async fn classify(
    model: &dyn LanguageModel,
    messages: &[ProcessedMessage],
) -> Result<ClassificationResult> {
    if messages.is_empty() {
        return Ok(ClassificationResult { items: Vec::new() });
    }

    let prompt = build_classification_prompt(messages);
    let options = CompletionOptions {
        response_format: Some(ResponseFormat::JsonObject),
    };
    let response = model
        .complete(
            &[ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)],
            &options,
        )
        .await?;

    let result = parse_classification_result(&response)?;
    debug!(
        messages = messages.len(),
        items = result.items.len(),
        "classified batch"
    );
    Ok(result)
}

//! OpenAI-compatible chat-completions client.
//!
//! [`ChatModel`] implements [`LanguageModel`] against
//! `POST {base_url}/chat/completions`, which covers OpenAI itself and the
//! many gateways that speak the same protocol.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, ... (capped at 2^5)
//!
//! # Environment Variables
//!
//! - `AI_API_KEY` — bearer token for the endpoint.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::traits::{ChatMessage, CompletionOptions, LanguageModel};

const SERVICE: &str = "model";

pub struct ChatModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    max_retries: u32,
}

impl ChatModel {
    pub fn new(config: &ModelConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.to_string(),
            max_retries: config.max_retries,
        })
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl LanguageModel for ChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });
        if let Some(format) = options.response_format {
            body["response_format"] = serde_json::json!({ "type": format });
        }

        let url = format!("{}/chat/completions", self.base_url);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&url)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return extract_content(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = Error::upstream(SERVICE, status.as_u16(), body_text);

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(attempt, status = status.as_u16(), "model request failed, retrying");
                        last_err = Some(err);
                        continue;
                    }

                    return Err(err);
                }
                Err(e) => {
                    warn!(attempt, error = %e, "model request failed, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or(Error::EmptyCompletion))
    }
}

/// Pull `choices[0].message.content` out of a completion response.
fn extract_content(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .filter(|c| !c.trim().is_empty())
        .map(str::to_string)
        .ok_or(Error::EmptyCompletion)
}

//! GitHub contents API adapter.
//!
//! Implements [`DocumentStore`] over
//! `GET/PUT /repos/{owner}/{repo}/contents/{path}`. The blob SHA returned
//! by GitHub is the revision token; passing it back on `PUT` makes the write
//! conditional.
//!
//! # Status mapping
//!
//! | Response | Result |
//! |----------|--------|
//! | `GET` 404 | `Ok(None)` |
//! | `PUT` 409 / 412 | [`Error::Conflict`] |
//! | any other non-2xx | [`Error::Upstream`] with the status |
//!
//! # Environment Variables
//!
//! - `GITHUB_TOKEN` — required; a token with `contents: write` on the repo.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::traits::{DocumentStore, StoredDocument};

const USER_AGENT: &str = "sprite-bot";
const SERVICE: &str = "github";

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

/// A repository on GitHub used as the note vault.
pub struct GitHubStore {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repo: String,
    branch: Option<String>,
    token: String,
}

impl GitHubStore {
    pub fn new(config: &StoreConfig, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: token.to_string(),
        })
    }

    fn contents_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/contents/{}",
            self.api_base,
            self.owner,
            self.repo,
            path.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl DocumentStore for GitHubStore {
    async fn read(&self, path: &str) -> Result<Option<StoredDocument>> {
        let mut request = self
            .client
            .get(self.contents_url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json");
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.as_u16() == 404 {
            debug!(path, "document not found");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(path, status = status.as_u16(), body = %body, "GitHub read failed");
            return Err(Error::upstream(SERVICE, status.as_u16(), body));
        }

        let data: ContentsResponse = response.json().await?;
        Ok(Some(StoredDocument {
            content: decode_base64(&data.content)?,
            revision: data.sha,
        }))
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected_revision: Option<&str>,
        message: &str,
    ) -> Result<()> {
        let mut body = serde_json::json!({
            "message": message,
            "content": encode_base64(content),
        });
        if let Some(sha) = expected_revision {
            body["sha"] = serde_json::Value::String(sha.to_string());
        }
        if let Some(branch) = &self.branch {
            body["branch"] = serde_json::Value::String(branch.clone());
        }

        let response = self
            .client
            .put(self.contents_url(path))
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        if matches!(status.as_u16(), 409 | 412) {
            return Err(Error::Conflict {
                path: path.to_string(),
            });
        }

        let text = response.text().await.unwrap_or_default();
        error!(path, status = status.as_u16(), body = %text, "GitHub write failed");
        Err(Error::upstream(SERVICE, status.as_u16(), text))
    }
}

/// Base64-encode UTF-8 text for the contents API.
pub fn encode_base64(text: &str) -> String {
    STANDARD.encode(text.as_bytes())
}

/// Decode contents API base64, which GitHub wraps at 60 columns.
pub fn decode_base64(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| Error::MalformedResponse(format!("invalid base64 content: {}", e)))?;
    String::from_utf8(bytes)
        .map_err(|e| Error::MalformedResponse(format!("content is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_ascii() {
        assert_eq!(encode_base64("Hello World"), "SGVsbG8gV29ybGQ=");
        assert_eq!(decode_base64("SGVsbG8gV29ybGQ=").unwrap(), "Hello World");
    }

    #[test]
    fn test_base64_utf8() {
        let encoded = encode_base64("你好世界");
        assert_eq!(decode_base64(&encoded).unwrap(), "你好世界");
        let mixed = encode_base64("Hello 世界!");
        assert_eq!(decode_base64(&mixed).unwrap(), "Hello 世界!");
    }

    #[test]
    fn test_decode_ignores_line_wrapping() {
        assert_eq!(decode_base64("SGVsbG8g\nV29ybGQ=\n").unwrap(), "Hello World");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_base64("***"),
            Err(Error::MalformedResponse(_))
        ));
    }
}

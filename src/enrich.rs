//! URL enrichment for link-only notes.
//!
//! - **[`FirecrawlEnricher`]** — scrapes the page through the Firecrawl
//!   `/v1/scrape` endpoint and returns its main content as Markdown.
//! - **[`DisabledEnricher`]** — always returns `None`; used when no API key
//!   is configured or `enricher.provider = "disabled"`.
//!
//! Enrichment is best-effort: every failure is logged and mapped to `None`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

use crate::config::{EnricherConfig, Secrets};
use crate::error::Result;
use crate::traits::ContentEnricher;

pub struct DisabledEnricher;

#[async_trait]
impl ContentEnricher for DisabledEnricher {
    async fn fetch(&self, _url: &str) -> Option<String> {
        None
    }
}

pub struct FirecrawlEnricher {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl FirecrawlEnricher {
    pub fn new(config: &EnricherConfig, api_key: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn scrape(&self, url: &str) -> std::result::Result<Option<String>, String> {
        let response = self
            .client
            .post(format!("{}/v1/scrape", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "url": url,
                "formats": ["markdown"],
                "onlyMainContent": true,
            }))
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("status {}", status.as_u16()));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| e.to_string())?;
        Ok(json
            .pointer("/data/markdown")
            .and_then(|m| m.as_str())
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string))
    }
}

#[async_trait]
impl ContentEnricher for FirecrawlEnricher {
    async fn fetch(&self, url: &str) -> Option<String> {
        if url.is_empty() {
            return None;
        }
        match self.scrape(url).await {
            Ok(content) => content,
            Err(e) => {
                warn!(url, error = %e, "enrichment failed");
                None
            }
        }
    }
}

/// Create the enricher selected by configuration.
///
/// Falls back to [`DisabledEnricher`] when `FIRECRAWL_API_KEY` is missing.
pub fn create_enricher(
    config: &EnricherConfig,
    secrets: &Secrets,
) -> Result<Box<dyn ContentEnricher>> {
    match (config.is_enabled(), secrets.firecrawl_api_key.as_deref()) {
        (true, Some(key)) => Ok(Box::new(FirecrawlEnricher::new(config, key)?)),
        (true, None) => {
            warn!("FIRECRAWL_API_KEY not set, URL enrichment disabled");
            Ok(Box::new(DisabledEnricher))
        }
        (false, _) => Ok(Box::new(DisabledEnricher)),
    }
}

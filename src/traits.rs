//! Capability interfaces consumed by the core pipelines.
//!
//! The capture path and the drain cycle never talk to HTTP APIs or
//! databases directly. They depend on four traits, each implemented by a
//! thin adapter:
//!
//! ```text
//! ┌──────────────────┐   ┌─────────────────────────────────────┐
//! │  capture / drain │──▶│ DocumentStore   → github::GitHubStore│
//! │     pipelines    │   │ LanguageModel   → llm::ChatModel     │
//! │                  │   │ ContentEnricher → enrich::Firecrawl  │
//! │                  │   │ Queue           → queue::SqliteQueue │
//! └──────────────────┘   └─────────────────────────────────────┘
//! ```
//!
//! [`memory`](crate::memory) provides in-process implementations of
//! [`DocumentStore`] and [`Queue`] for tests and dry runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

// ═══════════════════════════════════════════════════════════════════════
// Document store
// ═══════════════════════════════════════════════════════════════════════

/// A document as read from the store, with its revision token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredDocument {
    pub content: String,
    /// Opaque version identifier (a blob SHA for the GitHub store).
    pub revision: String,
}

/// Content-addressed document storage with conditional writes.
///
/// # Contract
///
/// - [`read`](DocumentStore::read) returns `Ok(None)` when the path does
///   not exist.
/// - [`write`](DocumentStore::write) with `expected_revision = Some(rev)`
///   must only succeed if the stored revision is still `rev`; otherwise it
///   fails with [`Error::Conflict`](crate::error::Error::Conflict).
/// - `expected_revision = None` creates the document. Implementations may
///   reject it with a conflict or a 422 status if the path already exists.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn read(&self, path: &str) -> Result<Option<StoredDocument>>;

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected_revision: Option<&str>,
        message: &str,
    ) -> Result<()>;
}

// ═══════════════════════════════════════════════════════════════════════
// Language model
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseFormat {
    JsonObject,
}

#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub response_format: Option<ResponseFormat>,
}

/// A chat-completion capable language model.
///
/// Fails with [`Error::Upstream`](crate::error::Error::Upstream) on a
/// non-success status and [`Error::EmptyCompletion`](crate::error::Error::EmptyCompletion)
/// when the answer has no content.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage], options: &CompletionOptions)
        -> Result<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// Content enricher
// ═══════════════════════════════════════════════════════════════════════

/// Best-effort page scraper. Returns `None` on any failure; never errors.
#[async_trait]
pub trait ContentEnricher: Send + Sync {
    async fn fetch(&self, url: &str) -> Option<String>;
}

// ═══════════════════════════════════════════════════════════════════════
// Queue
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub key: String,
    pub value: String,
}

/// Key-value queue holding captured notes until they are classified.
#[async_trait]
pub trait Queue: Send + Sync {
    /// List every unexpired entry whose key starts with `prefix`, ordered by key.
    async fn list(&self, prefix: &str) -> Result<Vec<QueueEntry>>;

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

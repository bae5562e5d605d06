//! In-memory [`DocumentStore`] and [`Queue`] implementations.
//!
//! Used by the test suites and by `sprite drain --dry-run`. The document
//! store mimics the GitHub contents API closely enough to exercise the
//! optimistic concurrency paths: revisions are content hashes, a create
//! over an existing path is rejected with 422, and a stale revision is
//! rejected with a conflict. Failures and concurrent edits can be injected.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::traits::{DocumentStore, Queue, QueueEntry, StoredDocument};

fn revision_of(content: &str) -> String {
    format!("{:x}", Sha256::digest(content.as_bytes()))
}

/// A single recorded write, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteAttempt {
    pub path: String,
    pub expected_revision: Option<String>,
    pub message: String,
    pub succeeded: bool,
}

#[derive(Default)]
struct StoreState {
    docs: HashMap<String, StoredDocument>,
    attempts: Vec<WriteAttempt>,
    injected_failures: VecDeque<u16>,
    path_failures: HashMap<String, VecDeque<u16>>,
    concurrent_edits: HashMap<String, VecDeque<String>>,
}

/// In-memory document store keyed by path.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a document, bypassing revision checks.
    pub fn insert(&self, path: &str, content: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.docs.insert(
            path.to_string(),
            StoredDocument {
                content: content.to_string(),
                revision: revision_of(content),
            },
        );
    }

    pub fn get(&self, path: &str) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.docs.get(path).map(|d| d.content.clone())
    }

    /// All stored paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        let mut paths: Vec<String> = state.docs.keys().cloned().collect();
        paths.sort();
        paths
    }

    pub fn write_attempts(&self) -> Vec<WriteAttempt> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        state.attempts.clone()
    }

    /// Make the next write fail with `status` (409/412 map to a conflict).
    /// Multiple calls queue up failures in order.
    pub fn fail_next_write(&self, status: u16) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.injected_failures.push_back(status);
    }

    /// Make the next write to `path` fail with `status`.
    pub fn fail_next_write_to(&self, path: &str, status: u16) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state
            .path_failures
            .entry(path.to_string())
            .or_default()
            .push_back(status);
    }

    /// Simulate another writer replacing `path` with `content` just before
    /// the next write to that path lands.
    pub fn edit_before_next_write(&self, path: &str, content: &str) {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state
            .concurrent_edits
            .entry(path.to_string())
            .or_default()
            .push_back(content.to_string());
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn read(&self, path: &str) -> Result<Option<StoredDocument>> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        Ok(state.docs.get(path).cloned())
    }

    async fn write(
        &self,
        path: &str,
        content: &str,
        expected_revision: Option<&str>,
        message: &str,
    ) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());

        if let Some(edit) = state
            .concurrent_edits
            .get_mut(path)
            .and_then(|edits| edits.pop_front())
        {
            let revision = revision_of(&edit);
            state.docs.insert(
                path.to_string(),
                StoredDocument {
                    content: edit,
                    revision,
                },
            );
        }

        let targeted = state
            .path_failures
            .get_mut(path)
            .and_then(|failures| failures.pop_front());
        let injected = match targeted {
            Some(status) => Some(status),
            None => state.injected_failures.pop_front(),
        };

        let outcome = if let Some(status) = injected {
            match status {
                409 | 412 => Err(Error::Conflict {
                    path: path.to_string(),
                }),
                other => Err(Error::upstream("memory", other, "injected failure")),
            }
        } else {
            match (state.docs.get(path), expected_revision) {
                (Some(_), None) => Err(Error::upstream(
                    "memory",
                    422,
                    "document exists and no revision was supplied",
                )),
                (Some(doc), Some(rev)) if doc.revision != rev => Err(Error::Conflict {
                    path: path.to_string(),
                }),
                (None, Some(_)) => Err(Error::Conflict {
                    path: path.to_string(),
                }),
                _ => Ok(()),
            }
        };

        state.attempts.push(WriteAttempt {
            path: path.to_string(),
            expected_revision: expected_revision.map(str::to_string),
            message: message.to_string(),
            succeeded: outcome.is_ok(),
        });

        if outcome.is_ok() {
            state.docs.insert(
                path.to_string(),
                StoredDocument {
                    content: content.to_string(),
                    revision: revision_of(content),
                },
            );
        }
        outcome
    }
}

/// In-memory queue with per-entry expiry.
#[derive(Default)]
pub struct InMemoryQueue {
    entries: RwLock<BTreeMap<String, (String, Instant)>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn list(&self, prefix: &str) -> Result<Vec<QueueEntry>> {
        let now = Instant::now();
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, (_, expires))| *expires > now)
            .map(|(key, (value, _))| QueueEntry {
                key: key.clone(),
                value: value.clone(),
            })
            .collect())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }
}

//! One drain cycle: queue → preprocess → classify → archive → delete.
//!
//! ```text
//! Idle ─▶ Reading ─▶ Preprocessing ─▶ Classifying ─▶ Archiving ─▶ Deleting ─▶ Idle
//!            │             (infallible)       │             │            │
//!            └──────────────────┬─────────────┴─────────────┴────────────┘
//!                               ▼
//!                      Aborted(DrainError { stage, source })
//! ```
//!
//! Each stage is a fallible step chained with `?`; the first failure ends
//! the cycle and names its [`DrainStage`]. Nothing is rolled back:
//!
//! | Aborted in | Archive files | Queue |
//! |------------|---------------|-------|
//! | Reading / Classifying | none written | untouched |
//! | Archiving | earlier files of the batch stay | untouched |
//! | Deleting | all written | some keys may remain |
//!
//! Queue keys are deleted only after every archive file is written, so a
//! crash in between replays the batch on the next cycle (at-least-once).

use std::fmt;
use tracing::{error, info};

use crate::archive::{plan_archive, write_archive};
use crate::classify::classify;
use crate::config::ArchiveConfig;
use crate::error::Error;
use crate::preprocess::preprocess_batch;
use crate::queue::{delete_keys, read_queue};
use crate::traits::{ContentEnricher, DocumentStore, LanguageModel, Queue};

/// Stage that aborted a cycle. Preprocessing never fails, so it has no
/// variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainStage {
    Reading,
    Classifying,
    Archiving,
    Deleting,
}

impl fmt::Display for DrainStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DrainStage::Reading => "reading",
            DrainStage::Classifying => "classifying",
            DrainStage::Archiving => "archiving",
            DrainStage::Deleting => "deleting",
        };
        f.write_str(name)
    }
}

/// A drain cycle that stopped early.
#[derive(Debug, thiserror::Error)]
#[error("drain cycle aborted while {stage}: {source}")]
pub struct DrainError {
    pub stage: DrainStage,
    #[source]
    pub source: Error,
}

fn at(stage: DrainStage) -> impl FnOnce(Error) -> DrainError {
    move |source| {
        error!(%stage, error = %source, "drain cycle aborted");
        DrainError { stage, source }
    }
}

/// Counts from a completed cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Queue entries picked up.
    pub read: usize,
    /// Archive files written.
    pub archived: usize,
    /// Classification items dropped (unknown category, bad index).
    pub skipped: usize,
    /// Queue keys removed.
    pub deleted: usize,
}

/// Everything a drain cycle talks to.
pub struct DrainContext<'a> {
    pub queue: &'a dyn Queue,
    pub store: &'a dyn DocumentStore,
    pub model: &'a dyn LanguageModel,
    pub enricher: &'a dyn ContentEnricher,
    pub archive: &'a ArchiveConfig,
}

/// Run one drain cycle. An empty queue is a no-op, not an error.
pub async fn run_drain_cycle(ctx: &DrainContext<'_>) -> Result<DrainReport, DrainError> {
    let items = read_queue(ctx.queue)
        .await
        .map_err(at(DrainStage::Reading))?;
    if items.is_empty() {
        info!("queue empty, nothing to drain");
        return Ok(DrainReport::default());
    }
    info!(count = items.len(), "draining queue");

    let processed = preprocess_batch(&items, ctx.enricher).await;

    let classification = classify(ctx.model, &processed)
        .await
        .map_err(at(DrainStage::Classifying))?;

    let plan = plan_archive(&processed, &classification.items, &ctx.archive.dirs);
    let archived = write_archive(ctx.store, &plan.files, ctx.archive.update_index)
        .await
        .map_err(at(DrainStage::Archiving))?;

    let keys: Vec<String> = items.into_iter().map(|item| item.key).collect();
    delete_keys(ctx.queue, &keys)
        .await
        .map_err(at(DrainStage::Deleting))?;

    let report = DrainReport {
        read: keys.len(),
        archived,
        skipped: plan.skipped,
        deleted: keys.len(),
    };
    info!(
        read = report.read,
        archived = report.archived,
        skipped = report.skipped,
        deleted = report.deleted,
        "drain cycle complete"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::DisabledEnricher;
    use crate::error::Result;
    use crate::memory::{InMemoryQueue, InMemoryStore};
    use crate::models::{QueueMessage, SourceType};
    use crate::queue::{enqueue, DEFAULT_TTL};
    use crate::traits::{ChatMessage, CompletionOptions};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedModel {
        answer: String,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        async fn complete(&self, _: &[ChatMessage], _: &CompletionOptions) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    async fn seeded_queue(texts: &[&str]) -> InMemoryQueue {
        let queue = InMemoryQueue::new();
        for (i, text) in texts.iter().enumerate() {
            let message = QueueMessage {
                text: text.to_string(),
                source_url: String::new(),
                source_type: SourceType::Text,
                created_at: Utc
                    .with_ymd_and_hms(2024, 1, 15, 10, 30, i as u32)
                    .unwrap(),
                user_id: None,
            };
            enqueue(&queue, &message, DEFAULT_TTL).await.unwrap();
        }
        queue
    }

    #[tokio::test]
    async fn test_empty_queue_is_noop() {
        let queue = InMemoryQueue::new();
        let store = InMemoryStore::new();
        let model = ScriptedModel::new("unused");
        let archive = ArchiveConfig::default();
        let ctx = DrainContext {
            queue: &queue,
            store: &store,
            model: &model,
            enricher: &DisabledEnricher,
            archive: &archive,
        };

        let report = run_drain_cycle(&ctx).await.unwrap();
        assert_eq!(report, DrainReport::default());
        assert_eq!(model.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_malformed_classification_aborts_before_archiving() {
        let queue = seeded_queue(&["a", "b"]).await;
        let store = InMemoryStore::new();
        let model = ScriptedModel::new("these all look like resources to me");
        let archive = ArchiveConfig::default();
        let ctx = DrainContext {
            queue: &queue,
            store: &store,
            model: &model,
            enricher: &DisabledEnricher,
            archive: &archive,
        };

        let err = run_drain_cycle(&ctx).await.unwrap_err();
        assert_eq!(err.stage, DrainStage::Classifying);
        assert!(matches!(err.source, Error::MalformedResponse(_)));
        assert!(store.write_attempts().is_empty());
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_archive_failure_keeps_queue() {
        let queue = seeded_queue(&["a", "b"]).await;
        let store = InMemoryStore::new();
        store.fail_next_write(500);
        let model = ScriptedModel::new(
            r#"{"items":[{"index":0,"category":"areas","topic":"A"},{"index":1,"category":"areas","topic":"B"}]}"#,
        );
        let archive = ArchiveConfig::default();
        let ctx = DrainContext {
            queue: &queue,
            store: &store,
            model: &model,
            enricher: &DisabledEnricher,
            archive: &archive,
        };

        let err = run_drain_cycle(&ctx).await.unwrap_err();
        assert_eq!(err.stage, DrainStage::Archiving);
        assert_eq!(err.source.status(), Some(500));
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn test_full_cycle_deletes_whole_batch() {
        let queue = seeded_queue(&["a", "b", "c"]).await;
        let store = InMemoryStore::new();
        let model = ScriptedModel::new(
            r#"{"items":[{"index":0,"category":"projects","topic":"Launch"},{"index":2,"category":"someday","topic":"x"}]}"#,
        );
        let archive = ArchiveConfig::default();
        let ctx = DrainContext {
            queue: &queue,
            store: &store,
            model: &model,
            enricher: &DisabledEnricher,
            archive: &archive,
        };

        let report = run_drain_cycle(&ctx).await.unwrap();
        assert_eq!(
            report,
            DrainReport {
                read: 3,
                archived: 1,
                skipped: 1,
                deleted: 3,
            }
        );
        assert!(queue.is_empty());
        assert_eq!(store.paths(), vec!["01_Projects/Launch/2024-01-15-10-30-00.md"]);
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(DrainStage::Classifying.to_string(), "classifying");
    }
}

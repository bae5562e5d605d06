//! The capture queue.
//!
//! Notes captured in `queue` mode wait here until a drain cycle classifies
//! and archives them. The queue is the only durable owner of a note until
//! its archive file has been written; entries are deleted only after that.
//!
//! Keys follow `inbox:<unix millis>:<uuid>` so listing by key is also
//! listing by capture time. Values are JSON [`QueueMessage`]s.
//!
//! [`SqliteQueue`] is the durable [`Queue`] implementation; the helpers in
//! this module work against any [`Queue`].

use async_trait::async_trait;
use chrono::Utc;
use futures_util::future::try_join_all;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{QueueMessage, QueuedItem};
use crate::traits::{Queue, QueueEntry};

/// Prefix shared by every capture key.
pub const INBOX_PREFIX: &str = "inbox:";

/// Default time-to-live for queued captures: seven days.
pub const DEFAULT_TTL: Duration = Duration::from_secs(604_800);

/// A fresh `inbox:<millis>:<uuid>` key.
pub fn queue_key() -> String {
    format!(
        "{}{}:{}",
        INBOX_PREFIX,
        Utc::now().timestamp_millis(),
        Uuid::new_v4()
    )
}

/// Serialize `message` into the queue under a fresh key.
pub async fn enqueue(queue: &dyn Queue, message: &QueueMessage, ttl: Duration) -> Result<String> {
    let key = queue_key();
    let value = serde_json::to_string(message)?;
    queue.put(&key, &value, ttl).await?;
    debug!(key = %key, "queued capture");
    Ok(key)
}

/// List and decode every pending capture.
///
/// Entries that fail to decode are skipped with a warning and left in the
/// queue untouched.
pub async fn read_queue(queue: &dyn Queue) -> Result<Vec<QueuedItem>> {
    let entries = queue.list(INBOX_PREFIX).await?;
    Ok(entries
        .into_iter()
        .filter_map(|entry| match serde_json::from_str::<QueueMessage>(&entry.value) {
            Ok(message) => Some(QueuedItem {
                key: entry.key,
                message,
            }),
            Err(e) => {
                warn!(key = %entry.key, error = %e, "skipping undecodable queue entry");
                None
            }
        })
        .collect())
}

/// Delete `keys` concurrently.
pub async fn delete_keys(queue: &dyn Queue, keys: &[String]) -> Result<()> {
    try_join_all(keys.iter().map(|key| queue.delete(key))).await?;
    Ok(())
}

/// SQLite-backed [`Queue`] with per-entry expiry.
pub struct SqliteQueue {
    pool: SqlitePool,
}

impl SqliteQueue {
    /// Wrap a pool whose schema has been created by
    /// [`run_migrations`](crate::migrate::run_migrations).
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Remove expired entries. Returns the number of rows deleted.
    pub async fn purge_expired(&self) -> Result<u64> {
        let now = Utc::now().timestamp_millis();
        let result = sqlx::query("DELETE FROM queue WHERE expires_at <= ?")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Queue for SqliteQueue {
    async fn list(&self, prefix: &str) -> Result<Vec<QueueEntry>> {
        let now = Utc::now().timestamp_millis();
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT key, value FROM queue \
             WHERE substr(key, 1, length(?1)) = ?1 AND expires_at > ?2 \
             ORDER BY key",
        )
        .bind(prefix)
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(key, value)| QueueEntry { key, value })
            .collect())
    }

    async fn put(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);
        sqlx::query(
            "INSERT INTO queue (key, value, expires_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM queue WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryQueue;
    use crate::models::SourceType;
    use chrono::TimeZone;

    fn message(text: &str) -> QueueMessage {
        QueueMessage {
            text: text.to_string(),
            source_url: String::new(),
            source_type: SourceType::Text,
            created_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            user_id: Some(7),
        }
    }

    #[test]
    fn test_queue_key_format() {
        let key = queue_key();
        let parts: Vec<&str> = key.splitn(3, ':').collect();
        assert_eq!(parts[0], "inbox");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(Uuid::parse_str(parts[2]).is_ok());
    }

    #[tokio::test]
    async fn test_enqueue_read_delete() {
        let queue = InMemoryQueue::new();
        let k1 = enqueue(&queue, &message("one"), DEFAULT_TTL).await.unwrap();
        let k2 = enqueue(&queue, &message("two"), DEFAULT_TTL).await.unwrap();

        let items = read_queue(&queue).await.unwrap();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|i| i.key == k1 && i.message.text == "one"));
        assert_eq!(items[0].message.user_id, Some(7));

        delete_keys(&queue, &[k1, k2]).await.unwrap();
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_read_skips_undecodable() {
        let queue = InMemoryQueue::new();
        queue
            .put("inbox:1:bad", "not json", DEFAULT_TTL)
            .await
            .unwrap();
        enqueue(&queue, &message("good"), DEFAULT_TTL).await.unwrap();

        let items = read_queue(&queue).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].message.text, "good");
        assert_eq!(queue.len(), 2);
    }
}

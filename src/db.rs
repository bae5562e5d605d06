//! SQLite connection for the capture queue.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::time::Duration;

use crate::config::QueueConfig;

/// Open (creating if needed) the queue database at `config.path`.
///
/// WAL mode lets the webhook enqueue while a drain cycle is reading.
pub async fn connect(config: &QueueConfig) -> Result<SqlitePool> {
    let db_path = &config.path;

    if let Some(dir) = db_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create queue directory: {}", dir.display()))?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(4)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open queue database: {}", db_path.display()))
}

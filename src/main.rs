//! # Sprite CLI (`sprite`)
//!
//! Runs the capture webhook, manages the capture queue, and triggers drain
//! cycles by hand.
//!
//! ## Usage
//!
//! ```bash
//! sprite --config ./config/sprite.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `sprite init` | Create the queue database and run schema migrations |
//! | `sprite capture <file\|->` | Capture a Telegram update or message JSON |
//! | `sprite enqueue <text> [--url <url>]` | Queue a note for classification |
//! | `sprite queue` | List pending queue entries |
//! | `sprite drain [--dry-run]` | Run one drain cycle |
//! | `sprite serve` | Start the webhook server and scheduled drain |
//!
//! Secrets are read from the environment: `GITHUB_TOKEN`, `AI_API_KEY`,
//! `FIRECRAWL_API_KEY`, `TELEGRAM_BOT_TOKEN`, `TELEGRAM_WEBHOOK_SECRET_TOKEN`.
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sprite::bot::{failure_reply, handle_capture, CaptureSettings};
use sprite::config::{self, Config, Secrets};
use sprite::db;
use sprite::enrich::create_enricher;
use sprite::github::GitHubStore;
use sprite::llm::ChatModel;
use sprite::memory::{InMemoryQueue, InMemoryStore};
use sprite::migrate::run_migrations;
use sprite::models::{QueueMessage, SourceType};
use sprite::pipeline::{run_drain_cycle, DrainContext};
use sprite::queue::{enqueue, read_queue, SqliteQueue, INBOX_PREFIX};
use sprite::server;
use sprite::telegram::{Message, Update};
use sprite::traits::Queue;

/// Sprite: capture chat notes into a Git-backed Markdown vault.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/sprite.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "sprite",
    about = "Capture chat notes into a Git-backed Markdown vault and consolidate them with an AI classifier",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/sprite.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the queue database. Idempotent.
    Init,

    /// Capture one Telegram update (or bare message) from a JSON file.
    ///
    /// Pass `-` to read from stdin. The capture mode comes from
    /// `[capture].mode`.
    Capture {
        /// JSON file, or `-` for stdin.
        input: String,
    },

    /// Queue a note for the next drain cycle.
    Enqueue {
        text: String,

        /// Source URL of the note.
        #[arg(long)]
        url: Option<String>,
    },

    /// List pending queue entries.
    Queue,

    /// Run one drain cycle: preprocess, classify, archive, delete.
    Drain {
        /// Classify and render into an in-memory vault; the queue and the
        /// real vault are left untouched.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the webhook server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let secrets = Secrets::from_env();

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.queue).await?;
            run_migrations(&pool).await?;
            println!("Queue initialized at {}", cfg.queue.path.display());
        }
        Commands::Capture { input } => {
            run_capture(&cfg, &secrets, &input).await?;
        }
        Commands::Enqueue { text, url } => {
            let queue = open_queue(&cfg).await?;
            let source_url = url.unwrap_or_default();
            let message = QueueMessage {
                text,
                source_type: if source_url.is_empty() {
                    SourceType::Text
                } else {
                    SourceType::Url
                },
                source_url,
                created_at: Utc::now(),
                user_id: None,
            };
            let key = enqueue(&queue, &message, Duration::from_secs(cfg.queue.ttl_secs)).await?;
            println!("{}", key);
        }
        Commands::Queue => {
            let queue = open_queue(&cfg).await?;
            let items = read_queue(&queue).await?;
            if items.is_empty() {
                println!("Queue is empty.");
            }
            for item in &items {
                let text: String = item.message.text.chars().take(60).collect();
                println!(
                    "{}  {}  [{}] {}",
                    item.key,
                    item.message.created_at.format("%Y-%m-%d %H:%M"),
                    item.message.source_type.as_str(),
                    text.replace('\n', " ")
                );
            }
        }
        Commands::Drain { dry_run } => {
            run_drain(&cfg, &secrets, dry_run).await?;
        }
        Commands::Serve => {
            server::run_server(&cfg, &secrets).await?;
        }
    }

    Ok(())
}

async fn open_queue(cfg: &Config) -> anyhow::Result<SqliteQueue> {
    let pool = db::connect(&cfg.queue).await?;
    run_migrations(&pool).await?;
    Ok(SqliteQueue::new(pool))
}

async fn run_capture(cfg: &Config, secrets: &Secrets, input: &str) -> anyhow::Result<()> {
    let raw = if input == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input))?
    };

    let message: Option<Message> = match serde_json::from_str::<Update>(&raw) {
        Ok(update) => update.message,
        Err(_) => Some(
            serde_json::from_str::<Message>(&raw)
                .context("Input is neither a Telegram update nor a message")?,
        ),
    };

    let store = GitHubStore::new(&cfg.store, secrets.require_github_token()?)?;
    let queue = open_queue(cfg).await?;
    let settings = CaptureSettings::from_config(cfg);

    match handle_capture(&store, &queue, &settings, message.as_ref()).await {
        Ok(outcome) => {
            println!("{}", outcome.reply_text());
            Ok(())
        }
        Err(e) => {
            println!("{}", failure_reply(&e));
            Err(e.into())
        }
    }
}

async fn run_drain(cfg: &Config, secrets: &Secrets, dry_run: bool) -> anyhow::Result<()> {
    let model = ChatModel::new(&cfg.model, secrets.require_ai_api_key()?)?;
    let enricher = create_enricher(&cfg.enricher, secrets)?;
    let queue = open_queue(cfg).await?;
    info!(model = model.model_name(), dry_run, "starting drain cycle");

    if dry_run {
        // Copy the pending entries so the real queue is never drained.
        let snapshot = InMemoryQueue::new();
        for entry in queue.list(INBOX_PREFIX).await? {
            snapshot
                .put(&entry.key, &entry.value, Duration::from_secs(cfg.queue.ttl_secs))
                .await?;
        }
        let store = InMemoryStore::new();
        let ctx = DrainContext {
            queue: &snapshot,
            store: &store,
            model: &model,
            enricher: enricher.as_ref(),
            archive: &cfg.archive,
        };
        let report = run_drain_cycle(&ctx).await?;
        for path in store.paths() {
            println!("{}", path);
        }
        println!(
            "dry run: {} read, {} would be archived, {} skipped",
            report.read, report.archived, report.skipped
        );
        return Ok(());
    }

    let purged = queue.purge_expired().await?;
    if purged > 0 {
        info!(purged, "dropped expired queue entries");
    }

    let store = GitHubStore::new(&cfg.store, secrets.require_github_token()?)?;
    let ctx = DrainContext {
        queue: &queue,
        store: &store,
        model: &model,
        enricher: enricher.as_ref(),
        archive: &cfg.archive,
    };
    let report = run_drain_cycle(&ctx).await?;
    println!(
        "{} read, {} archived, {} skipped, {} deleted",
        report.read, report.archived, report.skipped, report.deleted
    );
    Ok(())
}

//! # Sprite
//!
//! Chat-to-Markdown note capture with batch AI consolidation.
//!
//! Notes sent to a Telegram bot are written into a Git-backed Markdown vault
//! through the GitHub contents API, either merged into a shared daily inbox
//! file or parked in a queue. A periodic drain cycle enriches queued links,
//! classifies the batch into PARA categories with a language model, and
//! files each note under `<category>/<topic>/`.
//!
//! ## Architecture
//!
//! ```text
//!                 ┌──────────────┐
//! Telegram ──────▶│  bot/server  │──── daily / note ────┐
//!                 └──────┬───────┘                      ▼
//!                        │ queue                 ┌──────────────┐
//!                        ▼                       │ DocumentStore│
//!                 ┌──────────────┐               │   (GitHub)   │
//!                 │ SQLite queue │               └──────────────┘
//!                 └──────┬───────┘                      ▲
//!                        ▼                              │
//!   ┌──────────┐   ┌────────────┐   ┌──────────┐   ┌─────────┐
//!   │ read     │──▶│ preprocess │──▶│ classify │──▶│ archive │──▶ delete
//!   └──────────┘   └────────────┘   └──────────┘   └─────────┘
//!                     Firecrawl        LLM
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! sprite init                         # create the queue database
//! sprite enqueue "read later" --url https://example.com/post
//! sprite drain --dry-run              # classify without touching the vault
//! sprite serve                        # webhook server + scheduled drain
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`traits`] | Store, model, enricher and queue interfaces |
//! | [`memory`] | In-memory store and queue |
//! | [`capture`] | Chat message → capture event |
//! | [`format`] | Note and daily-entry rendering |
//! | [`daily`] | Daily inbox file parse / merge |
//! | [`contents`] | Optimistic read-merge-write and suffix retry |
//! | [`github`] | GitHub contents API store |
//! | [`llm`] | Chat-completions model |
//! | [`enrich`] | Firecrawl page enrichment |
//! | [`db`] | Queue database connection |
//! | [`migrate`] | Queue schema |
//! | [`queue`] | SQLite queue and queue helpers |
//! | [`preprocess`] | Queue message cleanup and enrichment |
//! | [`classify`] | Batch PARA classification |
//! | [`archive`] | Category file writer and topic index |
//! | [`pipeline`] | Drain cycle |
//! | [`bot`] | Capture handler and replies |
//! | [`telegram`] | Bot API types and client |
//! | [`server`] | Webhook server |

pub mod archive;
pub mod bot;
pub mod capture;
pub mod classify;
pub mod config;
pub mod contents;
pub mod daily;
pub mod db;
pub mod enrich;
pub mod error;
pub mod format;
pub mod github;
pub mod llm;
pub mod memory;
pub mod migrate;
pub mod models;
pub mod pipeline;
pub mod preprocess;
pub mod queue;
pub mod server;
pub mod telegram;
pub mod traits;

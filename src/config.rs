use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::models::Category;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub enricher: EnricherConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub archive: ArchiveConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub owner: String,
    pub repo: String,
    #[serde(default)]
    pub branch: Option<String>,
    #[serde(default = "default_github_api")]
    pub api_base: String,
    #[serde(default = "default_inbox_dir")]
    pub inbox_dir: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Total read-merge-write attempts on the daily file, the first one
    /// included, before falling back to an alternate filename.
    #[serde(default = "default_store_attempts")]
    pub max_attempts: u32,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}
fn default_inbox_dir() -> String {
    "00_Inbox".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_store_attempts() -> u32 {
    3
}

/// How a captured chat message is persisted.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureMode {
    /// Append to the shared `inbox-<date>.md` file.
    #[default]
    Daily,
    /// One `inbox-<timestamp>.md` file per message.
    Note,
    /// Park in the queue for the next drain cycle.
    Queue,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CaptureConfig {
    #[serde(default)]
    pub mode: CaptureMode,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_base")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_model_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_model_retries")]
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_model_base(),
            model: default_model(),
            timeout_secs: default_model_timeout(),
            max_retries: default_model_retries(),
        }
    }
}

fn default_model_base() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_model_timeout() -> u64 {
    60
}
fn default_model_retries() -> u32 {
    2
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnricherConfig {
    #[serde(default = "default_enricher_provider")]
    pub provider: String,
    #[serde(default = "default_firecrawl_base")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnricherConfig {
    fn default() -> Self {
        Self {
            provider: default_enricher_provider(),
            base_url: default_firecrawl_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl EnricherConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_enricher_provider() -> String {
    "firecrawl".to_string()
}
fn default_firecrawl_base() -> String {
    "https://api.firecrawl.dev".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct QueueConfig {
    #[serde(default = "default_queue_path")]
    pub path: PathBuf,
    #[serde(default = "default_queue_ttl")]
    pub ttl_secs: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            path: default_queue_path(),
            ttl_secs: default_queue_ttl(),
        }
    }
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("./data/queue.sqlite")
}
fn default_queue_ttl() -> u64 {
    604_800
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ArchiveConfig {
    /// Maintain an `Index.md` link list in every topic folder.
    #[serde(default)]
    pub update_index: bool,
    #[serde(default)]
    pub dirs: CategoryDirs,
}

/// Target directory per classification category.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CategoryDirs {
    #[serde(default = "default_projects_dir")]
    pub projects: String,
    #[serde(default = "default_areas_dir")]
    pub areas: String,
    #[serde(default = "default_resources_dir")]
    pub resources: String,
    #[serde(default = "default_archives_dir")]
    pub archives: String,
    #[serde(default = "default_jobs_dir")]
    pub jobs: String,
}

impl Default for CategoryDirs {
    fn default() -> Self {
        Self {
            projects: default_projects_dir(),
            areas: default_areas_dir(),
            resources: default_resources_dir(),
            archives: default_archives_dir(),
            jobs: default_jobs_dir(),
        }
    }
}

impl CategoryDirs {
    pub fn dir_for(&self, category: Category) -> &str {
        match category {
            Category::Projects => &self.projects,
            Category::Areas => &self.areas,
            Category::Resources => &self.resources,
            Category::Archives => &self.archives,
            Category::Jobs => &self.jobs,
        }
    }
}

fn default_projects_dir() -> String {
    "01_Projects".to_string()
}
fn default_areas_dir() -> String {
    "02_Areas".to_string()
}
fn default_resources_dir() -> String {
    "03_Resources".to_string()
}
fn default_archives_dir() -> String {
    "04_Archive".to_string()
}
fn default_jobs_dir() -> String {
    "02_Jobs".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Seconds between scheduled drain cycles; `0` disables the schedule.
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,
    #[serde(default = "default_telegram_api")]
    pub telegram_api_base: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            drain_interval_secs: default_drain_interval(),
            telegram_api_base: default_telegram_api(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}
fn default_drain_interval() -> u64 {
    900
}
fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

/// Credentials read from the environment. Never stored in the config file.
#[derive(Clone, Default)]
pub struct Secrets {
    pub github_token: Option<String>,
    pub ai_api_key: Option<String>,
    pub firecrawl_api_key: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_webhook_secret: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Self {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self {
            github_token: var("GITHUB_TOKEN"),
            ai_api_key: var("AI_API_KEY"),
            firecrawl_api_key: var("FIRECRAWL_API_KEY"),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_webhook_secret: var("TELEGRAM_WEBHOOK_SECRET_TOKEN"),
        }
    }

    pub fn require_github_token(&self) -> Result<&str> {
        self.github_token
            .as_deref()
            .context("GITHUB_TOKEN environment variable not set")
    }

    pub fn require_ai_api_key(&self) -> Result<&str> {
        self.ai_api_key
            .as_deref()
            .context("AI_API_KEY environment variable not set")
    }

    pub fn require_telegram_bot_token(&self) -> Result<&str> {
        self.telegram_bot_token
            .as_deref()
            .context("TELEGRAM_BOT_TOKEN environment variable not set")
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    // Validate store
    if config.store.owner.trim().is_empty() || config.store.repo.trim().is_empty() {
        anyhow::bail!("store.owner and store.repo must not be empty");
    }
    if config.store.timeout_secs == 0 {
        anyhow::bail!("store.timeout_secs must be > 0");
    }
    if config.store.max_attempts == 0 {
        anyhow::bail!("store.max_attempts must be >= 1");
    }

    // Validate model
    if config.model.timeout_secs == 0 {
        anyhow::bail!("model.timeout_secs must be > 0");
    }
    if config.model.model.trim().is_empty() {
        anyhow::bail!("model.model must not be empty");
    }

    // Validate enricher
    match config.enricher.provider.as_str() {
        "disabled" | "firecrawl" => {}
        other => anyhow::bail!(
            "Unknown enricher provider: '{}'. Must be firecrawl or disabled.",
            other
        ),
    }
    if config.enricher.timeout_secs == 0 {
        anyhow::bail!("enricher.timeout_secs must be > 0");
    }

    if config.queue.ttl_secs == 0 {
        anyhow::bail!("queue.ttl_secs must be > 0");
    }

    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

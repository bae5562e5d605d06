//! Telegram webhook server and scheduled drain loop.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/{token}` | Telegram webhook; `token` must be the bot token |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Authentication
//!
//! The path token is compared against `TELEGRAM_BOT_TOKEN` (401 on
//! mismatch). When `TELEGRAM_WEBHOOK_SECRET_TOKEN` is set, the
//! `X-Telegram-Bot-Api-Secret-Token` header must carry it as well.
//! Authentication runs before the body is decoded.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "capture_failed", "message": "github request failed: 500 ..." } }
//! ```
//!
//! Error codes: `unauthorized` (401), `bad_request` (400), `capture_failed` (500).
//!
//! # Scheduled drain
//!
//! With `server.drain_interval_secs > 0`, a background task runs one drain
//! cycle per interval. Cycles never overlap; a failed cycle is logged and
//! the next one runs on schedule.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::bot::{failure_reply, handle_capture, CaptureSettings};
use crate::config::{ArchiveConfig, Config, Secrets};
use crate::db;
use crate::enrich::create_enricher;
use crate::github::GitHubStore;
use crate::llm::ChatModel;
use crate::migrate::run_migrations;
use crate::pipeline::{run_drain_cycle, DrainContext};
use crate::queue::SqliteQueue;
use crate::telegram::{TelegramClient, Update};
use crate::traits::{ContentEnricher, DocumentStore, LanguageModel, Queue};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn DocumentStore>,
    queue: Arc<dyn Queue>,
    telegram: Arc<TelegramClient>,
    settings: Arc<CaptureSettings>,
    token_digest: [u8; 32],
    webhook_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        queue: Arc<dyn Queue>,
        telegram: Arc<TelegramClient>,
        settings: CaptureSettings,
        bot_token: &str,
        webhook_secret: Option<&str>,
    ) -> Self {
        Self {
            store,
            queue,
            telegram,
            settings: Arc::new(settings),
            token_digest: digest(bot_token),
            webhook_secret: webhook_secret.map(Arc::from),
        }
    }

    fn authorized(&self, token: &str, headers: &HeaderMap) -> bool {
        if digest(token) != self.token_digest {
            return false;
        }
        match &self.webhook_secret {
            None => true,
            Some(secret) => headers
                .get(SECRET_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| digest(v) == digest(secret)),
        }
    }
}

fn digest(value: &str) -> [u8; 32] {
    Sha256::digest(value.as_bytes()).into()
}

/// Collaborators of the scheduled drain loop.
pub struct DrainServices {
    pub queue: Arc<dyn Queue>,
    pub store: Arc<dyn DocumentStore>,
    pub model: Arc<dyn LanguageModel>,
    pub enricher: Arc<dyn ContentEnricher>,
    pub archive: ArchiveConfig,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/{token}", post(handle_webhook))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Spawn the drain loop. The first cycle runs one `interval` after start.
pub fn spawn_drain_loop(services: DrainServices, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let ctx = DrainContext {
                queue: services.queue.as_ref(),
                store: services.store.as_ref(),
                model: services.model.as_ref(),
                enricher: services.enricher.as_ref(),
                archive: &services.archive,
            };
            if let Err(e) = run_drain_cycle(&ctx).await {
                error!(stage = %e.stage, error = %e.source, "scheduled drain failed");
            }
        }
    })
}

/// Start the webhook server.
///
/// Connects the GitHub store and the SQLite queue, starts the drain loop
/// when configured, and serves until the process is terminated.
pub async fn run_server(config: &Config, secrets: &Secrets) -> anyhow::Result<()> {
    let bot_token = secrets.require_telegram_bot_token()?;
    let store: Arc<dyn DocumentStore> = Arc::new(GitHubStore::new(
        &config.store,
        secrets.require_github_token()?,
    )?);

    let pool = db::connect(&config.queue).await?;
    run_migrations(&pool).await?;
    let queue: Arc<dyn Queue> = Arc::new(SqliteQueue::new(pool));

    let telegram = Arc::new(TelegramClient::new(
        &config.server.telegram_api_base,
        bot_token,
        Duration::from_secs(config.store.timeout_secs),
    )?);

    let _drain = if config.server.drain_interval_secs > 0 {
        let model: Arc<dyn LanguageModel> =
            Arc::new(ChatModel::new(&config.model, secrets.require_ai_api_key()?)?);
        let enricher: Arc<dyn ContentEnricher> =
            Arc::from(create_enricher(&config.enricher, secrets)?);
        let services = DrainServices {
            queue: queue.clone(),
            store: store.clone(),
            model,
            enricher,
            archive: config.archive.clone(),
        };
        info!(
            interval_secs = config.server.drain_interval_secs,
            "scheduled drain enabled"
        );
        Some(spawn_drain_loop(
            services,
            Duration::from_secs(config.server.drain_interval_secs),
        ))
    } else {
        None
    };

    let state = AppState::new(
        store,
        queue,
        telegram,
        CaptureSettings::from_config(config),
        bot_token,
        secrets.telegram_webhook_secret.as_deref(),
    );
    let app = build_router(state);

    let bind_addr = &config.server.bind;
    let token_prefix: String = bot_token.chars().take(8).collect();
    info!(
        bind = %bind_addr,
        webhook = %format!("/{}...", token_prefix),
        mode = ?config.capture.mode,
        "webhook server listening"
    );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Error response
// ═══════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn unauthorized() -> AppError {
    AppError {
        status: StatusCode::UNAUTHORIZED,
        code: "unauthorized",
        message: "invalid webhook token".to_string(),
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// GET /health
// ═══════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ═══════════════════════════════════════════════════════════════════════
// POST /{token}
// ═══════════════════════════════════════════════════════════════════════

async fn handle_webhook(
    State(state): State<AppState>,
    Path(token): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str, AppError> {
    if !state.authorized(&token, &headers) {
        warn!("rejected webhook call with invalid token");
        return Err(unauthorized());
    }

    let update: Update = serde_json::from_slice(&body)
        .map_err(|e| bad_request(format!("invalid update: {}", e)))?;
    let message = update.message.as_ref();
    let chat_id = message.and_then(|m| m.chat.as_ref()).map(|c| c.id);

    let outcome = handle_capture(
        state.store.as_ref(),
        state.queue.as_ref(),
        &state.settings,
        message,
    )
    .await;

    match outcome {
        Ok(outcome) => {
            if let Some(chat_id) = chat_id {
                reply(&state, chat_id, &outcome.reply_text()).await;
            }
            Ok("OK")
        }
        Err(e) => {
            error!(update_id = update.update_id, error = %e, "capture failed");
            if let Some(chat_id) = chat_id {
                reply(&state, chat_id, &failure_reply(&e)).await;
            }
            Err(AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "capture_failed",
                message: e.to_string(),
            })
        }
    }
}

async fn reply(state: &AppState, chat_id: i64, text: &str) {
    if let Err(e) = state.telegram.send_message(chat_id, text).await {
        warn!(chat_id, error = %e, "failed to send reply");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CaptureMode;
    use crate::memory::{InMemoryQueue, InMemoryStore};
    use axum::http::HeaderValue;

    fn state(secret: Option<&str>) -> AppState {
        AppState::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(InMemoryQueue::new()),
            Arc::new(
                TelegramClient::new("http://127.0.0.1:9", "123:abc", Duration::from_secs(1))
                    .unwrap(),
            ),
            CaptureSettings {
                mode: CaptureMode::Daily,
                inbox_dir: "00_Inbox".to_string(),
                max_attempts: 3,
                queue_ttl: Duration::from_secs(60),
            },
            "123:abc",
            secret,
        )
    }

    #[test]
    fn test_token_check() {
        let state = state(None);
        assert!(state.authorized("123:abc", &HeaderMap::new()));
        assert!(!state.authorized("123:abd", &HeaderMap::new()));
        assert!(!state.authorized("", &HeaderMap::new()));
    }

    #[test]
    fn test_secret_header_check() {
        let state = state(Some("s3cret"));
        let mut headers = HeaderMap::new();
        assert!(!state.authorized("123:abc", &headers));

        headers.insert(SECRET_HEADER, HeaderValue::from_static("wrong"));
        assert!(!state.authorized("123:abc", &headers));

        headers.insert(SECRET_HEADER, HeaderValue::from_static("s3cret"));
        assert!(state.authorized("123:abc", &headers));
        assert!(!state.authorized("nope", &headers));
    }
}

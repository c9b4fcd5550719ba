pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use reqwest::Client;
use sqlx::SqlitePool;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::services::{
    extraction_service::ExtractionService,
    generation_session::SessionManager,
    history_service::HistoryService,
    llm_service::{ChatCompletion, LlmService},
    quiz_generator::{QuizGenerator, SectionGenerator},
};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: SessionManager,
    pub extraction_service: ExtractionService,
    pub history_service: HistoryService,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> error::Result<Self> {
        let config = config::get_config();
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        let chat: Arc<dyn ChatCompletion> = Arc::new(LlmService::new(
            http_client,
            config.openai_api_key.clone(),
            config.openai_base_url.clone(),
        ));
        let generator: Arc<dyn SectionGenerator> = Arc::new(QuizGenerator::new(
            chat.clone(),
            config.generation_models.clone(),
        ));

        Ok(Self::from_parts(pool, chat, generator, config))
    }

    /// Wires the state around an arbitrary chat backend and generator.
    pub fn from_parts(
        pool: SqlitePool,
        chat: Arc<dyn ChatCompletion>,
        generator: Arc<dyn SectionGenerator>,
        config: &Config,
    ) -> Self {
        Self {
            sessions: SessionManager::new(generator, config.session_ttl, config.max_words),
            extraction_service: ExtractionService::new(
                chat,
                config.vision_models.clone(),
                config.max_words,
            ),
            history_service: HistoryService::new(pool.clone()),
            max_upload_bytes: config.max_upload_bytes,
            pool,
        }
    }
}

/// Routes under `/api`, without rate limiting or transport layers.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/api/words/extract", post(routes::extraction::extract_words))
        .route(
            "/api/generation-sessions",
            post(routes::generation::create_session),
        )
        .route(
            "/api/generation-sessions/:id",
            get(routes::generation::get_session),
        )
        .route(
            "/api/generation-sessions/:id/sections/:section",
            get(routes::generation::get_section),
        )
        .route(
            "/api/generation-sessions/:id/sections/:section/retry",
            post(routes::generation::retry_section),
        )
        .route(
            "/api/quiz-sessions",
            post(routes::quiz::submit_quiz).get(routes::quiz::list_quiz_sessions),
        )
        .route(
            "/api/quiz-sessions/:id",
            get(routes::quiz::get_quiz_session).delete(routes::quiz::delete_quiz_session),
        )
}

pub fn build_app(state: AppState, public_rps: u32) -> Router {
    let max_upload_bytes = state.max_upload_bytes;
    let api = api_router().layer(axum::middleware::from_fn_with_state(
        middleware::rate_limit::new_rps_state(public_rps),
        middleware::rate_limit::rps_middleware,
    ));

    Router::new()
        .route("/health", get(routes::health::health))
        .merge(api)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        // multipart framing overhead on top of the image itself
        .layer(DefaultBodyLimit::max(max_upload_bytes + 64 * 1024))
}

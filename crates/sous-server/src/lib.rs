//! Sous server library logic.

pub mod api;
pub mod api_voice;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Extension, Json, Router,
};
use config::Config;
use serde_json::{json, Value};
use sous_pipeline::VoicePipeline;
use sous_voice::{
    LlmClient, LlmCompletenessClassifier, LlmDialogueEngine, SttService, TtsService, VoiceError,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room for the text fields and multipart framing around an audio upload.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The conversation pipeline. Holds no per-request state.
    pub pipeline: Arc<VoicePipeline>,
    /// Cancelled on shutdown; every streamed run watches a child token.
    pub shutdown: CancellationToken,
    /// Wall-clock limit for one streamed run.
    pub request_timeout: Option<Duration>,
    /// Largest accepted audio upload, in bytes.
    pub max_audio_bytes: usize,
}

impl AppState {
    pub fn new(pipeline: VoicePipeline, config: &Config, shutdown: CancellationToken) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            shutdown,
            request_timeout: config.pipeline.request_timeout(),
            max_audio_bytes: config.server.max_audio_bytes,
        }
    }
}

/// Wires the whisper, piper and language-model backends into a pipeline.
///
/// # Errors
///
/// Returns `VoiceError::Config` if the language model client cannot be
/// built from `config.llm`.
pub fn build_pipeline(config: &Config) -> Result<VoicePipeline, VoiceError> {
    let llm = LlmClient::new(config.llm.clone())?;
    Ok(VoicePipeline::new(
        Arc::new(SttService::new(config.stt.clone())),
        Arc::new(LlmCompletenessClassifier::new(llm.clone())),
        Arc::new(LlmDialogueEngine::new(llm)),
        Arc::new(TtsService::new(config.tts.clone())),
    ))
}

/// Health check handler.
///
/// Returns `200 OK` with server status and version.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let body_limit = state.max_audio_bytes.saturating_add(FORM_OVERHEAD_BYTES);

    let voice_routes = Router::new()
        .route("/api/voice/stt", post(api_voice::stt_handler))
        .route("/api/voice/process-text", post(api_voice::process_text_handler))
        .route("/api/voice/process", post(api_voice::process_handler))
        .route("/api/voice/health", get(api_voice::health_handler));

    Router::new()
        .route("/health", get(health))
        .merge(voice_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}

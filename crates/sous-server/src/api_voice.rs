//! Voice conversation handlers.
//!
//! All three entry points take `multipart/form-data`. Session fields are
//! shared; `/process-text` adds `text` and `history`, while `/stt` and
//! `/process` take an `audio` file.

use crate::api::ApiError;
use crate::AppState;
use axum::{
    extract::{multipart::Field, Extension, Multipart},
    http::{header, HeaderName, HeaderValue},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    Json,
};
use futures_util::StreamExt;
use serde_json::{json, Value};
use sous_pipeline::{EventEncoder, EventStream};
use sous_types::{History, SessionContext, TranscriptResult};
use std::{convert::Infallible, sync::Arc};

/// Fields of a voice request form. Absent session fields fall back to
/// their defaults when the session is built.
#[derive(Debug, Default)]
struct VoiceForm {
    text: Option<String>,
    audio: Option<Vec<u8>>,
    current_step: String,
    current_cook: String,
    recipe_context: String,
    step_index: Option<String>,
    total_steps: Option<String>,
    history: Option<String>,
}

impl VoiceForm {
    async fn read(mut multipart: Multipart, max_audio_bytes: usize) -> Result<Self, ApiError> {
        let mut form = Self::default();

        while let Some(mut field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "audio" => form.audio = Some(read_audio(&mut field, max_audio_bytes).await?),
                "text" => form.text = Some(field.text().await?),
                "current_step" => form.current_step = field.text().await?,
                "current_cook" => form.current_cook = field.text().await?,
                "recipe_context" => form.recipe_context = field.text().await?,
                "step_index" => form.step_index = Some(field.text().await?),
                "total_steps" => form.total_steps = Some(field.text().await?),
                "history" => form.history = Some(field.text().await?),
                other => tracing::debug!(field = other, "ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn session(&self) -> Result<SessionContext, ApiError> {
        let step_index = parse_count("step_index", self.step_index.as_deref(), 0)?;
        let total_steps = parse_count("total_steps", self.total_steps.as_deref(), 1)?;
        SessionContext::new(
            self.current_step.clone(),
            self.current_cook.clone(),
            self.recipe_context.clone(),
            step_index,
            total_steps,
        )
        .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn take_audio(&mut self) -> Result<Vec<u8>, ApiError> {
        let audio = self
            .audio
            .take()
            .ok_or_else(|| ApiError::BadRequest("audio file is required".to_string()))?;
        if audio.is_empty() {
            return Err(ApiError::BadRequest("audio file is empty".to_string()));
        }
        Ok(audio)
    }

    fn take_text(&mut self) -> Result<String, ApiError> {
        let text = self
            .text
            .take()
            .ok_or_else(|| ApiError::BadRequest("text is required".to_string()))?;
        if text.trim().is_empty() {
            return Err(ApiError::BadRequest("text must not be empty".to_string()));
        }
        Ok(text)
    }

    /// Unparseable history is treated as no history.
    fn history(&self) -> History {
        History::parse_lenient(self.history.as_deref().unwrap_or("[]"))
    }
}

async fn read_audio(field: &mut Field<'_>, limit: usize) -> Result<Vec<u8>, ApiError> {
    let mut audio = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if audio.len() + chunk.len() > limit {
            return Err(ApiError::PayloadTooLarge(format!(
                "audio exceeds {} bytes",
                limit
            )));
        }
        audio.extend_from_slice(&chunk);
    }
    Ok(audio)
}

fn parse_count(name: &str, raw: Option<&str>, default: u32) -> Result<u32, ApiError> {
    match raw {
        None => Ok(default),
        Some(value) => value.trim().parse().map_err(|_| {
            ApiError::BadRequest(format!(
                "{} must be a non-negative integer, got {:?}",
                name, value
            ))
        }),
    }
}

/// Wraps a run for the wire and attaches the streaming headers.
fn event_stream_response(state: &AppState, events: EventStream) -> Response {
    let mut encoder = EventEncoder::new().with_cancellation(state.shutdown.child_token());
    if let Some(timeout) = state.request_timeout {
        encoder = encoder.with_timeout(timeout);
    }

    let records = encoder
        .encode(events)
        .map(|record| Ok::<_, Infallible>(Event::default().data(record)));

    let mut response = Sse::new(records)
        .keep_alive(KeepAlive::default())
        .into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    headers.insert(
        HeaderName::from_static("x-accel-buffering"),
        HeaderValue::from_static("no"),
    );
    response
}

/// Handler for `POST /api/voice/stt`.
///
/// Transcribes the upload and labels it COMPLETE or INCOMPLETE. Collaborator
/// failures still answer 200 with an empty INCOMPLETE result and `error`.
pub async fn stt_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<TranscriptResult>, ApiError> {
    let mut form = VoiceForm::read(multipart, state.max_audio_bytes).await?;
    let audio = form.take_audio()?;

    let result = state.pipeline.transcribe_and_analyze(&audio).await;
    if let Some(error) = &result.error {
        tracing::warn!(%error, "transcription degraded");
    }
    Ok(Json(result))
}

/// Handler for `POST /api/voice/process-text`.
///
/// Streams `llm`, `tts_chunk`*, then `done` or `error` as server-sent events.
pub async fn process_text_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = VoiceForm::read(multipart, state.max_audio_bytes).await?;
    let text = form.take_text()?;
    let session = form.session()?;
    let history = form.history();

    let events = state.pipeline.run_text(text, session, history);
    Ok(event_stream_response(&state, events))
}

/// Handler for `POST /api/voice/process`.
///
/// Like `/process-text` but starts from audio, so the stream opens with `stt`.
pub async fn process_handler(
    Extension(state): Extension<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut form = VoiceForm::read(multipart, state.max_audio_bytes).await?;
    let audio = form.take_audio()?;
    let session = form.session()?;

    let events = state.pipeline.run_voice(audio, session);
    Ok(event_stream_response(&state, events))
}

/// Handler for `GET /api/voice/health`.
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "voice"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_default_when_absent() {
        assert_eq!(parse_count("step_index", None, 0).unwrap(), 0);
        assert_eq!(parse_count("total_steps", None, 1).unwrap(), 1);
    }

    #[test]
    fn counts_reject_non_integers() {
        assert!(parse_count("step_index", Some("two"), 0).is_err());
        assert!(parse_count("step_index", Some("-1"), 0).is_err());
        assert!(parse_count("step_index", Some(""), 0).is_err());
        assert_eq!(parse_count("step_index", Some(" 3 "), 0).unwrap(), 3);
    }

    #[test]
    fn session_requires_a_step() {
        let form = VoiceForm {
            total_steps: Some("0".to_string()),
            ..VoiceForm::default()
        };
        assert!(matches!(form.session(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn blank_text_is_rejected() {
        let mut form = VoiceForm {
            text: Some("   ".to_string()),
            ..VoiceForm::default()
        };
        assert!(matches!(form.take_text(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn empty_audio_is_rejected() {
        let mut form = VoiceForm {
            audio: Some(Vec::new()),
            ..VoiceForm::default()
        };
        assert!(matches!(form.take_audio(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn malformed_history_becomes_empty() {
        let form = VoiceForm {
            history: Some("not json".to_string()),
            ..VoiceForm::default()
        };
        assert!(form.history().is_empty());
    }
}

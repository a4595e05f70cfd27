//! The per-request stage machine behind `run_voice` and `run_text`.
//!
//! ```text
//! Transcribing ─ok─▶ Generating ─ok─▶ Synthesizing ─▶ Streaming ─exhausted─▶ Done
//!      │err              │err              │err            │err
//!      ▼                 ▼                 ▼               ▼
//!    Error             Error             Error           Error
//! ```
//!
//! Each pull on the stream advances the machine until it has one event to
//! hand out. Terminal events move the machine to `Finished`, after which the
//! stream ends.

use crate::VoicePipeline;
use futures_util::stream::{self, BoxStream, StreamExt};
use sous_types::{History, PipelineEvent, SessionContext};
use sous_voice::{AudioStream, VoiceError};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Events of one pipeline run, in emission order.
pub type EventStream = BoxStream<'static, PipelineEvent>;

enum Stage {
    Transcribing { audio: Vec<u8> },
    Generating { text: String },
    Synthesizing { reply: String },
    Streaming { chunks: AudioStream },
    Completing,
    Finished,
}

impl Stage {
    fn name(&self) -> &'static str {
        match self {
            Self::Transcribing { .. } => "transcribing",
            Self::Generating { .. } => "generating",
            Self::Synthesizing { .. } => "synthesizing",
            Self::Streaming { .. } => "streaming",
            Self::Completing => "completing",
            Self::Finished => "finished",
        }
    }
}

struct Run {
    pipeline: VoicePipeline,
    session: SessionContext,
    history: History,
    stage: Stage,
    span: tracing::Span,
    started: Instant,
    sample_rate: Option<u32>,
    chunks_sent: usize,
}

impl VoicePipeline {
    /// Starts an audio-first run: `stt`, `llm`, `tts_chunk`*, then `done`.
    ///
    /// Only the transcribed utterance and the session reach the dialogue
    /// engine; this entry point carries no history.
    pub fn run_voice(&self, audio: Vec<u8>, session: SessionContext) -> EventStream {
        self.start(Stage::Transcribing { audio }, session, History::empty(), "voice")
    }

    /// Starts a text-first run: `llm`, `tts_chunk`*, then `done`.
    pub fn run_text(&self, text: String, session: SessionContext, history: History) -> EventStream {
        self.start(Stage::Generating { text }, session, history, "text")
    }

    fn start(
        &self,
        stage: Stage,
        session: SessionContext,
        history: History,
        entry: &'static str,
    ) -> EventStream {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("pipeline_run", %run_id, entry);
        span.in_scope(|| {
            tracing::debug!(
                step_index = session.step_index,
                total_steps = session.total_steps,
                history_len = history.len(),
                "pipeline run started"
            );
        });

        let run = Run {
            pipeline: self.clone(),
            session,
            history,
            stage,
            span,
            started: Instant::now(),
            sample_rate: None,
            chunks_sent: 0,
        };

        stream::unfold(run, |run| {
            let span = run.span.clone();
            run.advance().instrument(span)
        })
        .boxed()
    }
}

impl Run {
    async fn advance(mut self) -> Option<(PipelineEvent, Self)> {
        loop {
            let stage = std::mem::replace(&mut self.stage, Stage::Finished);
            tracing::trace!(stage = stage.name(), "advancing");

            match stage {
                Stage::Transcribing { audio } => {
                    let transcript = self.pipeline.transcriber.transcribe(&audio).await;
                    return match transcript {
                        Ok(text) => {
                            tracing::debug!(chars = text.chars().count(), "transcription ready");
                            self.stage = Stage::Generating { text: text.clone() };
                            Some((PipelineEvent::Stt { text }, self))
                        }
                        Err(e) => self.fail("transcription", e),
                    };
                }
                Stage::Generating { text } => {
                    let reply = self
                        .pipeline
                        .dialogue
                        .respond(&text, &self.session, &self.history)
                        .await;
                    return match reply {
                        Ok(turn) => {
                            tracing::debug!(intent = %turn.intent, action = %turn.action, "dialogue turn ready");
                            self.stage = if turn.text.trim().is_empty() {
                                Stage::Completing
                            } else {
                                Stage::Synthesizing {
                                    reply: turn.text.clone(),
                                }
                            };
                            Some((PipelineEvent::Llm(turn), self))
                        }
                        Err(e) => self.fail("generation", e),
                    };
                }
                Stage::Synthesizing { reply } => {
                    let started = self.pipeline.synthesizer.synthesize(&reply).await;
                    match started {
                        Ok(chunks) => self.stage = Stage::Streaming { chunks },
                        Err(e) => return self.fail("synthesis", e),
                    }
                }
                Stage::Streaming { mut chunks } => {
                    return match chunks.next().await {
                        Some(Ok(chunk)) => {
                            let expected = *self.sample_rate.get_or_insert(chunk.sample_rate);
                            if chunk.sample_rate != expected {
                                return self.fail(
                                    "synthesis",
                                    VoiceError::Tts(format!(
                                        "sample rate changed mid-utterance from {} to {}",
                                        expected, chunk.sample_rate
                                    )),
                                );
                            }
                            self.chunks_sent += 1;
                            self.stage = Stage::Streaming { chunks };
                            Some((PipelineEvent::TtsChunk(chunk), self))
                        }
                        Some(Err(e)) => self.fail("synthesis", e),
                        None => self.complete(),
                    };
                }
                Stage::Completing => return self.complete(),
                Stage::Finished => return None,
            }
        }
    }

    fn complete(mut self) -> Option<(PipelineEvent, Self)> {
        self.stage = Stage::Finished;
        tracing::info!(
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            chunks = self.chunks_sent,
            "pipeline run completed"
        );
        Some((PipelineEvent::Done, self))
    }

    fn fail(mut self, stage: &'static str, error: VoiceError) -> Option<(PipelineEvent, Self)> {
        self.stage = Stage::Finished;
        tracing::warn!(
            stage,
            error = %error,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            chunks = self.chunks_sent,
            "pipeline run failed"
        );
        Some((PipelineEvent::error(error.to_string()), self))
    }
}

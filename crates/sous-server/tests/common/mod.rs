//! Test server and scripted voice collaborators.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use sous_pipeline::VoicePipeline;
use sous_server::{app, AppState};
use sous_types::{AudioChunk, Completeness, DialogueTurn, History, SessionContext};
use sous_voice::{
    AudioStream, CompletenessClassifier, DialogueEngine, SpeechSynthesizer, Transcriber,
    VoiceError,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct FakeTranscriber(pub Result<String, String>);

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, VoiceError> {
        self.0.clone().map_err(VoiceError::Stt)
    }
}

pub struct FakeClassifier(pub Completeness);

#[async_trait]
impl CompletenessClassifier for FakeClassifier {
    async fn classify(&self, _text: &str) -> Result<Completeness, VoiceError> {
        Ok(self.0)
    }
}

#[derive(Debug, Clone)]
pub struct DialogueCall {
    pub text: String,
    pub session: SessionContext,
    pub history: History,
}

pub struct FakeDialogue {
    pub turn: DialogueTurn,
    pub calls: Mutex<Vec<DialogueCall>>,
}

#[async_trait]
impl DialogueEngine for FakeDialogue {
    async fn respond(
        &self,
        text: &str,
        session: &SessionContext,
        history: &History,
    ) -> Result<DialogueTurn, VoiceError> {
        self.calls.lock().unwrap().push(DialogueCall {
            text: text.to_string(),
            session: session.clone(),
            history: history.clone(),
        });
        Ok(self.turn.clone())
    }
}

/// Sets a flag when dropped, to observe abandoned synthesis.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct FakeSynthesizer {
    pub chunks: Vec<Vec<u8>>,
    pub sample_rate: u32,
    /// Keep the stream open after the last chunk.
    pub hang: bool,
    /// Set once the audio stream handed out by `synthesize` is dropped.
    pub dropped: Arc<AtomicBool>,
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, VoiceError> {
        let rate = self.sample_rate;
        let flag = DropFlag(self.dropped.clone());
        let head = stream::iter(self.chunks.clone()).map(move |pcm| {
            let _alive = &flag;
            Ok(AudioChunk::new(pcm, rate))
        });
        if self.hang {
            Ok(head.chain(stream::pending()).boxed())
        } else {
            Ok(head.boxed())
        }
    }
}

/// A pipeline wired to scripted collaborators.
pub struct Harness {
    pub transcript: Result<String, String>,
    pub completeness: Completeness,
    pub dialogue: Arc<FakeDialogue>,
    pub chunks: Vec<Vec<u8>>,
    pub hang: bool,
    pub synthesis_dropped: Arc<AtomicBool>,
}

impl Default for Harness {
    fn default() -> Self {
        Self {
            transcript: Ok("다음 단계".to_string()),
            completeness: Completeness::Complete,
            dialogue: Arc::new(FakeDialogue {
                turn: DialogueTurn::new("next_step", "면을 넣고 4분 끓이세요.", "next_step"),
                calls: Mutex::new(Vec::new()),
            }),
            chunks: vec![vec![0, 1], vec![2, 3]],
            hang: false,
            synthesis_dropped: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Harness {
    pub fn synthesis_was_dropped(&self) -> bool {
        self.synthesis_dropped.load(Ordering::SeqCst)
    }

    pub fn pipeline(&self) -> VoicePipeline {
        VoicePipeline::new(
            Arc::new(FakeTranscriber(self.transcript.clone())),
            Arc::new(FakeClassifier(self.completeness)),
            self.dialogue.clone(),
            Arc::new(FakeSynthesizer {
                chunks: self.chunks.clone(),
                sample_rate: 22050,
                hang: self.hang,
                dropped: self.synthesis_dropped.clone(),
            }),
        )
    }

    pub fn state(&self) -> AppState {
        AppState {
            pipeline: Arc::new(self.pipeline()),
            shutdown: CancellationToken::new(),
            request_timeout: None,
            max_audio_bytes: 1024,
        }
    }
}

/// Serves `state` on an ephemeral port and returns the base URL.
pub async fn spawn_server(state: AppState) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Parses the `data:` records of a finished event stream body.
pub fn parse_events(body: &str) -> Vec<serde_json::Value> {
    body.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim_start()).unwrap())
        .collect()
}

pub fn event_types(events: &[serde_json::Value]) -> Vec<String> {
    events
        .iter()
        .map(|event| event["type"].as_str().unwrap_or_default().to_string())
        .collect()
}

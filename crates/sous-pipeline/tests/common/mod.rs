//! Scripted collaborators for pipeline tests.
#![allow(dead_code)]

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use sous_pipeline::VoicePipeline;
use sous_types::{AudioChunk, Completeness, DialogueTurn, History, SessionContext};
use sous_voice::{
    AudioStream, CompletenessClassifier, DialogueEngine, SpeechSynthesizer, Transcriber,
    VoiceError,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub struct FakeTranscriber {
    pub result: Result<String, String>,
    pub calls: AtomicUsize,
}

impl FakeTranscriber {
    pub fn ok(text: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: &[u8]) -> Result<String, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(VoiceError::Stt)
    }
}

pub struct FakeClassifier {
    pub result: Result<Completeness, String>,
    pub calls: AtomicUsize,
}

impl FakeClassifier {
    pub fn ok(label: Completeness) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(label),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl CompletenessClassifier for FakeClassifier {
    async fn classify(&self, _text: &str) -> Result<Completeness, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone().map_err(VoiceError::Classifier)
    }
}

/// Arguments the dialogue engine was called with.
#[derive(Debug, Clone)]
pub struct DialogueCall {
    pub text: String,
    pub session: SessionContext,
    pub history: History,
}

pub struct FakeDialogue {
    pub result: Result<DialogueTurn, String>,
    pub calls: Mutex<Vec<DialogueCall>>,
}

impl FakeDialogue {
    pub fn ok(turn: DialogueTurn) -> Arc<Self> {
        Arc::new(Self {
            result: Ok(turn),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            result: Err(message.to_string()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
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
        self.result.clone().map_err(VoiceError::Llm)
    }
}

/// Sets a flag when dropped, to observe abandoned synthesis.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// How the scripted synthesis stream ends after its chunks.
#[derive(Debug, Clone)]
pub enum Ending {
    Finish,
    Fail(String),
    Hang,
}

pub struct FakeSynthesizer {
    pub chunks: Vec<AudioChunk>,
    pub ending: Ending,
    pub start_error: Option<String>,
    pub calls: AtomicUsize,
    pub dropped: Arc<AtomicBool>,
}

impl FakeSynthesizer {
    pub fn new(chunks: Vec<AudioChunk>, ending: Ending) -> Arc<Self> {
        Arc::new(Self {
            chunks,
            ending,
            start_error: None,
            calls: AtomicUsize::new(0),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn pcm(parts: &[&[u8]], sample_rate: u32) -> Arc<Self> {
        Self::new(
            parts
                .iter()
                .map(|part| AudioChunk::new(part.to_vec(), sample_rate))
                .collect(),
            Ending::Finish,
        )
    }

    pub fn failing_to_start(message: &str) -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            ending: Ending::Finish,
            start_error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
            dropped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn was_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SpeechSynthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream, VoiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.start_error {
            return Err(VoiceError::Tts(message.clone()));
        }

        let flag = DropFlag(self.dropped.clone());
        let head = stream::iter(self.chunks.clone().into_iter().map(Ok));
        let tail: AudioStream = match self.ending.clone() {
            Ending::Finish => stream::empty().boxed(),
            Ending::Fail(message) => stream::iter([Err(VoiceError::Tts(message))]).boxed(),
            Ending::Hang => stream::pending().boxed(),
        };

        Ok(head
            .chain(tail)
            .map(move |item| {
                let _alive = &flag;
                item
            })
            .boxed())
    }
}

pub fn pipeline(
    transcriber: Arc<FakeTranscriber>,
    classifier: Arc<FakeClassifier>,
    dialogue: Arc<FakeDialogue>,
    synthesizer: Arc<FakeSynthesizer>,
) -> VoicePipeline {
    VoicePipeline::new(transcriber, classifier, dialogue, synthesizer)
}

pub fn next_step_turn() -> DialogueTurn {
    DialogueTurn::new("next_step", "면을 넣고 4분 끓이세요.", "next_step")
}

pub fn session(step_index: u32, total_steps: u32) -> SessionContext {
    SessionContext::new("물 550ml 끓이기", "라면", "1. 물 끓이기\n2. 면 넣기", step_index, total_steps)
        .unwrap()
}

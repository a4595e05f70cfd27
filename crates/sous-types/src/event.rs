//! Pipeline events and the values they carry.
//!
//! A pipeline run produces an ordered sequence of [`PipelineEvent`]s. Each
//! event serialises to one JSON object whose `type` field names the variant:
//!
//! | `type` | Fields |
//! |--------|--------|
//! | `stt` | `text` |
//! | `llm` | `intent`, `text`, `action`, optional `delay_seconds` |
//! | `tts_chunk` | `audio` (base64), `sample_rate` |
//! | `done` | |
//! | `error` | `message` |

use serde::{Deserialize, Serialize};

/// Intent labels produced by the dialogue engine.
pub mod intent {
    pub const NEXT_STEP: &str = "next_step";
    pub const PREV_STEP: &str = "prev_step";
    pub const FINISH: &str = "finish";
    pub const QUESTION: &str = "question";
    pub const UNKNOWN: &str = "unknown";
}

/// Action labels the client acts on.
pub mod action {
    pub const NONE: &str = "none";
    pub const NEXT_STEP: &str = "next_step";
    pub const PREV_STEP: &str = "prev_step";
    /// Leave cook mode without marking the recipe finished.
    pub const FINISH: &str = "finish";
    pub const END_COOKING: &str = "end_cooking";
    pub const BLOCKED: &str = "blocked";
}

/// One assistant turn as returned by the dialogue engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogueTurn {
    /// What the user wanted (see [`intent`]).
    pub intent: String,
    /// Reply to speak back.
    pub text: String,
    /// Directive for the client (see [`action`]).
    pub action: String,
    /// Seconds the client should wait before acting, when the action is deferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_seconds: Option<u32>,
}

impl DialogueTurn {
    pub fn new(
        intent: impl Into<String>,
        text: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            intent: intent.into(),
            text: text.into(),
            action: action.into(),
            delay_seconds: None,
        }
    }
}

/// A piece of synthesized speech in playback order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioChunk {
    /// Raw PCM bytes, base64 on the wire.
    #[serde(with = "base64_audio")]
    pub audio: Vec<u8>,
    /// Samples per second, constant within one run.
    pub sample_rate: u32,
}

impl AudioChunk {
    pub fn new(audio: Vec<u8>, sample_rate: u32) -> Self {
        Self { audio, sample_rate }
    }
}

/// The wire unit of the streaming endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// Recognized speech, emitted before the reply is generated.
    Stt { text: String },
    /// The assistant's reply and intent.
    Llm(DialogueTurn),
    /// One chunk of synthesized reply audio.
    TtsChunk(AudioChunk),
    /// The run finished successfully.
    Done,
    /// The run failed; no events follow.
    Error { message: String },
}

impl PipelineEvent {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Returns `true` for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Returns the wire discriminant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Stt { .. } => "stt",
            Self::Llm(_) => "llm",
            Self::TtsChunk(_) => "tts_chunk",
            Self::Done => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Serialises the event to its single-line JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

mod base64_audio {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded).map_err(serde::de::Error::custom)
    }
}

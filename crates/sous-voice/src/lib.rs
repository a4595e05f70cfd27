//! Voice collaborators for the sous assistant.
//!
//! The conversation pipeline talks to four external capabilities through
//! the traits defined here:
//!
//! | Trait | Backend in this crate |
//! |-------|-----------------------|
//! | [`Transcriber`] | [`SttService`], whisper.cpp as a subprocess |
//! | [`CompletenessClassifier`] | [`LlmCompletenessClassifier`] |
//! | [`DialogueEngine`] | [`LlmDialogueEngine`] |
//! | [`SpeechSynthesizer`] | [`TtsService`], piper as a subprocess |
//!
//! Both language-model backends share one [`LlmClient`] speaking the
//! OpenAI-compatible chat completions API. Every backend reports failures
//! as [`VoiceError`]; none of them retry.

pub mod classifier;
pub mod config;
pub mod dialogue;
pub mod error;
pub mod llm;
pub mod stt;
pub mod tts;

pub use classifier::{CompletenessClassifier, LlmCompletenessClassifier};
pub use config::{LlmConfig, SttConfig, TtsConfig};
pub use dialogue::{apply_step_guard, DialogueEngine, LlmDialogueEngine};
pub use error::VoiceError;
pub use llm::{ChatMessage, LlmClient};
pub use stt::{SttService, Transcriber};
pub use tts::{AudioStream, SpeechSynthesizer, TtsService};

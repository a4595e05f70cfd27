use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

fn default_stt_binary() -> PathBuf {
    PathBuf::from("whisper-cli")
}

fn default_stt_model() -> PathBuf {
    PathBuf::from("models/ggml-base.bin")
}

fn default_language() -> String {
    "ko".to_string()
}

fn default_stt_timeout_secs() -> u64 {
    120
}

fn default_tts_binary() -> PathBuf {
    PathBuf::from("piper")
}

fn default_tts_model() -> PathBuf {
    PathBuf::from("voices/ko_KR-default.onnx")
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_speed() -> f32 {
    1.0
}

fn default_chunk_bytes() -> usize {
    8192
}

fn default_tts_timeout_secs() -> u64 {
    60
}

fn default_llm_base_url() -> String {
    "http://127.0.0.1:11434/v1".to_string()
}

fn default_llm_model() -> String {
    "qwen2.5:7b-instruct".to_string()
}

fn default_dialogue_temperature() -> f32 {
    0.3
}

fn default_llm_timeout_secs() -> u64 {
    30
}

/// Speech recognition settings (whisper.cpp CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SttConfig {
    #[serde(default = "default_stt_binary")]
    pub binary_path: PathBuf,
    #[serde(default = "default_stt_model")]
    pub model_path: PathBuf,
    /// Spoken language passed to whisper (`-l`).
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_stt_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            binary_path: default_stt_binary(),
            model_path: default_stt_model(),
            language: default_language(),
            timeout_secs: default_stt_timeout_secs(),
        }
    }
}

/// Speech synthesis settings (piper CLI).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_tts_binary")]
    pub binary_path: PathBuf,
    #[serde(default = "default_tts_model")]
    pub model_path: PathBuf,
    /// Voice config JSON. Piper infers `<model>.json` when unset.
    #[serde(default)]
    pub config_path: Option<PathBuf>,
    /// Output sample rate of the configured voice, in Hz.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Speech speed multiplier (1.0 is normal).
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// Speaker ID within a multi-speaker model.
    #[serde(default)]
    pub speaker_id: Option<u32>,
    /// Upper bound on the size of one streamed audio chunk.
    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,
    /// Maximum wait for the next piece of audio.
    #[serde(default = "default_tts_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            binary_path: default_tts_binary(),
            model_path: default_tts_model(),
            config_path: None,
            sample_rate: default_sample_rate(),
            speed: default_speed(),
            speaker_id: None,
            chunk_bytes: default_chunk_bytes(),
            timeout_secs: default_tts_timeout_secs(),
        }
    }
}

/// Language model endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API, up to and including `/v1`.
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_dialogue_temperature")]
    pub dialogue_temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_llm_model(),
            dialogue_temperature: default_dialogue_temperature(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

impl fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("dialogue_temperature", &self.dialogue_temperature)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            ..Self::default()
        }
    }
}

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Completeness classifier error: {0}")]
    Classifier(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

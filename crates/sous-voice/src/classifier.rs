use crate::error::VoiceError;
use crate::llm::{ChatMessage, LlmClient};
use async_trait::async_trait;
use sous_types::Completeness;

const CLASSIFIER_PROMPT: &str = "\
You judge whether a transcribed Korean utterance from someone cooking is a \
finished request or question, or whether they stopped mid-sentence and will \
keep talking. Answer with exactly one word: COMPLETE or INCOMPLETE.";

/// Decides whether a transcript is a finished utterance.
#[async_trait]
pub trait CompletenessClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Completeness, VoiceError>;
}

/// Completeness classification by asking the language model.
#[derive(Debug, Clone)]
pub struct LlmCompletenessClassifier {
    client: LlmClient,
}

impl LlmCompletenessClassifier {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

/// Reads a COMPLETE/INCOMPLETE label out of free-form model output.
pub fn parse_label(raw: &str) -> Option<Completeness> {
    let upper = raw.trim().to_uppercase();
    // INCOMPLETE contains COMPLETE, so it has to be checked first.
    if upper.contains("INCOMPLETE") {
        Some(Completeness::Incomplete)
    } else if upper.contains("COMPLETE") {
        Some(Completeness::Complete)
    } else {
        None
    }
}

#[async_trait]
impl CompletenessClassifier for LlmCompletenessClassifier {
    async fn classify(&self, text: &str) -> Result<Completeness, VoiceError> {
        let messages = [ChatMessage::system(CLASSIFIER_PROMPT), ChatMessage::user(text)];
        let raw = self
            .client
            .complete(&messages, 0.0, false)
            .await
            .map_err(|e| VoiceError::Classifier(e.to_string()))?;

        parse_label(&raw).ok_or_else(|| {
            VoiceError::Classifier(format!("unexpected label from model: {:?}", raw.trim()))
        })
    }
}

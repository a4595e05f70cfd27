use crate::VoicePipeline;
use sous_types::{Completeness, TranscriptResult};
use std::time::Instant;

impl VoicePipeline {
    /// Transcribes `audio` and labels whether the utterance is finished.
    ///
    /// Failures from either collaborator are reported in the result's `error`
    /// field with empty text and [`Completeness::Incomplete`], so a caller
    /// chunking speech by voice activity simply keeps listening.
    pub async fn transcribe_and_analyze(&self, audio: &[u8]) -> TranscriptResult {
        let started = Instant::now();

        let text = match self.transcriber.transcribe(audio).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, bytes = audio.len(), "transcription failed, reporting INCOMPLETE");
                return TranscriptResult::degraded(e.to_string());
            }
        };

        // Nothing recognized yet; the speaker may still be starting.
        if text.trim().is_empty() {
            tracing::debug!("empty transcript, skipping completeness check");
            return TranscriptResult::new(String::new(), Completeness::Incomplete);
        }

        match self.classifier.classify(&text).await {
            Ok(completeness) => {
                tracing::debug!(
                    %completeness,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "analyzed utterance"
                );
                TranscriptResult::new(text, completeness)
            }
            Err(e) => {
                tracing::warn!(error = %e, "completeness check failed, reporting INCOMPLETE");
                TranscriptResult::degraded(e.to_string())
            }
        }
    }
}

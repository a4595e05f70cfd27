//! Conversation pipeline orchestration for the sous assistant.
//!
//! A [`VoicePipeline`] owns handles to the four voice collaborators and
//! offers the three entry points of a conversation turn:
//!
//! - [`VoicePipeline::transcribe_and_analyze`]: audio to text plus a
//!   completeness label, used to decide whether to keep listening. Never
//!   fails; collaborator errors degrade to an `INCOMPLETE` result.
//! - [`VoicePipeline::run_voice`]: audio → STT → dialogue → TTS, streamed
//!   as [`PipelineEvent`]s starting with `stt`.
//! - [`VoicePipeline::run_text`]: finalized text plus history → dialogue →
//!   TTS, streamed the same way without the `stt` event.
//!
//! Runs are pull driven: a stage only starts when the consumer asks for the
//! next event, so nothing is produced ahead of the transport. Dropping a run
//! abandons whatever collaborator call is in flight. [`EventEncoder`]
//! wraps a run for the wire: it enforces the single terminal event and
//! honours cancellation and deadlines.
//!
//! [`PipelineEvent`]: sous_types::PipelineEvent

mod analyze;
pub mod encoder;
mod run;

pub use encoder::EventEncoder;
pub use run::EventStream;

use sous_voice::{CompletenessClassifier, DialogueEngine, SpeechSynthesizer, Transcriber};
use std::fmt;
use std::sync::Arc;

/// Handles to the voice collaborators. Cheap to clone; holds no per-request
/// state.
#[derive(Clone)]
pub struct VoicePipeline {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn CompletenessClassifier>,
    dialogue: Arc<dyn DialogueEngine>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl VoicePipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn CompletenessClassifier>,
        dialogue: Arc<dyn DialogueEngine>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            transcriber,
            classifier,
            dialogue,
            synthesizer,
        }
    }
}

impl fmt::Debug for VoicePipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VoicePipeline").finish_non_exhaustive()
    }
}

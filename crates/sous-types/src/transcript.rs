//! Results of the analyze-before-committing check.

use serde::{Deserialize, Serialize};

/// Whether an utterance is a finished thought.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Completeness {
    /// The user finished speaking; commit the text.
    Complete,
    /// Keep listening and append what comes next.
    Incomplete,
}

impl Completeness {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Complete => "COMPLETE",
            Self::Incomplete => "INCOMPLETE",
        }
    }
}

impl std::fmt::Display for Completeness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transcribed text with its completeness label.
///
/// `error` is set only when the result was degraded after a collaborator
/// failure, in which case `text` is empty and `completeness` is
/// [`Completeness::Incomplete`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    pub completeness: Completeness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranscriptResult {
    pub fn new(text: impl Into<String>, completeness: Completeness) -> Self {
        Self {
            text: text.into(),
            completeness,
            error: None,
        }
    }

    /// Builds the keep-listening result reported after a failure.
    pub fn degraded(error: impl Into<String>) -> Self {
        Self {
            text: String::new(),
            completeness: Completeness::Incomplete,
            error: Some(error.into()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

//! Shared types for the sous voice assistant.
//!
//! This crate provides the request-scoped values that flow through a
//! conversation turn: the cooking session the user is in, the dialogue
//! history supplied by the client, and the pipeline event union that forms
//! the wire protocol of the streaming endpoints.
//!
//! Every other crate in the workspace depends on `sous-types` for these
//! definitions. It performs no I/O.

pub mod event;
pub mod transcript;

pub use event::{AudioChunk, DialogueTurn, PipelineEvent};
pub use transcript::{Completeness, TranscriptResult};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Speaker of a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person cooking.
    User,
    /// The assistant.
    Assistant,
}

impl Role {
    /// Returns the chat-completion role label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One prior utterance in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Conversation history in chronological order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History(Vec<HistoryEntry>);

impl History {
    pub fn new(entries: Vec<HistoryEntry>) -> Self {
        Self(entries)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Parses client-supplied history JSON without ever failing.
    ///
    /// Anything that is not a JSON array yields an empty history. Array
    /// elements that are not `{role, content}` objects with a known role are
    /// skipped; the remaining entries keep their order.
    pub fn parse_lenient(raw: &str) -> Self {
        if raw.trim().is_empty() {
            return Self::empty();
        }

        let values: Vec<serde_json::Value> = match serde_json::from_str(raw) {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(error = %e, "malformed history payload, continuing without history");
                return Self::empty();
            }
        };

        let total = values.len();
        let entries: Vec<HistoryEntry> = values
            .into_iter()
            .filter_map(|value| serde_json::from_value(value).ok())
            .collect();

        if entries.len() < total {
            tracing::warn!(
                skipped = total - entries.len(),
                kept = entries.len(),
                "dropped history entries with unexpected shape"
            );
        }

        Self(entries)
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Error returned when session fields violate their invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSession {
    #[error("total_steps must be at least 1")]
    NoSteps,
}

/// Where the user is in the recipe for the current request.
///
/// Constructed once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Description of the step currently on screen.
    pub current_step: String,
    /// Title of the dish being cooked.
    pub current_cook: String,
    /// Full recipe text (ingredients and all steps).
    pub recipe_context: String,
    /// Zero-based index of the current step.
    pub step_index: u32,
    /// Number of steps in the recipe, at least 1.
    pub total_steps: u32,
}

impl SessionContext {
    pub fn new(
        current_step: impl Into<String>,
        current_cook: impl Into<String>,
        recipe_context: impl Into<String>,
        step_index: u32,
        total_steps: u32,
    ) -> Result<Self, InvalidSession> {
        if total_steps == 0 {
            return Err(InvalidSession::NoSteps);
        }
        Ok(Self {
            current_step: current_step.into(),
            current_cook: current_cook.into(),
            recipe_context: recipe_context.into(),
            step_index,
            total_steps,
        })
    }

    /// Returns `true` when the user is on the first step.
    pub fn is_first_step(&self) -> bool {
        self.step_index == 0
    }

    /// Returns `true` when the user is on (or past) the final step.
    pub fn is_last_step(&self) -> bool {
        self.step_index.saturating_add(1) >= self.total_steps
    }
}

impl Default for SessionContext {
    fn default() -> Self {
        Self {
            current_step: String::new(),
            current_cook: String::new(),
            recipe_context: String::new(),
            step_index: 0,
            total_steps: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_rejects_zero_steps() {
        let err = SessionContext::new("", "", "", 0, 0).unwrap_err();
        assert_eq!(err, InvalidSession::NoSteps);
    }

    #[test]
    fn session_step_position() {
        let first = SessionContext::new("boil water", "ramyeon", "", 0, 3).unwrap();
        assert!(first.is_first_step());
        assert!(!first.is_last_step());

        let last = SessionContext::new("serve", "ramyeon", "", 2, 3).unwrap();
        assert!(!last.is_first_step());
        assert!(last.is_last_step());

        let single = SessionContext::default();
        assert!(single.is_first_step());
        assert!(single.is_last_step());
    }

    #[test]
    fn history_parses_well_formed_json() {
        let history = History::parse_lenient(
            r#"[{"role":"user","content":"다음"},{"role":"assistant","content":"네"}]"#,
        );
        assert_eq!(
            history.entries(),
            &[HistoryEntry::user("다음"), HistoryEntry::assistant("네")]
        );
    }

    #[test]
    fn history_malformed_json_is_empty() {
        assert!(History::parse_lenient("[{not json").is_empty());
        assert!(History::parse_lenient(r#"{"role":"user"}"#).is_empty());
        assert!(History::parse_lenient("null").is_empty());
        assert!(History::parse_lenient("").is_empty());
    }

    #[test]
    fn history_skips_entries_with_unknown_shape() {
        let history = History::parse_lenient(
            r#"[{"role":"system","content":"x"},{"role":"user","content":"소금 얼마나?"},42]"#,
        );
        assert_eq!(history.entries(), &[HistoryEntry::user("소금 얼마나?")]);
    }
}

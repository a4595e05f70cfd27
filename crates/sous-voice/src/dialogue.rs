//! Turn generation: the assistant's reply, intent, and client action.

use crate::error::VoiceError;
use crate::llm::{ChatMessage, LlmClient};
use async_trait::async_trait;
use serde::Deserialize;
use sous_types::event::{action, intent};
use sous_types::{DialogueTurn, History, SessionContext};

const SYSTEM_PROMPT: &str = "\
You are a friendly sous-chef guiding someone through a recipe by voice. \
They are cooking with their hands busy, so reply in Korean with one or two \
short spoken sentences and no markdown.

Classify what they want as one intent:
- next_step: move on to the next step
- prev_step: go back to the previous step
- finish: they are done cooking
- question: anything else about the dish, ingredients, or technique
- unknown: not related to cooking

Answer with a JSON object only:
{\"intent\": \"<intent>\", \"text\": \"<reply to speak>\", \"action\": \"<action>\"}
where action is next_step, prev_step, finish, end_cooking, or none. Use \
finish when they want to stop cooking early. When the cook asks to move \
past the final step, use action end_cooking. With finish or end_cooking you \
may add \"delay_seconds\" with how long to wait before closing the session.";

/// Produces the assistant's turn for a user utterance.
#[async_trait]
pub trait DialogueEngine: Send + Sync {
    async fn respond(
        &self,
        text: &str,
        session: &SessionContext,
        history: &History,
    ) -> Result<DialogueTurn, VoiceError>;
}

/// Dialogue generation by prompting the language model for a JSON turn.
#[derive(Debug, Clone)]
pub struct LlmDialogueEngine {
    client: LlmClient,
}

impl LlmDialogueEngine {
    pub fn new(client: LlmClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DialogueEngine for LlmDialogueEngine {
    async fn respond(
        &self,
        text: &str,
        session: &SessionContext,
        history: &History,
    ) -> Result<DialogueTurn, VoiceError> {
        let messages = build_messages(text, session, history);
        let temperature = self.client.config().dialogue_temperature;
        let raw = self.client.complete(&messages, temperature, true).await?;

        let turn = parse_turn(&raw)?;
        Ok(apply_step_guard(turn, session))
    }
}

/// Describes where the cook is, for the system prompt.
fn session_brief(session: &SessionContext) -> String {
    let mut brief = format!(
        "Dish: {}\nCurrent step ({} of {}): {}",
        or_unknown(&session.current_cook),
        session.step_index.saturating_add(1),
        session.total_steps,
        or_unknown(&session.current_step),
    );
    if session.is_first_step() {
        brief.push_str("\nThis is the first step; there is no previous step.");
    }
    if session.is_last_step() {
        brief.push_str("\nThis is the final step.");
    }
    if !session.recipe_context.trim().is_empty() {
        brief.push_str("\n\nFull recipe:\n");
        brief.push_str(session.recipe_context.trim());
    }
    brief
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() {
        "(unknown)"
    } else {
        value
    }
}

pub(crate) fn build_messages(
    text: &str,
    session: &SessionContext,
    history: &History,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(format!(
        "{}\n\n{}",
        SYSTEM_PROMPT,
        session_brief(session)
    )));
    messages.extend(
        history
            .entries()
            .iter()
            .map(|entry| ChatMessage::new(entry.role.as_str(), entry.content.clone())),
    );
    messages.push(ChatMessage::user(text));
    messages
}

#[derive(Debug, Deserialize)]
struct RawTurn {
    #[serde(default)]
    intent: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    action: String,
    #[serde(default)]
    delay_seconds: Option<u32>,
}

/// Parses the model's JSON answer, tolerating a surrounding code fence.
pub(crate) fn parse_turn(raw: &str) -> Result<DialogueTurn, VoiceError> {
    let body = strip_code_fence(raw);
    let parsed: RawTurn = serde_json::from_str(body)
        .map_err(|e| VoiceError::Llm(format!("invalid dialogue response: {}", e)))?;

    let intent = match parsed.intent.trim() {
        "" => intent::UNKNOWN.to_string(),
        other => other.to_string(),
    };
    let action = match parsed.action.trim() {
        "" => action::NONE.to_string(),
        other => other.to_string(),
    };

    Ok(DialogueTurn {
        intent,
        text: parsed.text.trim().to_string(),
        action,
        delay_seconds: parsed.delay_seconds,
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    match trimmed.strip_prefix("```") {
        Some(rest) => {
            let rest = rest.strip_prefix("json").unwrap_or(rest);
            rest.strip_suffix("```").unwrap_or(rest).trim()
        }
        None => trimmed,
    }
}

/// Keeps step navigation within the recipe.
///
/// Moving forward from the final step becomes `end_cooking`; moving back from
/// the first step is `blocked`. A `finish` intent without an action gets the
/// `finish` action so the client leaves cook mode.
pub fn apply_step_guard(mut turn: DialogueTurn, session: &SessionContext) -> DialogueTurn {
    match turn.intent.as_str() {
        intent::NEXT_STEP if session.is_last_step() => {
            turn.action = action::END_COOKING.to_string();
        }
        intent::PREV_STEP if session.is_first_step() => {
            turn.action = action::BLOCKED.to_string();
            turn.delay_seconds = None;
        }
        intent::NEXT_STEP | intent::PREV_STEP if turn.action == action::NONE => {
            turn.action = turn.intent.clone();
        }
        intent::FINISH if turn.action == action::NONE => {
            turn.action = action::FINISH.to_string();
        }
        _ => {}
    }
    turn
}

//! Wire encoding for pipeline runs.
//!
//! The encoder sits between a run and the transport. It pulls one event at a
//! time, so the run never gets ahead of what the client has been sent, and it
//! owns the stream's closing rules:
//!
//! - events pass through in emission order;
//! - the stream ends right after the first `done` or `error`;
//! - a run that ends without a terminal event gets an `error` appended;
//! - cancellation or an elapsed deadline ends the stream immediately with
//!   nothing further sent, dropping the run and any collaborator call it has
//!   in flight.

use futures_util::future;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use sous_types::PipelineEvent;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Sent when a run stops producing events without reporting how it ended.
pub const MISSING_TERMINAL_MESSAGE: &str = "pipeline ended without a terminal event";

/// Payload used if an event cannot be serialised.
const ENCODE_FAILURE_RECORD: &str =
    r#"{"type":"error","message":"failed to encode pipeline event"}"#;

/// Frames pipeline events for a streaming response.
#[derive(Debug, Clone, Default)]
pub struct EventEncoder {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl EventEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ends the stream when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Ends the stream once `timeout` has elapsed from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Applies the closing rules to `events`.
    pub fn guard<S>(self, events: S) -> BoxStream<'static, PipelineEvent>
    where
        S: Stream<Item = PipelineEvent> + Send + 'static,
    {
        let state = Guard {
            events: events.boxed(),
            cancel: self.cancel,
            deadline: self.deadline,
            finished: false,
        };
        stream::unfold(state, Guard::next).boxed()
    }

    /// Applies the closing rules and serialises each event to its JSON record
    /// body, one record per event.
    pub fn encode<S>(self, events: S) -> BoxStream<'static, String>
    where
        S: Stream<Item = PipelineEvent> + Send + 'static,
    {
        self.guard(events)
            .scan(false, |failed, event| {
                if *failed {
                    return future::ready(None);
                }
                let record = match event.to_json() {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::error!(kind = event.kind(), "failed to serialize pipeline event: {}", e);
                        *failed = true;
                        ENCODE_FAILURE_RECORD.to_string()
                    }
                };
                future::ready(Some(record))
            })
            .boxed()
    }
}

struct Guard {
    events: BoxStream<'static, PipelineEvent>,
    cancel: CancellationToken,
    deadline: Option<Instant>,
    finished: bool,
}

impl Guard {
    async fn next(mut self) -> Option<(PipelineEvent, Self)> {
        if self.finished {
            return None;
        }

        let next = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::debug!("pipeline run cancelled, closing stream");
                return None;
            }
            () = deadline_reached(self.deadline) => {
                tracing::warn!("pipeline run deadline elapsed, closing stream");
                return None;
            }
            event = self.events.next() => event,
        };

        match next {
            Some(event) => {
                self.finished = event.is_terminal();
                Some((event, self))
            }
            None => {
                tracing::error!("{}", MISSING_TERMINAL_MESSAGE);
                self.finished = true;
                Some((PipelineEvent::error(MISSING_TERMINAL_MESSAGE), self))
            }
        }
    }
}

async fn deadline_reached(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

//! Tool Stream Adapter
//!
//! Re-tags model-side [`StreamEvent`]s as caller-facing [`StreamMessage`]s,
//! one at a time and in arrival order. Text-only streams go through the same
//! path; they simply never carry tool events.

use crate::logging::StreamMetric;
use crate::model::EventStream;
use crate::types::*;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub const STREAM_ENDED_EARLY: &str = "model stream ended before completion";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    Completed,
    Failed(String),
    /// The caller went away or cancelled; nothing more was forwarded.
    Cancelled,
}

pub struct ToolStreamAdapter {
    tx: mpsc::Sender<StreamMessage>,
    cancel: CancellationToken,
}

impl ToolStreamAdapter {
    pub fn new(tx: mpsc::Sender<StreamMessage>, cancel: CancellationToken) -> Self {
        Self { tx, cancel }
    }

    pub fn to_message(event: &StreamEvent) -> StreamMessage {
        match event {
            StreamEvent::PartialText(text) => StreamMessage::AiResponse { data: text.clone() },
            StreamEvent::ToolCallRequested {
                id,
                name,
                arguments,
            } => StreamMessage::ToolRequest {
                id: id.clone(),
                name: name.clone(),
                arguments: arguments.clone(),
            },
            StreamEvent::ToolCallCompleted { id, name, result } => StreamMessage::ToolExecuted {
                id: id.clone(),
                name: name.clone(),
                result: result.clone(),
            },
            StreamEvent::Completed => StreamMessage::Done,
            StreamEvent::Failed(message) => StreamMessage::Error {
                message: message.clone(),
            },
        }
    }

    /// Pumps `upstream` into the caller channel until a terminal event, the
    /// end of the upstream, or cancellation. `on_event` sees every event
    /// before it is forwarded. The upstream is dropped on return, which
    /// cancels the underlying request.
    pub async fn forward<F>(&self, mut upstream: EventStream, mut on_event: F) -> StreamOutcome
    where
        F: FnMut(&StreamEvent) + Send,
    {
        let mut metric = StreamMetric::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                event = upstream.next() => Some(event),
            };

            let event = match next {
                None => {
                    metric.log_summary("CANCELLED");
                    return StreamOutcome::Cancelled;
                }
                Some(Some(event)) => event,
                Some(None) => {
                    tracing::warn!("[☁️  -> ⚙️ ] {}", STREAM_ENDED_EARLY);
                    StreamEvent::Failed(STREAM_ENDED_EARLY.to_string())
                }
            };

            metric.record(&event);
            on_event(&event);

            let outcome = match &event {
                StreamEvent::Completed => Some(StreamOutcome::Completed),
                StreamEvent::Failed(msg) => Some(StreamOutcome::Failed(msg.clone())),
                _ => None,
            };

            if !self.send(Self::to_message(&event)).await {
                metric.log_summary("DISCONNECTED");
                return StreamOutcome::Cancelled;
            }

            if let Some(outcome) = outcome {
                metric.log_summary(match outcome {
                    StreamOutcome::Completed => "COMPLETED",
                    _ => "FAILED",
                });
                return outcome;
            }
        }
    }

    async fn send(&self, message: StreamMessage) -> bool {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(message) => match sent {
                Ok(()) => true,
                Err(_) => {
                    tracing::debug!("[⚙️ ] Caller dropped the stream, stopping forwarding");
                    self.cancel.cancel();
                    false
                }
            },
        }
    }
}

//! Event relay between a running agent invocation and its async consumer
//!
//! The invocation runs on its own task and pushes tagged events into a
//! bounded channel; the consumer pulls them as an async sequence. A full
//! channel suspends the producer instead of growing memory, and dropping or
//! cancelling the consumer stops the producer relaying at its next emission
//! point. Sender drop is the close signal: once the producing task finishes,
//! the consumer drains whatever is still queued and then terminates.

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Default bound for the relay channel
pub const EVENT_BUFFER: usize = 256;

/// One tagged event from a running agent invocation, in producer order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A chunk of model output text
    Token { data: String },
    /// A tool is about to run
    ToolStart { tool: String, tool_input: Value },
}

/// Create a connected sink/stream pair
pub fn event_channel(capacity: usize) -> (EventSink, EventStream) {
    let (tx, rx) = mpsc::channel(capacity);
    let cancel = CancellationToken::new();
    (
        EventSink {
            tx,
            cancel: cancel.clone(),
        },
        EventStream { rx, cancel },
    )
}

/// Producer half, held by the invocation task
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<AgentEvent>,
    cancel: CancellationToken,
}

impl EventSink {
    /// Relay one event. Returns false once the consumer has cancelled or
    /// dropped the stream - the producer should stop relaying then.
    pub async fn emit(&self, event: AgentEvent) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(event) => sent.is_ok(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Consumer half: an async sequence of events
pub struct EventStream {
    rx: mpsc::Receiver<AgentEvent>,
    cancel: CancellationToken,
}

impl EventStream {
    /// Next event in producer order; None once the producer has finished
    /// and the queue is drained.
    pub async fn next(&mut self) -> Option<AgentEvent> {
        self.rx.recv().await
    }

    /// Tell the producer to stop relaying. Events already queued remain
    /// readable until the channel drains.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        // A disconnected consumer must not leave the producer emitting
        self.cancel.cancel();
    }
}

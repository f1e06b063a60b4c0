//! Event Sinks
//!
//! Engine-side implementations of the `EventSink` contract from
//! `drafthorse-core`. Publishing never blocks the research loop: the channel
//! sink drops events when the consumer lags, and the tracing sink only logs.

use drafthorse_core::{EventSink, ResearchEvent};
use tokio::sync::mpsc;

/// Sink that forwards events over a bounded channel.
///
/// Built with [`ChannelSink::bounded`], which also returns the receiving end.
/// When the channel is full the event is dropped; a slow consumer must never
/// stall research.
pub struct ChannelSink {
    tx: mpsc::Sender<ResearchEvent>,
}

impl ChannelSink {
    /// Create a sink and its receiver with the given capacity.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<ResearchEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: ResearchEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::debug!("dropping research event: {}", e);
        }
    }
}

/// Sink that logs every event through `tracing`.
///
/// Used by the CLI so progress shows up in the log stream without a
/// dedicated consumer task.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: ResearchEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "drafthorse::events", "{}", json),
            Err(e) => tracing::warn!("unserializable research event: {}", e),
        }
    }
}

//! Host pipeline collaborator

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::warn;

use crate::types::CanonicalMessage;
use crate::{BeatsError, Result};

/// An event that was received but not forwarded.
#[derive(Debug)]
pub struct RejectedEvent {
    /// Sequence number of the data frame that carried the event
    pub sequence: Option<u32>,
    pub error: BeatsError,
}

/// Receiver of normalized messages
///
/// The connection handler calls [`process`](Self::process) once per decode
/// cycle that produced messages, then [`reject`](Self::reject) for every event
/// it skipped. Acks for a cycle are written only after `process` returns
/// successfully.
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    /// Accept the messages produced by one decode cycle.
    ///
    /// An error here is fatal to the connection and no ack is written for
    /// the cycle.
    async fn process(&self, messages: Vec<CanonicalMessage>) -> Result<()>;

    /// Report an event that was skipped.
    async fn reject(&self, event: RejectedEvent) {
        warn!(
            sequence = ?event.sequence,
            category = event.error.category(),
            "Skipping event: {}",
            event.error
        );
    }
}

/// Sink that forwards messages into a bounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<CanonicalMessage>,
}

impl ChannelSink {
    /// Create a sink and the stream of messages it feeds.
    pub fn new(capacity: usize) -> (Self, ReceiverStream<CanonicalMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, ReceiverStream::new(rx))
    }
}

#[async_trait::async_trait]
impl MessageSink for ChannelSink {
    async fn process(&self, messages: Vec<CanonicalMessage>) -> Result<()> {
        for message in messages {
            self.tx
                .send(message)
                .await
                .map_err(|_| BeatsError::sink_error("message receiver dropped"))?;
        }
        Ok(())
    }
}

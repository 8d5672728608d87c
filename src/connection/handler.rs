//! Per-connection decode loop

use bytes::BytesMut;
use std::fmt;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::codec::{Decoder, Encoder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace};

use super::sink::{MessageSink, RejectedEvent};
use crate::codec::BeatsCodec;
use crate::protocol::{FrameDecoder, SequenceTracker};
use crate::types::{CanonicalMessage, Frame, RawMessage};
use crate::{BeatsConfig, BeatsError, Result};

/// Where a connection is in its frame cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionPhase {
    /// Buffer is empty, waiting for the next frame
    #[default]
    AwaitingFrame,
    /// Part of a frame is buffered
    DecodingPartialFrame,
    /// A complete frame was just decoded
    HaveFrame,
    /// No further frames are read, forwarded or acked
    Closed,
}

impl fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionPhase::AwaitingFrame => "awaiting-frame",
            ConnectionPhase::DecodingPartialFrame => "decoding-partial-frame",
            ConnectionPhase::HaveFrame => "have-frame",
            ConnectionPhase::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Mutable state owned by one connection.
#[derive(Debug)]
pub struct ConnectionState {
    /// Bytes received but not yet decoded into a frame
    buffer: BytesMut,
    decoder: FrameDecoder,
    tracker: SequenceTracker,
    phase: ConnectionPhase,
}

impl ConnectionState {
    pub fn new(config: &BeatsConfig) -> Self {
        Self {
            buffer: BytesMut::with_capacity(config.read_buffer_size),
            decoder: FrameDecoder::new(config),
            tracker: SequenceTracker::new(config.default_window_size),
            phase: ConnectionPhase::default(),
        }
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    /// Current window size budget.
    pub fn window_size(&self) -> u32 {
        self.tracker.window_size()
    }

    pub fn next_expected_sequence(&self) -> u32 {
        self.tracker.next_expected()
    }

    /// Number of bytes held for an incomplete frame.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub fn tracker(&self) -> &SequenceTracker {
        &self.tracker
    }
}

/// Everything produced by one pass over the buffered bytes.
#[derive(Debug, Default)]
pub struct DecodeCycle {
    /// Messages to forward, in frame order
    pub messages: Vec<CanonicalMessage>,
    /// Events that were received but skipped
    pub rejected: Vec<RejectedEvent>,
    /// Sequence numbers to acknowledge, in order
    pub acks: Vec<u32>,
    /// Connection-fatal error that ended the cycle
    pub termination: Option<BeatsError>,
}

impl DecodeCycle {
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.rejected.is_empty()
            && self.acks.is_empty()
            && self.termination.is_none()
    }
}

/// Counters reported when a connection closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    pub bytes_received: u64,
    pub frames: u64,
    pub messages: u64,
    pub rejected: u64,
    pub acks: u64,
    pub sequence_anomalies: u64,
}

/// Decodes, normalizes and acknowledges the events of one connection.
///
/// Handlers share nothing; run one per accepted connection.
#[derive(Debug)]
pub struct ConnectionHandler {
    peer: String,
    codec: BeatsCodec,
    state: ConnectionState,
    stats: ConnectionStats,
    read_buffer_size: usize,
}

impl ConnectionHandler {
    pub fn new(peer: impl Into<String>, config: &BeatsConfig) -> Self {
        Self {
            peer: peer.into(),
            codec: BeatsCodec::new(config),
            state: ConnectionState::new(config),
            stats: ConnectionStats::default(),
            read_buffer_size: config.read_buffer_size.max(1),
        }
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.state.phase
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats { sequence_anomalies: self.state.tracker.anomalies(), ..self.stats }
    }

    /// Append `bytes` and decode everything now complete.
    ///
    /// Never waits: a trailing partial frame stays buffered for the next call.
    /// Once every complete frame has been handled, outstanding events are acked.
    pub fn feed(&mut self, bytes: &[u8]) -> DecodeCycle {
        if self.state.phase == ConnectionPhase::Closed {
            return DecodeCycle {
                termination: Some(BeatsError::ConnectionClosed),
                ..DecodeCycle::default()
            };
        }
        self.stats.bytes_received += bytes.len() as u64;
        self.state.buffer.extend_from_slice(bytes);
        self.decode_buffered()
    }

    fn decode_buffered(&mut self) -> DecodeCycle {
        let mut cycle = DecodeCycle::default();

        loop {
            match self.state.decoder.decode(&mut self.state.buffer) {
                Ok(Some(frame)) => {
                    self.state.phase = ConnectionPhase::HaveFrame;
                    self.stats.frames += 1;
                    if let Err(e) = self.handle_frame(frame, &mut cycle) {
                        self.terminate(e, &mut cycle);
                        break;
                    }
                }
                Ok(None) => {
                    self.state.phase = if self.state.buffer.is_empty() {
                        ConnectionPhase::AwaitingFrame
                    } else {
                        ConnectionPhase::DecodingPartialFrame
                    };
                    if let Some(sequence) = self.state.tracker.flush() {
                        cycle.acks.push(sequence);
                    }
                    break;
                }
                Err(e) => {
                    self.terminate(e, &mut cycle);
                    break;
                }
            }
        }

        self.stats.messages += cycle.messages.len() as u64;
        self.stats.rejected += cycle.rejected.len() as u64;
        self.stats.acks += cycle.acks.len() as u64;
        cycle
    }

    fn handle_frame(&mut self, frame: Frame, cycle: &mut DecodeCycle) -> Result<()> {
        trace!(peer = %self.peer, "Frame: {}", frame);
        match frame {
            Frame::WindowSize { count } => {
                self.state.tracker.observe_window(count);
            }
            Frame::JsonData { sequence, payload } => {
                let raw = RawMessage::with_sequence(payload, sequence);
                match self.codec.decode_events(&raw) {
                    Ok(results) => {
                        for result in results {
                            match result {
                                Ok(message) => cycle.messages.push(message),
                                Err(error) => {
                                    cycle.rejected.push(RejectedEvent { sequence: Some(sequence), error })
                                }
                            }
                        }
                    }
                    Err(error) => cycle.rejected.push(RejectedEvent { sequence: Some(sequence), error }),
                }

                if let Some(ack) = self.state.tracker.observe(sequence) {
                    cycle.acks.push(ack);
                }
            }
            other => {
                return Err(BeatsError::protocol_error(
                    "connection",
                    format!("unexpected {:?} frame from peer", other.frame_type()),
                ));
            }
        }
        Ok(())
    }

    fn terminate(&mut self, error: BeatsError, cycle: &mut DecodeCycle) {
        error!(peer = %self.peer, "Closing connection: {}", error);
        self.close();
        cycle.termination = Some(error);
    }

    /// Stop handling the connection and release the frame buffer.
    pub fn close(&mut self) {
        if self.state.phase != ConnectionPhase::Closed {
            debug!(peer = %self.peer, "Connection closed with {} buffered bytes", self.state.buffer.len());
        }
        self.state.phase = ConnectionPhase::Closed;
        self.state.buffer = BytesMut::new();
    }

    /// Encode ack frames for `acks` into `dst`.
    pub fn encode_acks(&mut self, acks: &[u32], dst: &mut BytesMut) -> Result<()> {
        for &sequence in acks {
            self.state.decoder.encode(Frame::Ack { sequence }, dst)?;
        }
        Ok(())
    }

    /// Drive the connection until the peer disconnects, a fatal error occurs
    /// or `cancel` fires.
    ///
    /// Messages of each cycle are handed to `sink` before the cycle's acks are
    /// written, so an ack never covers an event the sink has not accepted.
    pub async fn run<IO, S>(
        mut self,
        mut io: IO,
        sink: &S,
        cancel: CancellationToken,
    ) -> Result<ConnectionStats>
    where
        IO: AsyncRead + AsyncWrite + Unpin,
        S: MessageSink + ?Sized,
    {
        info!(peer = %self.peer, "Connection opened");
        let mut out = BytesMut::new();

        let outcome = loop {
            self.state.buffer.reserve(self.read_buffer_size);
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(peer = %self.peer, "Connection cancelled");
                    break Ok(());
                }
                read = io.read_buf(&mut self.state.buffer) => read,
            };

            let read = match read {
                Ok(0) => {
                    debug!(peer = %self.peer, "Peer disconnected");
                    break Ok(());
                }
                Ok(n) => n,
                Err(e) => break Err(BeatsError::Io(e)),
            };
            self.stats.bytes_received += read as u64;

            let cycle = self.decode_buffered();
            if cancel.is_cancelled() {
                break Ok(());
            }
            if let Err(e) = self.deliver(cycle, &mut io, sink, &cancel, &mut out).await {
                break Err(e);
            }
        };

        self.close();
        let stats = self.stats();
        info!(
            peer = %self.peer,
            frames = stats.frames,
            messages = stats.messages,
            rejected = stats.rejected,
            acks = stats.acks,
            anomalies = stats.sequence_anomalies,
            "Connection finished"
        );
        outcome.map(|()| stats)
    }

    async fn deliver<IO, S>(
        &mut self,
        cycle: DecodeCycle,
        io: &mut IO,
        sink: &S,
        cancel: &CancellationToken,
        out: &mut BytesMut,
    ) -> Result<()>
    where
        IO: AsyncWrite + Unpin,
        S: MessageSink + ?Sized,
    {
        let DecodeCycle { messages, rejected, acks, termination } = cycle;

        if !messages.is_empty() {
            sink.process(messages).await?;
        }
        for event in rejected {
            sink.reject(event).await;
        }

        // Closed while the sink was busy: the cycle stays unacknowledged.
        if cancel.is_cancelled() {
            debug!(peer = %self.peer, "Cancelled before acking {:?}", acks.last());
            return Ok(());
        }

        if !acks.is_empty() {
            out.clear();
            self.encode_acks(&acks, out)?;
            io.write_all(&out[..]).await?;
            io.flush().await?;
            debug!(peer = %self.peer, "Acknowledged up to {:?}", acks.last());
        }

        termination.map_or(Ok(()), Err)
    }
}

//! Acknowledgement cadence for one connection

use tracing::{debug, warn};

/// Tracks received sequence numbers and decides when an ack is due.
///
/// An ack is due when the number of unacknowledged events reaches the current
/// window size, or when the caller reports that no more bytes are available
/// ([`flush`](Self::flush)). Acks always carry the highest sequence number seen
/// so far, so they never decrease and never exceed what was received.
#[derive(Debug, Clone)]
pub struct SequenceTracker {
    window_size: u32,
    highest_seen: Option<u32>,
    last_acked: Option<u32>,
    unacked: u32,
    anomalies: u64,
}

impl SequenceTracker {
    pub fn new(initial_window: u32) -> Self {
        Self {
            window_size: initial_window.max(1),
            highest_seen: None,
            last_acked: None,
            unacked: 0,
            anomalies: 0,
        }
    }

    /// Record a window-size advertisement.
    pub fn observe_window(&mut self, count: u32) {
        if count == 0 {
            warn!("Peer advertised a window size of 0, treating it as 1");
        }
        let count = count.max(1);
        if count != self.window_size {
            debug!("Window size changed: {} -> {}", self.window_size, count);
        }
        self.window_size = count;
    }

    /// Record a received data frame. Returns the sequence to ack if one is due.
    pub fn observe(&mut self, sequence: u32) -> Option<u32> {
        match self.highest_seen {
            Some(highest) if sequence <= highest => {
                self.anomalies += 1;
                warn!(
                    "Sequence regression: received {} after {}, acknowledging {}",
                    sequence, highest, highest
                );
            }
            Some(highest) if sequence > highest.saturating_add(1) => {
                self.anomalies += 1;
                warn!("Sequence gap: expected {}, received {}", highest + 1, sequence);
            }
            _ => {}
        }

        self.highest_seen = Some(self.highest_seen.map_or(sequence, |h| h.max(sequence)));
        self.unacked = self.unacked.saturating_add(1);

        if self.unacked >= self.window_size { self.take_ack() } else { None }
    }

    /// Ack everything outstanding, if anything is.
    pub fn flush(&mut self) -> Option<u32> {
        if self.unacked > 0 { self.take_ack() } else { None }
    }

    fn take_ack(&mut self) -> Option<u32> {
        let sequence = self.highest_seen?;
        self.unacked = 0;
        self.last_acked = Some(sequence);
        debug!("Ack due for sequence {}", sequence);
        Some(sequence)
    }

    /// Next sequence number expected from the peer.
    pub fn next_expected(&self) -> u32 {
        self.highest_seen.map_or(1, |h| h.saturating_add(1))
    }

    pub fn window_size(&self) -> u32 {
        self.window_size
    }

    /// Events received since the last ack.
    pub fn unacknowledged(&self) -> u32 {
        self.unacked
    }

    pub fn last_acked(&self) -> Option<u32> {
        self.last_acked
    }

    /// Number of gaps and regressions observed.
    pub fn anomalies(&self) -> u64 {
        self.anomalies
    }
}

impl Default for SequenceTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

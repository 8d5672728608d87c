//! Beats (Lumberjack) input: wire decoding and event normalization.
//!
//! Beats shippers send events over a framed, windowed and acknowledged TCP
//! protocol. This crate decodes that stream, acknowledges what it received and
//! turns each shipped JSON document into a schema-uniform
//! [`CanonicalMessage`], whichever beat family produced it.
//!
//! # Layout
//!
//! - [`protocol`]: frame decoding, decompression and ack cadence
//! - [`codec`]: beat family classification and normalization
//! - [`connection`]: per-connection driver and the host pipeline interface
//! - [`config`]: YAML configuration
//!
//! ## Example (normalizing a document)
//!
//! ```rust
//! use beats_input::Beats;
//!
//! let beats = Beats::default();
//! let document = serde_json::json!({
//!     "message": "TEST",
//!     "source": "/tmp/test.log",
//!     "beat": {"hostname": "example.local"},
//!     "@timestamp": "2016-04-01T00:00:00.000Z",
//! });
//!
//! let message = beats.codec().normalize(document.as_object().unwrap())?;
//! assert_eq!(message.facility(), "filebeat");
//! assert_eq!(message.source, "example.local");
//! # Ok::<(), beats_input::BeatsError>(())
//! ```

pub mod codec;
pub mod config;
pub mod connection;
mod error;
pub mod logging;
pub mod protocol;
#[cfg_attr(any(test, feature = "benchmark"), path = "test_utils.rs")]
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

pub use codec::{BeatsCodec, Codec};
pub use config::{BeatsConfig, load_config};
pub use connection::{
    ChannelSink, ConnectionHandler, ConnectionPhase, ConnectionStats, MessageSink, RejectedEvent,
};
pub use error::*;
pub use protocol::{FrameDecoder, SequenceTracker};
pub use types::{CanonicalMessage, Facility, Frame, RawEvent, RawMessage};

use std::path::Path;

/// Entry point holding one validated configuration.
///
/// Builds the per-connection handlers and the shared normalizer from the same
/// settings.
#[derive(Debug, Clone, Default)]
pub struct Beats {
    config: BeatsConfig,
}

impl Beats {
    pub fn new(config: BeatsConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Load the configuration from a YAML file.
    pub fn from_config_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self { config: load_config(path)? })
    }

    pub fn config(&self) -> &BeatsConfig {
        &self.config
    }

    /// Normalizer configured for this input.
    pub fn codec(&self) -> BeatsCodec {
        BeatsCodec::new(&self.config)
    }

    /// Fresh handler for a newly accepted connection.
    pub fn handler(&self, peer: impl Into<String>) -> ConnectionHandler {
        ConnectionHandler::new(peer, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_configuration_is_refused() {
        let config = BeatsConfig { max_frame_size: 0, ..BeatsConfig::default() };
        assert!(matches!(Beats::new(config), Err(BeatsError::Config { .. })));
    }

    #[test]
    fn handlers_do_not_share_state() {
        let beats = Beats::default();
        let mut first = beats.handler("a");
        let second = beats.handler("b");

        first.feed(b"2W\0\0\0\x05");
        assert_eq!(first.state().window_size(), 5);
        assert_eq!(second.state().window_size(), 1);
    }
}

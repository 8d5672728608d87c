//! Error types for Beats ingestion.
//!
//! Errors fall into two groups that drive very different handling:
//!
//! - **Connection-fatal**: malformed frame markers, nested compression, corrupt
//!   zlib streams, oversized length prefixes and I/O failures. Decoding stops and
//!   the connection is closed.
//! - **Per-event**: a JSON payload that does not parse, or a document the
//!   normalizer cannot turn into a [`CanonicalMessage`](crate::CanonicalMessage).
//!   The event is reported and skipped, the connection keeps going.
//!
//! ```rust
//! use beats_input::BeatsError;
//!
//! let error = BeatsError::protocol_error("frame header", "unknown frame type 0x5a");
//! assert!(error.is_connection_fatal());
//! assert_eq!(error.category(), "protocol");
//!
//! let error = BeatsError::normalization_error("document has no @timestamp");
//! assert!(!error.is_connection_fatal());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Beats operations.
pub type Result<T, E = BeatsError> = std::result::Result<T, E>;

/// Main error type for frame decoding, normalization and connection handling.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BeatsError {
    #[error("Protocol error in {context}: {details}")]
    Protocol { context: String, details: String },

    #[error("Failed to inflate compressed frame")]
    Decompression {
        #[source]
        source: std::io::Error,
    },

    #[error("Frame length {length} exceeds limit of {limit} bytes")]
    FrameTooLarge { length: usize, limit: usize },

    #[error("Event payload is not valid JSON (sequence {sequence:?})")]
    PayloadParse {
        /// Sequence number of the carrying frame, when known
        sequence: Option<u32>,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot normalize event: {reason}")]
    Normalization { reason: String },

    #[error("Invalid event timestamp '{value}': {details}")]
    Timestamp { value: String, details: String },

    #[error("Operation '{operation}' is not supported")]
    UnsupportedOperation { operation: String },

    #[error("Connection is closed")]
    ConnectionClosed,

    #[error("I/O error on connection")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration in {path}: {details}")]
    Config { path: PathBuf, details: String },

    #[error("Message sink failed: {reason}")]
    Sink { reason: String },
}

impl BeatsError {
    /// Returns whether this error terminates the connection it occurred on.
    pub fn is_connection_fatal(&self) -> bool {
        match self {
            BeatsError::Protocol { .. } => true,
            BeatsError::Decompression { .. } => true,
            BeatsError::FrameTooLarge { .. } => true,
            BeatsError::ConnectionClosed => true,
            BeatsError::Io(_) => true,
            BeatsError::Sink { .. } => true,
            BeatsError::PayloadParse { .. } => false,
            BeatsError::Normalization { .. } => false,
            BeatsError::Timestamp { .. } => false,
            BeatsError::UnsupportedOperation { .. } => false,
            BeatsError::Config { .. } => false,
        }
    }

    /// Short class name used when reporting the error to a host pipeline.
    pub fn category(&self) -> &'static str {
        match self {
            BeatsError::Protocol { .. }
            | BeatsError::Decompression { .. }
            | BeatsError::FrameTooLarge { .. } => "protocol",
            BeatsError::PayloadParse { .. } => "payload_parse",
            BeatsError::Normalization { .. } | BeatsError::Timestamp { .. } => "normalization",
            BeatsError::UnsupportedOperation { .. } => "unsupported_operation",
            BeatsError::ConnectionClosed | BeatsError::Io(_) => "connection",
            BeatsError::Config { .. } => "config",
            BeatsError::Sink { .. } => "sink",
        }
    }

    /// Helper constructor for protocol violations.
    pub fn protocol_error(context: impl Into<String>, details: impl Into<String>) -> Self {
        BeatsError::Protocol { context: context.into(), details: details.into() }
    }

    /// Helper constructor for normalization failures.
    pub fn normalization_error(reason: impl Into<String>) -> Self {
        BeatsError::Normalization { reason: reason.into() }
    }

    /// Helper constructor for timestamp failures.
    pub fn timestamp_error(value: impl Into<String>, details: impl Into<String>) -> Self {
        BeatsError::Timestamp { value: value.into(), details: details.into() }
    }

    /// Helper constructor for calls into unsupported entry points.
    pub fn unsupported_operation(operation: impl Into<String>) -> Self {
        BeatsError::UnsupportedOperation { operation: operation.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config_error(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        BeatsError::Config { path: path.into(), details: details.into() }
    }

    /// Helper constructor for sink failures.
    pub fn sink_error(reason: impl Into<String>) -> Self {
        BeatsError::Sink { reason: reason.into() }
    }
}

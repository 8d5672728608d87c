//! Event normalization.
//!
//! [`BeatsCodec`] turns decoded JSON documents into [`CanonicalMessage`]s.
//! Classification and extraction are pure: the same document always yields
//! the same message.
//!
//! ```rust
//! use beats_input::codec::{BeatsCodec, Codec};
//! use beats_input::types::RawMessage;
//! use beats_input::BeatsConfig;
//!
//! let codec = BeatsCodec::new(&BeatsConfig::default());
//! let raw = RawMessage::new(
//!     r#"{"message":"TEST","source":"/tmp/test.log","@timestamp":"2016-04-01T00:00:00.000Z"}"#,
//! );
//!
//! let messages = codec.decode_messages(&raw)?;
//! assert_eq!(messages[0].facility(), "filebeat");
//! assert!(codec.decode(&raw).is_err());
//! # Ok::<(), beats_input::BeatsError>(())
//! ```

mod classify;
mod extract;
mod flatten;
mod timestamp;

pub use classify::classify;
pub use flatten::{KEY_SEPARATOR, flatten, sanitize_key};
pub use timestamp::parse_timestamp;

use serde_json::Value;
use tracing::{trace, warn};

use crate::types::{CanonicalMessage, RawEvent, RawMessage};
use crate::{BeatsConfig, BeatsError, Result};

/// A payload decoder producing canonical messages.
pub trait Codec: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Single-message decode.
    fn decode(&self, raw: &RawMessage) -> Result<CanonicalMessage>;

    /// Decode every event carried by `raw`.
    fn decode_messages(&self, raw: &RawMessage) -> Result<Vec<CanonicalMessage>>;
}

/// Normalizer for documents shipped by the beats family of agents.
#[derive(Debug, Clone)]
pub struct BeatsCodec {
    prefix_fields: bool,
}

impl Default for BeatsCodec {
    fn default() -> Self {
        Self::new(&BeatsConfig::default())
    }
}

impl BeatsCodec {
    pub fn new(config: &BeatsConfig) -> Self {
        Self { prefix_fields: !config.no_beats_prefix }
    }

    /// Normalize one parsed document.
    pub fn normalize(&self, event: &RawEvent) -> Result<CanonicalMessage> {
        let mut event = event.clone();
        let metadata = event.remove("@metadata");
        let facility = classify(&event, metadata.as_ref());
        trace!(%facility, "Classified event");

        extract::extract(event, facility, self.prefix_fields)
    }

    /// Parse `raw` and normalize each event it holds.
    ///
    /// The outer error covers payloads that cannot be parsed at all. Each
    /// element of the inner list succeeds or fails on its own.
    pub fn decode_events(&self, raw: &RawMessage) -> Result<Vec<Result<CanonicalMessage>>> {
        let document: Value = serde_json::from_slice(&raw.payload).map_err(|source| {
            BeatsError::PayloadParse { sequence: raw.sequence, source }
        })?;

        Ok(match document {
            Value::Object(event) => vec![self.normalize(&event)],
            Value::Array(events) => events
                .into_iter()
                .map(|element| match element {
                    Value::Object(event) => self.normalize(&event),
                    other => Err(not_an_object(&other)),
                })
                .collect(),
            other => vec![Err(not_an_object(&other))],
        })
    }
}

fn not_an_object(value: &Value) -> BeatsError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    BeatsError::normalization_error(format!("event document is a JSON {kind}, not an object"))
}

impl Codec for BeatsCodec {
    fn name(&self) -> &'static str {
        "beats"
    }

    /// Always fails; one payload may carry several events, use
    /// [`decode_messages`](Codec::decode_messages).
    fn decode(&self, _raw: &RawMessage) -> Result<CanonicalMessage> {
        Err(BeatsError::unsupported_operation("decode"))
    }

    /// Decode every event, skipping failures after logging them.
    fn decode_messages(&self, raw: &RawMessage) -> Result<Vec<CanonicalMessage>> {
        let messages = self
            .decode_events(raw)?
            .into_iter()
            .filter_map(|result| match result {
                Ok(message) => Some(message),
                Err(error) => {
                    warn!(sequence = ?raw.sequence, %error, "Skipping event");
                    None
                }
            })
            .collect();
        Ok(messages)
    }
}

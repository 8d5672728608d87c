//! Core types shared by the decoder, the normalizer and the connection handler.
//!
//! - [`Frame`] is one unit of the Lumberjack wire protocol
//! - [`RawEvent`] is a decoded JSON document with no fixed schema
//! - [`CanonicalMessage`] is the normalized output handed to the host pipeline
//! - [`Facility`] names the beat family a message came from
//!
//! ## Usage Example
//!
//! ```rust
//! use beats_input::types::{CanonicalMessage, Facility, Frame};
//! use chrono::{TimeZone, Utc};
//!
//! let frame = Frame::json(1, &b"{\"message\":\"hello\"}"[..]);
//! assert_eq!(frame.sequence(), Some(1));
//!
//! let timestamp = Utc.with_ymd_and_hms(2016, 4, 1, 0, 0, 0).unwrap();
//! let message = CanonicalMessage::new("hello", None, timestamp, Facility::Generic);
//! assert_eq!(message.facility(), "genericbeat");
//! assert_eq!(message.source, "unknown");
//! ```

mod facility;
mod frame;
mod message;

pub use facility::Facility;
pub use frame::{Frame, FrameType, ProtocolVersion};
pub use message::{
    CanonicalMessage, FACILITY_FIELD, RawEvent, RawMessage, UNKNOWN_SOURCE,
};

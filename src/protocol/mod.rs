//! Lumberjack wire protocol.
//!
//! - [`FrameDecoder`] turns an append-only byte stream into frames and encodes
//!   outgoing acks
//! - [`Decompressor`] inflates compressed blocks
//! - [`SequenceTracker`] decides when an ack is due
//!
//! ```rust
//! use beats_input::protocol::{FrameDecoder, SequenceTracker};
//! use beats_input::types::Frame;
//! use bytes::BytesMut;
//!
//! let mut decoder = FrameDecoder::default();
//! let mut tracker = SequenceTracker::default();
//!
//! let mut buf = BytesMut::from(&b"2W\0\0\0\x012J\0\0\0\x01\0\0\0\x02{}"[..]);
//! for frame in decoder.decode_available(&mut buf)? {
//!     match frame {
//!         Frame::WindowSize { count } => tracker.observe_window(count),
//!         Frame::JsonData { sequence, .. } => assert_eq!(tracker.observe(sequence), Some(1)),
//!         _ => {}
//!     }
//! }
//! # Ok::<(), beats_input::BeatsError>(())
//! ```

mod compression;
mod decoder;
mod sequence;

pub use compression::{Decompressor, compress};
pub use decoder::{FrameDecoder, compress_frames};
pub use sequence::SequenceTracker;

//! Test utilities for building wire input and loading fixture documents
//!
//! Frame builders produce raw bytes exactly as a beats shipper would send
//! them, so tests and benches can feed the decoder without a live peer.

#![cfg(any(test, feature = "benchmark"))]

use bytes::BytesMut;
use std::path::{Path, PathBuf};
use tokio_util::codec::Encoder;

use crate::protocol::{FrameDecoder, compress};
use crate::types::{Frame, ProtocolVersion, RawEvent};

/// Compression level used by the frame builders.
pub const TEST_COMPRESSION_LEVEL: u32 = 6;

/// Error returned when a fixture cannot be located or parsed.
#[derive(Debug, Clone)]
pub struct FixtureError {
    message: String,
}

impl FixtureError {
    fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl std::fmt::Display for FixtureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FixtureError {}

/// `2W` window size frame.
pub fn window_frame(count: u32) -> Vec<u8> {
    let mut out = vec![ProtocolVersion::V2_BYTE, b'W'];
    out.extend_from_slice(&count.to_be_bytes());
    out
}

/// `2J` JSON data frame.
pub fn json_frame(sequence: u32, payload: impl AsRef<[u8]>) -> Vec<u8> {
    let payload = payload.as_ref();
    let mut out = vec![ProtocolVersion::V2_BYTE, b'J'];
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// `2C` frame wrapping already-encoded frames.
pub fn compressed_frame(inner: &[u8]) -> Vec<u8> {
    let payload = compress(inner, TEST_COMPRESSION_LEVEL).expect("compress test payload");
    let mut out = vec![ProtocolVersion::V2_BYTE, b'C'];
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(&payload);
    out
}

/// `1D` key/value data frame.
pub fn data_frame_v1(sequence: u32, pairs: &[(&str, &str)]) -> Vec<u8> {
    let mut out = vec![ProtocolVersion::V1_BYTE, b'D'];
    out.extend_from_slice(&sequence.to_be_bytes());
    out.extend_from_slice(&(pairs.len() as u32).to_be_bytes());
    for (key, value) in pairs {
        out.extend_from_slice(&(key.len() as u32).to_be_bytes());
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&(value.len() as u32).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    out
}

/// Encode frames with the crate's own encoder.
pub fn encode_frames(frames: &[Frame]) -> Vec<u8> {
    let mut encoder = FrameDecoder::default();
    let mut out = BytesMut::new();
    for frame in frames {
        encoder.encode(frame.clone(), &mut out).expect("encode test frame");
    }
    out.to_vec()
}

/// A window frame followed by one data frame per document, sequences from 1.
pub fn event_batch<S: AsRef<[u8]>>(documents: &[S]) -> Vec<u8> {
    let mut out = window_frame(documents.len() as u32);
    for (index, document) in documents.iter().enumerate() {
        out.extend(json_frame(index as u32 + 1, document));
    }
    out
}

/// Directory holding the JSON fixture documents.
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

/// Read a fixture document by file name.
pub fn load_fixture(name: &str) -> Result<String, FixtureError> {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path)
        .map_err(|e| FixtureError::new(format!("Missing fixture {}: {}", path.display(), e)))
}

/// Read and parse a fixture document as a single event.
pub fn load_fixture_event(name: &str) -> Result<RawEvent, FixtureError> {
    let text = load_fixture(name)?;
    serde_json::from_str(&text)
        .map_err(|e| FixtureError::new(format!("Fixture {name} is not a JSON object: {e}")))
}

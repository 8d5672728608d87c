//! Incremental Lumberjack frame decoder
//!
//! Frames are length-and-type prefixed with big-endian integers:
//!
//! ```text
//! W  window size   | ver | 'W' | count u32 |
//! J  json data     | ver | 'J' | seq u32 | len u32 | json bytes |
//! D  v1 key/value  | ver | 'D' | seq u32 | pairs u32 | (klen u32, key, vlen u32, value)* |
//! C  compressed    | ver | 'C' | len u32 | zlib bytes |
//! A  ack           | ver | 'A' | seq u32 |
//! ```
//!
//! The decoder works on a caller-owned [`BytesMut`] and only consumes bytes
//! once a whole frame is available, so reads may be split at any byte.
//! Compressed blocks are inflated and their nested frames are yielded in
//! order before the next outer frame.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace};

use super::compression::{Decompressor, compress};
use crate::config::BeatsConfig;
use crate::types::{Frame, FrameType, ProtocolVersion};
use crate::{BeatsError, Result};

/// Version byte plus frame type byte.
const HEADER_SIZE: usize = 2;

/// Outcome of parsing one frame from the front of a buffer.
enum Parsed {
    Frame(Frame),
    Compressed(Bytes),
}

/// Stateful frame decoder for one connection.
#[derive(Debug)]
pub struct FrameDecoder {
    max_frame_size: usize,
    decompressor: Decompressor,
    /// Frames inflated from a compressed block, not yet handed out
    pending: VecDeque<Frame>,
    /// Version of the most recent data frame, used for outgoing acks
    version: ProtocolVersion,
    /// Set after a protocol error; no further frames are produced
    terminated: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new(&BeatsConfig::default())
    }
}

impl FrameDecoder {
    pub fn new(config: &BeatsConfig) -> Self {
        Self {
            max_frame_size: config.max_frame_size,
            decompressor: Decompressor::new(config.max_decompressed_size),
            pending: VecDeque::new(),
            version: ProtocolVersion::default(),
            terminated: false,
        }
    }

    /// Protocol version of the most recently decoded data frame.
    pub fn version(&self) -> ProtocolVersion {
        self.version
    }

    /// Whether a protocol error has stopped this decoder.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Decode every complete frame currently in `src`.
    pub fn decode_available(&mut self, src: &mut BytesMut) -> Result<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(src)? {
            frames.push(frame);
        }
        Ok(frames)
    }

    fn decode_next(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(Some(frame));
            }

            let Some((parsed, consumed)) = self.parse_frame(src)? else {
                return Ok(None);
            };
            src.advance(consumed);

            match parsed {
                Parsed::Frame(frame) => return Ok(Some(frame)),
                Parsed::Compressed(payload) => self.expand(&payload)?,
            }
        }
    }

    /// Inflate a compressed block and queue the frames it contains.
    fn expand(&mut self, payload: &[u8]) -> Result<()> {
        let inflated = self.decompressor.decompress(payload)?;
        trace!("Inflated compressed frame: {} -> {} bytes", payload.len(), inflated.len());

        let mut rest = &inflated[..];
        while !rest.is_empty() {
            let Some((parsed, consumed)) = self.parse_frame(rest)? else {
                return Err(BeatsError::protocol_error(
                    "compressed frame",
                    format!("truncated frame in inflated block ({} trailing bytes)", rest.len()),
                ));
            };
            match parsed {
                Parsed::Frame(frame) => self.pending.push_back(frame),
                Parsed::Compressed(_) => {
                    return Err(BeatsError::protocol_error(
                        "compressed frame",
                        "compressed frame nested inside compressed frame",
                    ));
                }
            }
            rest = &rest[consumed..];
        }

        debug!("Compressed frame expanded into {} frames", self.pending.len());
        Ok(())
    }

    /// Parse one frame from the front of `buf` without consuming it.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a whole frame.
    fn parse_frame(&mut self, buf: &[u8]) -> Result<Option<(Parsed, usize)>> {
        if buf.len() < HEADER_SIZE {
            return Ok(None);
        }

        let version = ProtocolVersion::from_byte(buf[0]).ok_or_else(|| {
            BeatsError::protocol_error(
                "frame header",
                format!("unknown protocol version marker {:#04x}", buf[0]),
            )
        })?;
        let frame_type = FrameType::from_byte(buf[1]).ok_or_else(|| {
            BeatsError::protocol_error(
                "frame header",
                format!("unknown frame type marker {:#04x}", buf[1]),
            )
        })?;

        let body = &buf[HEADER_SIZE..];
        let parsed = match frame_type {
            FrameType::WindowSize => read_u32(body, 0)
                .map(|count| (Parsed::Frame(Frame::WindowSize { count }), 4)),
            FrameType::Json => self.parse_json(body)?,
            FrameType::Data => self.parse_key_values(body)?,
            FrameType::Compressed => self.parse_compressed(body)?,
            FrameType::Ack => {
                return Err(BeatsError::protocol_error(
                    "frame header",
                    "received an ack frame from the sender",
                ));
            }
        };

        Ok(parsed.map(|(parsed, consumed)| {
            if matches!(frame_type, FrameType::Json | FrameType::Data) {
                self.version = version;
            }
            (parsed, HEADER_SIZE + consumed)
        }))
    }

    fn parse_json(&self, body: &[u8]) -> Result<Option<(Parsed, usize)>> {
        let (Some(sequence), Some(length)) = (read_u32(body, 0), read_u32(body, 4)) else {
            return Ok(None);
        };
        let length = self.checked_length(length)?;
        let Some(payload) = body.get(8..8 + length) else {
            return Ok(None);
        };

        let frame = Frame::JsonData { sequence, payload: Bytes::copy_from_slice(payload) };
        Ok(Some((Parsed::Frame(frame), 8 + length)))
    }

    fn parse_compressed(&self, body: &[u8]) -> Result<Option<(Parsed, usize)>> {
        let Some(length) = read_u32(body, 0) else {
            return Ok(None);
        };
        let length = self.checked_length(length)?;
        let Some(payload) = body.get(4..4 + length) else {
            return Ok(None);
        };

        Ok(Some((Parsed::Compressed(Bytes::copy_from_slice(payload)), 4 + length)))
    }

    /// Version 1 data frames carry string pairs; they are re-encoded as a JSON object.
    fn parse_key_values(&self, body: &[u8]) -> Result<Option<(Parsed, usize)>> {
        let (Some(sequence), Some(pairs)) = (read_u32(body, 0), read_u32(body, 4)) else {
            return Ok(None);
        };
        // Each pair needs at least its two length prefixes.
        if (pairs as usize).saturating_mul(8) > self.max_frame_size {
            return Err(BeatsError::protocol_error(
                "data frame",
                format!("implausible key/value pair count {pairs}"),
            ));
        }

        let mut offset = 8;
        let mut document = Map::new();
        for _ in 0..pairs {
            let Some((key, next)) = self.read_string(body, offset)? else {
                return Ok(None);
            };
            let Some((value, next)) = self.read_string(body, next)? else {
                return Ok(None);
            };
            document.insert(key, Value::String(value));
            offset = next;
        }

        let payload = serde_json::to_vec(&Value::Object(document))
            .map_err(|e| BeatsError::protocol_error("data frame", e.to_string()))?;
        let frame = Frame::JsonData { sequence, payload: payload.into() };
        Ok(Some((Parsed::Frame(frame), offset)))
    }

    fn read_string(&self, body: &[u8], offset: usize) -> Result<Option<(String, usize)>> {
        let Some(length) = read_u32(body, offset) else {
            return Ok(None);
        };
        let length = self.checked_length(length)?;
        let start = offset + 4;
        let Some(bytes) = body.get(start..start + length) else {
            return Ok(None);
        };
        Ok(Some((String::from_utf8_lossy(bytes).into_owned(), start + length)))
    }

    fn checked_length(&self, length: u32) -> Result<usize> {
        let length = length as usize;
        if length > self.max_frame_size {
            return Err(BeatsError::FrameTooLarge { length, limit: self.max_frame_size });
        }
        Ok(length)
    }
}

fn read_u32(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset + 4)?;
    Some(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

impl Decoder for FrameDecoder {
    type Item = Frame;
    type Error = BeatsError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        if self.terminated {
            return Err(BeatsError::ConnectionClosed);
        }

        let result = self.decode_next(src);
        if let Err(e) = &result {
            debug!("Frame decoder terminated: {}", e);
            self.terminated = true;
            self.pending.clear();
        }
        result
    }
}

impl Encoder<Frame> for FrameDecoder {
    type Error = BeatsError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        dst.put_u8(self.version.as_byte());
        dst.put_u8(frame.frame_type().as_byte());
        match frame {
            Frame::WindowSize { count } => dst.put_u32(count),
            Frame::Ack { sequence } => dst.put_u32(sequence),
            Frame::JsonData { sequence, payload } => {
                dst.put_u32(sequence);
                dst.put_u32(encoded_length(payload.len())?);
                dst.extend_from_slice(&payload);
            }
            Frame::Compressed { payload } => {
                dst.put_u32(encoded_length(payload.len())?);
                dst.extend_from_slice(&payload);
            }
        }
        Ok(())
    }
}

fn encoded_length(length: usize) -> Result<u32> {
    u32::try_from(length)
        .map_err(|_| BeatsError::FrameTooLarge { length, limit: u32::MAX as usize })
}

/// Build a compressed frame wrapping `frames`.
pub fn compress_frames(frames: &[Frame], level: u32) -> Result<Frame> {
    let mut encoder = FrameDecoder::default();
    let mut plain = BytesMut::new();
    for frame in frames {
        encoder.encode(frame.clone(), &mut plain)?;
    }
    Ok(Frame::Compressed { payload: compress(&plain, level)?.into() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        compressed_frame, data_frame_v1, encode_frames, json_frame, window_frame,
    };
    use proptest::prelude::*;

    fn decoder() -> FrameDecoder {
        FrameDecoder::default()
    }

    #[test]
    fn decodes_window_and_json_frames() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&window_frame(2));
        buf.extend_from_slice(&json_frame(1, br#"{"message":"a"}"#));
        buf.extend_from_slice(&json_frame(2, br#"{"message":"b"}"#));

        let frames = decoder().decode_available(&mut buf).unwrap();
        assert_eq!(
            frames,
            vec![
                Frame::WindowSize { count: 2 },
                Frame::json(1, &br#"{"message":"a"}"#[..]),
                Frame::json(2, &br#"{"message":"b"}"#[..]),
            ]
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_frame_is_retained_until_complete() {
        let bytes = json_frame(7, br#"{"message":"split"}"#);
        let mut decoder = decoder();
        let mut buf = BytesMut::new();

        for (i, byte) in bytes.iter().enumerate() {
            buf.put_u8(*byte);
            let frame = decoder.decode(&mut buf).unwrap();
            if i + 1 < bytes.len() {
                assert!(frame.is_none(), "frame yielded early at byte {i}");
                assert_eq!(buf.len(), i + 1);
            } else {
                assert_eq!(frame, Some(Frame::json(7, &br#"{"message":"split"}"#[..])));
            }
        }
    }

    #[test]
    fn compressed_frames_expand_in_order() {
        let inner = [window_frame(2), json_frame(1, b"{}"), json_frame(2, b"[]")].concat();
        let mut buf = BytesMut::from(&compressed_frame(&inner)[..]);
        buf.extend_from_slice(&json_frame(3, b"{\"after\":true}"));

        let frames = decoder().decode_available(&mut buf).unwrap();
        let sequences: Vec<_> = frames.iter().filter_map(Frame::sequence).collect();
        assert_eq!(frames[0], Frame::WindowSize { count: 2 });
        assert_eq!(sequences, vec![1, 2, 3]);
    }

    #[test]
    fn nested_compression_is_a_protocol_error() {
        let nested = compressed_frame(&json_frame(1, b"{}"));
        let mut buf = BytesMut::from(&compressed_frame(&nested)[..]);

        let mut decoder = decoder();
        let result = decoder.decode(&mut buf);
        assert!(matches!(result, Err(BeatsError::Protocol { .. })));
        assert!(decoder.is_terminated());
    }

    #[test]
    fn corrupt_compressed_payload_terminates_decoder() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"2C");
        buf.put_u32(5);
        buf.extend_from_slice(b"junk!");
        buf.extend_from_slice(&json_frame(1, b"{}"));

        let mut decoder = decoder();
        assert!(matches!(decoder.decode(&mut buf), Err(BeatsError::Decompression { .. })));
        assert!(matches!(decoder.decode(&mut buf), Err(BeatsError::ConnectionClosed)));
    }

    #[test]
    fn truncated_frame_inside_compressed_block_is_rejected() {
        let inner = json_frame(1, br#"{"message":"cut"}"#);
        let mut buf = BytesMut::from(&compressed_frame(&inner[..inner.len() - 3])[..]);
        assert!(matches!(decoder().decode(&mut buf), Err(BeatsError::Protocol { .. })));
    }

    #[test]
    fn unknown_markers_are_protocol_errors() {
        let mut buf = BytesMut::from(&b"3W\0\0\0\x01"[..]);
        assert!(matches!(decoder().decode(&mut buf), Err(BeatsError::Protocol { .. })));

        let mut buf = BytesMut::from(&b"2Z\0\0\0\x01"[..]);
        assert!(matches!(decoder().decode(&mut buf), Err(BeatsError::Protocol { .. })));

        let mut buf = BytesMut::from(&b"2A\0\0\0\x01"[..]);
        assert!(matches!(decoder().decode(&mut buf), Err(BeatsError::Protocol { .. })));
    }

    #[test]
    fn garbage_length_prefix_is_rejected_before_buffering() {
        let config = BeatsConfig { max_frame_size: 1024, ..BeatsConfig::default() };
        let mut buf = BytesMut::new();
        buf.extend_from_slice(b"2J");
        buf.put_u32(1);
        buf.put_u32(u32::MAX);

        let result = FrameDecoder::new(&config).decode(&mut buf);
        assert!(matches!(result, Err(BeatsError::FrameTooLarge { limit: 1024, .. })));
    }

    #[test]
    fn v1_data_frames_become_json_documents() {
        let bytes = data_frame_v1(4, &[("line", "hello"), ("file", "/var/log/syslog")]);
        let mut buf = BytesMut::from(&bytes[..]);
        let mut decoder = decoder();

        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        let Frame::JsonData { sequence, payload } = frame else {
            panic!("expected a data frame");
        };
        let document: Value = serde_json::from_slice(&payload).unwrap();
        assert_eq!(sequence, 4);
        assert_eq!(document["line"], "hello");
        assert_eq!(document["file"], "/var/log/syslog");
        assert_eq!(decoder.version(), ProtocolVersion::V1);
    }

    #[test]
    fn encoder_writes_acks_with_last_seen_version() {
        let mut decoder = decoder();
        let mut buf = BytesMut::from(&data_frame_v1(1, &[("line", "x")])[..]);
        decoder.decode(&mut buf).unwrap();

        let mut out = BytesMut::new();
        decoder.encode(Frame::Ack { sequence: 258 }, &mut out).unwrap();
        assert_eq!(&out[..], b"1A\0\0\x01\x02");
    }

    #[test]
    fn compress_frames_roundtrips_through_decoder() {
        let frames = vec![Frame::WindowSize { count: 1 }, Frame::json(1, &b"{\"a\":1}"[..])];
        let compressed = compress_frames(&frames, 6).unwrap();
        let mut buf = BytesMut::from(&encode_frames(&[compressed])[..]);
        assert_eq!(decoder().decode_available(&mut buf).unwrap(), frames);
    }

    proptest! {
        #[test]
        fn prop_chunking_does_not_change_decoded_frames(
            payloads in prop::collection::vec("[a-z]{0,40}", 1..8),
            chunk in 1usize..17,
        ) {
            let mut stream = window_frame(payloads.len() as u32);
            for (i, text) in payloads.iter().enumerate() {
                stream.extend_from_slice(&json_frame(i as u32 + 1, text.as_bytes()));
            }

            let mut whole = BytesMut::from(&stream[..]);
            let expected = decoder().decode_available(&mut whole).unwrap();

            let mut decoder = decoder();
            let mut buf = BytesMut::new();
            let mut actual = Vec::new();
            for piece in stream.chunks(chunk) {
                buf.extend_from_slice(piece);
                actual.extend(decoder.decode_available(&mut buf).unwrap());
            }

            prop_assert_eq!(actual, expected);
            prop_assert!(buf.is_empty());
        }

        #[test]
        fn prop_compression_is_transparent(
            payloads in prop::collection::vec("[a-zA-Z0-9 ]{0,64}", 1..10),
        ) {
            let mut plain = window_frame(payloads.len() as u32);
            for (i, text) in payloads.iter().enumerate() {
                plain.extend_from_slice(&json_frame(i as u32 + 1, text.as_bytes()));
            }

            let mut uncompressed = BytesMut::from(&plain[..]);
            let mut compressed = BytesMut::from(&compressed_frame(&plain)[..]);

            prop_assert_eq!(
                decoder().decode_available(&mut uncompressed).unwrap(),
                decoder().decode_available(&mut compressed).unwrap()
            );
        }
    }
}

//! Wire frame types for the Lumberjack protocol

use bytes::Bytes;
use std::fmt;

/// Protocol version marker, the first byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ProtocolVersion {
    /// Lumberjack v1 (`'1'`), key/value data frames.
    V1,
    /// Lumberjack v2 (`'2'`), JSON data frames.
    #[default]
    V2,
}

impl ProtocolVersion {
    pub const V1_BYTE: u8 = b'1';
    pub const V2_BYTE: u8 = b'2';

    /// Parse a version marker byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::V1_BYTE => Some(ProtocolVersion::V1),
            Self::V2_BYTE => Some(ProtocolVersion::V2),
            _ => None,
        }
    }

    /// Marker byte written on the wire.
    pub fn as_byte(self) -> u8 {
        match self {
            ProtocolVersion::V1 => Self::V1_BYTE,
            ProtocolVersion::V2 => Self::V2_BYTE,
        }
    }
}

/// Frame type marker, the second byte of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameType {
    WindowSize,
    Json,
    Data,
    Compressed,
    Ack,
}

impl FrameType {
    pub const WINDOW_SIZE: u8 = b'W';
    pub const JSON: u8 = b'J';
    pub const DATA: u8 = b'D';
    pub const COMPRESSED: u8 = b'C';
    pub const ACK: u8 = b'A';

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            Self::WINDOW_SIZE => Some(FrameType::WindowSize),
            Self::JSON => Some(FrameType::Json),
            Self::DATA => Some(FrameType::Data),
            Self::COMPRESSED => Some(FrameType::Compressed),
            Self::ACK => Some(FrameType::Ack),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            FrameType::WindowSize => Self::WINDOW_SIZE,
            FrameType::Json => Self::JSON,
            FrameType::Data => Self::DATA,
            FrameType::Compressed => Self::COMPRESSED,
            FrameType::Ack => Self::ACK,
        }
    }
}

/// One discrete unit of the wire protocol.
///
/// The decoder never yields [`Frame::Compressed`]: compressed blocks are
/// inflated and their nested frames are yielded in place. Version 1 key/value
/// data frames are converted to [`Frame::JsonData`] with an equivalent JSON
/// object payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Number of events the sender transmits before expecting an ack.
    WindowSize { count: u32 },
    /// One event document.
    JsonData { sequence: u32, payload: Bytes },
    /// zlib-compressed block of further frames.
    Compressed { payload: Bytes },
    /// Acknowledgement up to and including `sequence`. Only ever sent.
    Ack { sequence: u32 },
}

impl Frame {
    /// Wire type marker for this frame.
    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::WindowSize { .. } => FrameType::WindowSize,
            Frame::JsonData { .. } => FrameType::Json,
            Frame::Compressed { .. } => FrameType::Compressed,
            Frame::Ack { .. } => FrameType::Ack,
        }
    }

    /// Sequence number carried by data and ack frames.
    pub fn sequence(&self) -> Option<u32> {
        match self {
            Frame::JsonData { sequence, .. } | Frame::Ack { sequence } => Some(*sequence),
            Frame::WindowSize { .. } | Frame::Compressed { .. } => None,
        }
    }

    /// Convenience constructor for JSON data frames.
    pub fn json(sequence: u32, payload: impl Into<Bytes>) -> Self {
        Frame::JsonData { sequence, payload: payload.into() }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::WindowSize { count } => write!(f, "WindowSize({count})"),
            Frame::JsonData { sequence, payload } => {
                write!(f, "JsonData(seq={sequence}, {} bytes)", payload.len())
            }
            Frame::Compressed { payload } => write!(f, "Compressed({} bytes)", payload.len()),
            Frame::Ack { sequence } => write!(f, "Ack({sequence})"),
        }
    }
}

// ABOUTME: pK wire format — fixed 8-byte frame header, aligned payload fields
// ABOUTME: Separates the header/framing rules from the per-message payload layouts in frame.rs

use crate::message_type::MessageType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Upper bound on a frame's declared length, guarding against unbounded
/// allocation from a hostile or corrupt length field.
pub const MAX_PAYLOAD_SIZE: u32 = 65536; // 64KiB

pub const PROTOCOL_VERSION: u8 = 1;

/// pK frame header (8 bytes, big-endian): `version | header_length |
/// type | reserved | length`. `length` counts the entire frame,
/// header included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: u8,
    pub header_length: u8,
    pub message_type: u8,
    pub length: u32,
}

impl FrameHeader {
    pub const SIZE: usize = 8;

    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let version = buf.get_u8();
        let header_length = buf.get_u8();
        let message_type = buf.get_u8();
        let _reserved = buf.get_u8();
        let length = buf.get_u32();

        if version != PROTOCOL_VERSION {
            return Err(CodecError::UnsupportedVersion(version));
        }
        if header_length as usize != Self::SIZE {
            return Err(CodecError::BadHeaderLength(header_length));
        }
        if length < Self::SIZE as u32 {
            return Err(CodecError::TruncatedLength {
                declared: length,
                min: Self::SIZE as u32,
            });
        }
        if length > MAX_PAYLOAD_SIZE {
            return Err(CodecError::PayloadTooLarge {
                declared: length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(FrameHeader {
            version,
            header_length,
            message_type,
            length,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(self.version);
        buf.put_u8(self.header_length);
        buf.put_u8(self.message_type);
        buf.put_u8(0); // reserved
        buf.put_u32(self.length);
    }

    pub fn new(message_type: MessageType) -> Self {
        FrameHeader {
            version: PROTOCOL_VERSION,
            header_length: Self::SIZE as u8,
            message_type: message_type as u8,
            length: 0, // patched after the payload is encoded
        }
    }
}

/// Pad `buf` with zero bytes until its length is a multiple of `align`.
/// Since the header is exactly 8 bytes, offsets relative to the start
/// of the payload and offsets relative to the start of the frame agree
/// for every alignment this protocol uses (1, 2, 4, 8).
pub fn pad_for_encode(buf: &mut BytesMut, align: usize) {
    let rem = buf.len() % align;
    if rem != 0 {
        buf.put_bytes(0, align - rem);
    }
}

/// Skip the zero padding a decoder expects at the cursor's current
/// position for a field aligned to `align`.
pub fn pad_for_decode(buf: &mut Cursor<&[u8]>, align: usize) -> Result<(), CodecError> {
    let rem = buf.position() as usize % align;
    if rem != 0 {
        let skip = align - rem;
        if buf.remaining() < skip {
            return Err(CodecError::Incomplete);
        }
        buf.advance(skip);
    }
    Ok(())
}

/// Trait for payload types that can be written to the wire.
pub trait Encodable {
    /// Encode the payload (header excluded) into `buf`.
    fn encode(&self, buf: &mut BytesMut);

    fn message_type(&self) -> MessageType;

    /// Encode header + payload and patch in the final `length`.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        FrameHeader::new(self.message_type()).encode(&mut buf);
        self.encode(&mut buf);

        let length = buf.len() as u32;
        buf[4..8].copy_from_slice(&length.to_be_bytes());

        buf.freeze()
    }
}

/// Trait for payload types that can be parsed from the wire, given an
/// already-decoded header.
pub trait Decodable: Sized {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError>;

    fn message_type() -> MessageType;

    fn validate_header(header: &FrameHeader) -> Result<(), CodecError> {
        let expected = Self::message_type() as u8;
        if header.message_type != expected {
            return Err(CodecError::UnexpectedMessageType {
                expected,
                actual: header.message_type,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    /// Not a real error — signals "buffer the bytes and try again after
    /// the next read" to callers driving the incremental decode loop.
    #[error("incomplete frame: need more data")]
    Incomplete,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("bad header length: {0} (expected 8)")]
    BadHeaderLength(u8),

    #[error("frame length {declared} shorter than header ({min})")]
    TruncatedLength { declared: u32, min: u32 },

    #[error("frame length {declared} exceeds maximum {max}")]
    PayloadTooLarge { declared: u32, max: u32 },

    #[error("frame declares length {frame_length} but its payload fields need at least {required} bytes")]
    MalformedPayload { frame_length: u32, required: u32 },

    #[error("unknown message type: {0}")]
    UnknownMessageType(u8),

    #[error("unexpected message type: expected {expected}, got {actual}")]
    UnexpectedMessageType { expected: u8, actual: u8 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips() {
        let header = FrameHeader {
            version: 1,
            header_length: 8,
            message_type: MessageType::SendMessage as u8,
            length: 42,
        };

        let mut buf = BytesMut::new();
        header.encode(&mut buf);

        let mut cursor = Cursor::new(buf.as_ref());
        let decoded = FrameHeader::decode(&mut cursor).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn rejects_wrong_version() {
        let mut buf = BytesMut::new();
        buf.put_u8(9);
        buf.put_u8(8);
        buf.put_u8(MessageType::Reboot as u8);
        buf.put_u8(0);
        buf.put_u32(8);

        let mut cursor = Cursor::new(buf.as_ref());
        assert!(matches!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_short_length() {
        let mut buf = BytesMut::new();
        buf.put_u8(1);
        buf.put_u8(8);
        buf.put_u8(MessageType::Reboot as u8);
        buf.put_u8(0);
        buf.put_u32(4);

        let mut cursor = Cursor::new(buf.as_ref());
        assert!(matches!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::TruncatedLength { declared: 4, min: 8 })
        ));
    }

    #[test]
    fn incomplete_does_not_consume() {
        let buf = [1u8, 8, 5, 0, 0, 0]; // only 6 of 8 header bytes
        let mut cursor = Cursor::new(&buf[..]);
        assert!(matches!(
            FrameHeader::decode(&mut cursor),
            Err(CodecError::Incomplete)
        ));
        assert_eq!(cursor.position(), 0);
    }

    #[test]
    fn padding_round_trips_through_alignment() {
        let mut buf = BytesMut::new();
        buf.put_u8(1); // odd length so far
        pad_for_encode(&mut buf, 8);
        assert_eq!(buf.len(), 8);

        let mut cursor = Cursor::new(buf.as_ref());
        cursor.advance(1);
        pad_for_decode(&mut cursor, 8).unwrap();
        assert_eq!(cursor.position(), 8);
    }
}

// ABOUTME: pK message catalogue — payload layouts, Frame enum, closed-match dispatch
// ABOUTME: One struct per wire message type, each implementing Encodable/Decodable directly

use crate::codec::{pad_for_decode, pad_for_encode, CodecError, Decodable, Encodable, FrameHeader};
use crate::message_type::MessageType;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPortRequest {
    pub request_id: u32,
    pub requested_port: u64,
}

impl Encodable for OpenPortRequest {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        pad_for_encode(buf, 8);
        buf.put_u64(self.requested_port);
    }

    fn message_type(&self) -> MessageType {
        MessageType::OpenPortRequest
    }
}

impl Decodable for OpenPortRequest {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        if buf.remaining() < 4 {
            return Err(CodecError::Incomplete);
        }
        let request_id = buf.get_u32();
        pad_for_decode(buf, 8)?;
        if buf.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let requested_port = buf.get_u64();
        Ok(OpenPortRequest {
            request_id,
            requested_port,
        })
    }

    fn message_type() -> MessageType {
        MessageType::OpenPortRequest
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenPortResponse {
    pub request_id: u32,
    pub result: u8,
    pub port: u64,
}

impl Encodable for OpenPortResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u8(self.result);
        pad_for_encode(buf, 8);
        buf.put_u64(self.port);
    }

    fn message_type(&self) -> MessageType {
        MessageType::OpenPortResponse
    }
}

impl Decodable for OpenPortResponse {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        if buf.remaining() < 5 {
            return Err(CodecError::Incomplete);
        }
        let request_id = buf.get_u32();
        let result = buf.get_u8();
        pad_for_decode(buf, 8)?;
        if buf.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let port = buf.get_u64();
        Ok(OpenPortResponse {
            request_id,
            result,
            port,
        })
    }

    fn message_type() -> MessageType {
        MessageType::OpenPortResponse
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePortRequest {
    pub request_id: u32,
    pub port: u64,
}

impl Encodable for ClosePortRequest {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        pad_for_encode(buf, 8);
        buf.put_u64(self.port);
    }

    fn message_type(&self) -> MessageType {
        MessageType::ClosePortRequest
    }
}

impl Decodable for ClosePortRequest {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        if buf.remaining() < 4 {
            return Err(CodecError::Incomplete);
        }
        let request_id = buf.get_u32();
        pad_for_decode(buf, 8)?;
        if buf.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let port = buf.get_u64();
        Ok(ClosePortRequest { request_id, port })
    }

    fn message_type() -> MessageType {
        MessageType::ClosePortRequest
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosePortResponse {
    pub request_id: u32,
    pub result: u8,
    pub port: u64,
}

impl Encodable for ClosePortResponse {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.request_id);
        buf.put_u8(self.result);
        pad_for_encode(buf, 8);
        buf.put_u64(self.port);
    }

    fn message_type(&self) -> MessageType {
        MessageType::ClosePortResponse
    }
}

impl Decodable for ClosePortResponse {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        if buf.remaining() < 5 {
            return Err(CodecError::Incomplete);
        }
        let request_id = buf.get_u32();
        let result = buf.get_u8();
        pad_for_decode(buf, 8)?;
        if buf.remaining() < 8 {
            return Err(CodecError::Incomplete);
        }
        let port = buf.get_u64();
        Ok(ClosePortResponse {
            request_id,
            result,
            port,
        })
    }

    fn message_type() -> MessageType {
        MessageType::ClosePortResponse
    }
}

/// Shared by `SendMessage` and `DeliverMessage`: they have identical
/// payload layouts and differ only in direction and message type code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendMessage {
    pub source: u64,
    pub destination: u64,
    pub payload: Bytes,
}

impl Encodable for SendMessage {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.source);
        buf.put_u64(self.destination);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        pad_for_encode(buf, 4);
    }

    fn message_type(&self) -> MessageType {
        MessageType::SendMessage
    }
}

impl Decodable for SendMessage {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        decode_message_payload(&header, buf).map(|(source, destination, payload)| SendMessage {
            source,
            destination,
            payload,
        })
    }

    fn message_type() -> MessageType {
        MessageType::SendMessage
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliverMessage {
    pub source: u64,
    pub destination: u64,
    pub payload: Bytes,
}

impl Encodable for DeliverMessage {
    fn encode(&self, buf: &mut BytesMut) {
        buf.put_u64(self.source);
        buf.put_u64(self.destination);
        buf.put_u32(self.payload.len() as u32);
        buf.put_slice(&self.payload);
        pad_for_encode(buf, 4);
    }

    fn message_type(&self) -> MessageType {
        MessageType::DeliverMessage
    }
}

impl Decodable for DeliverMessage {
    fn decode(header: FrameHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        decode_message_payload(&header, buf).map(|(source, destination, payload)| {
            DeliverMessage {
                source,
                destination,
                payload,
            }
        })
    }

    fn message_type() -> MessageType {
        MessageType::DeliverMessage
    }
}

/// Decodes the `source`/`destination`/`payload` fields shared by
/// `SendMessage` and `DeliverMessage`. By the time this runs, `buf`
/// already holds the entire frame `decode_frame` sliced out for us
/// (see its `frame_len`-gated `Cursor::new` call), so a shortfall here
/// is never "wait for more bytes" — it means the frame's own
/// `header.length` is too small for the fields it claims to carry.
/// That is a malformed frame, not an incomplete stream, and must be
/// reported as such so the caller disconnects instead of stalling.
fn decode_message_payload(
    header: &FrameHeader,
    buf: &mut Cursor<&[u8]>,
) -> Result<(u64, u64, Bytes), CodecError> {
    const FIXED_FIELDS: u32 = 20; // source(8) + destination(8) + payload_length(4)

    if buf.remaining() < FIXED_FIELDS as usize {
        return Err(CodecError::MalformedPayload {
            frame_length: header.length,
            required: FrameHeader::SIZE as u32 + FIXED_FIELDS,
        });
    }
    let source = buf.get_u64();
    let destination = buf.get_u64();
    let payload_length = buf.get_u32();

    if buf.remaining() < payload_length as usize {
        let required = (FrameHeader::SIZE as u32)
            .saturating_add(FIXED_FIELDS)
            .saturating_add(payload_length);
        return Err(CodecError::MalformedPayload {
            frame_length: header.length,
            required,
        });
    }
    let payload = buf.copy_to_bytes(payload_length as usize);
    let _ = pad_for_decode(buf, 4);
    Ok((source, destination, payload))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Reboot;

impl Encodable for Reboot {
    fn encode(&self, _buf: &mut BytesMut) {}

    fn message_type(&self) -> MessageType {
        MessageType::Reboot
    }
}

impl Decodable for Reboot {
    fn decode(header: FrameHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        Ok(Reboot)
    }

    fn message_type() -> MessageType {
        MessageType::Reboot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shutdown;

impl Encodable for Shutdown {
    fn encode(&self, _buf: &mut BytesMut) {}

    fn message_type(&self) -> MessageType {
        MessageType::Shutdown
    }
}

impl Decodable for Shutdown {
    fn decode(header: FrameHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Self::validate_header(&header)?;
        Ok(Shutdown)
    }

    fn message_type() -> MessageType {
        MessageType::Shutdown
    }
}

/// Closed catalogue of every frame this core understands. Dispatch is
/// a plain match on `header.message_type`, not a reflective registry —
/// the catalogue is small and fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    OpenPortRequest(OpenPortRequest),
    OpenPortResponse(OpenPortResponse),
    ClosePortRequest(ClosePortRequest),
    ClosePortResponse(ClosePortResponse),
    SendMessage(SendMessage),
    DeliverMessage(DeliverMessage),
    Reboot(Reboot),
    Shutdown(Shutdown),
}

impl Frame {
    pub fn message_type(&self) -> MessageType {
        match self {
            Frame::OpenPortRequest(_) => MessageType::OpenPortRequest,
            Frame::OpenPortResponse(_) => MessageType::OpenPortResponse,
            Frame::ClosePortRequest(_) => MessageType::ClosePortRequest,
            Frame::ClosePortResponse(_) => MessageType::ClosePortResponse,
            Frame::SendMessage(_) => MessageType::SendMessage,
            Frame::DeliverMessage(_) => MessageType::DeliverMessage,
            Frame::Reboot(_) => MessageType::Reboot,
            Frame::Shutdown(_) => MessageType::Shutdown,
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match self {
            Frame::OpenPortRequest(m) => m.to_bytes(),
            Frame::OpenPortResponse(m) => m.to_bytes(),
            Frame::ClosePortRequest(m) => m.to_bytes(),
            Frame::ClosePortResponse(m) => m.to_bytes(),
            Frame::SendMessage(m) => m.to_bytes(),
            Frame::DeliverMessage(m) => m.to_bytes(),
            Frame::Reboot(m) => m.to_bytes(),
            Frame::Shutdown(m) => m.to_bytes(),
        }
    }
}

/// Attempt to decode exactly one frame from the head of `buf`.
///
/// Returns `Ok((frame, consumed))` on success, `Err(CodecError::Incomplete)`
/// if `buf` doesn't yet hold a full frame (the caller must not advance
/// its buffer in this case — more bytes are needed), or a malformed-
/// frame error for anything else. Never consumes input on `Incomplete`.
pub fn decode_frame(buf: &[u8]) -> Result<(Frame, usize), CodecError> {
    if buf.len() < FrameHeader::SIZE {
        return Err(CodecError::Incomplete);
    }

    let mut peek = Cursor::new(buf);
    let header = FrameHeader::decode(&mut peek)?;

    let frame_len = header.length as usize;
    if buf.len() < frame_len {
        return Err(CodecError::Incomplete);
    }

    let mut cursor = Cursor::new(&buf[..frame_len]);
    cursor.set_position(FrameHeader::SIZE as u64);

    let frame = match MessageType::try_from(header.message_type) {
        Ok(MessageType::OpenPortRequest) => {
            Frame::OpenPortRequest(OpenPortRequest::decode(header, &mut cursor)?)
        }
        Ok(MessageType::OpenPortResponse) => {
            Frame::OpenPortResponse(OpenPortResponse::decode(header, &mut cursor)?)
        }
        Ok(MessageType::ClosePortRequest) => {
            Frame::ClosePortRequest(ClosePortRequest::decode(header, &mut cursor)?)
        }
        Ok(MessageType::ClosePortResponse) => {
            Frame::ClosePortResponse(ClosePortResponse::decode(header, &mut cursor)?)
        }
        Ok(MessageType::SendMessage) => Frame::SendMessage(SendMessage::decode(header, &mut cursor)?),
        Ok(MessageType::DeliverMessage) => {
            Frame::DeliverMessage(DeliverMessage::decode(header, &mut cursor)?)
        }
        Ok(MessageType::Reboot) => Frame::Reboot(Reboot::decode(header, &mut cursor)?),
        Ok(MessageType::Shutdown) => Frame::Shutdown(Shutdown::decode(header, &mut cursor)?),
        Err(_) => return Err(CodecError::UnknownMessageType(header.message_type)),
    };

    Ok((frame, frame_len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_port_request_round_trips() {
        let original = OpenPortRequest {
            request_id: 7,
            requested_port: 0,
        };
        let bytes = original.to_bytes();
        let (frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(frame, Frame::OpenPortRequest(original));
    }

    #[test]
    fn open_port_response_round_trips() {
        let original = OpenPortResponse {
            request_id: 7,
            result: 0,
            port: 20000,
        };
        let bytes = original.to_bytes();
        let (frame, _) = decode_frame(&bytes).unwrap();
        assert_eq!(frame, Frame::OpenPortResponse(original));
    }

    #[test]
    fn send_message_round_trips_with_odd_payload_length() {
        let original = SendMessage {
            source: 1,
            destination: 2,
            payload: Bytes::from_static(b"ping"),
        };
        let bytes = original.to_bytes();
        let (frame, consumed) = decode_frame(&bytes).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(frame, Frame::SendMessage(original));

        // frame length must land on a 4-byte boundary because of payload padding
        assert_eq!(bytes.len() % 4, 0);
    }

    #[test]
    fn send_message_round_trips_with_unaligned_payload() {
        let original = SendMessage {
            source: 1,
            destination: 2,
            payload: Bytes::from_static(b"abc"), // 3 bytes, needs 1 byte padding
        };
        let bytes = original.to_bytes();
        let (frame, _) = decode_frame(&bytes).unwrap();
        assert_eq!(frame, Frame::SendMessage(original));
    }

    #[test]
    fn reboot_and_shutdown_have_no_payload() {
        let bytes = Reboot.to_bytes();
        assert_eq!(bytes.len(), FrameHeader::SIZE);
        let (frame, _) = decode_frame(&bytes).unwrap();
        assert_eq!(frame, Frame::Reboot(Reboot));

        let bytes = Shutdown.to_bytes();
        let (frame, _) = decode_frame(&bytes).unwrap();
        assert_eq!(frame, Frame::Shutdown(Shutdown));
    }

    #[test]
    fn incomplete_frame_reports_incomplete_without_consuming() {
        let original = OpenPortRequest {
            request_id: 1,
            requested_port: 99,
        };
        let bytes = original.to_bytes();
        for cut in 0..bytes.len() {
            let result = decode_frame(&bytes[..cut]);
            assert!(matches!(result, Err(CodecError::Incomplete)));
        }
    }

    #[test]
    fn unknown_message_type_is_malformed_not_incomplete() {
        let mut buf = BytesMut::new();
        FrameHeader {
            version: 1,
            header_length: 8,
            message_type: 200,
            length: 8,
        }
        .encode(&mut buf);

        let result = decode_frame(&buf);
        assert!(matches!(result, Err(CodecError::UnknownMessageType(200))));
    }

    #[test]
    fn inconsistent_payload_length_is_malformed_not_incomplete() {
        // header.length claims a complete 28-byte frame (header + the
        // three fixed fields, zero payload bytes) but the embedded
        // payload_length field lies and claims 1000 bytes of payload
        // that were never sent. A hostile client can set this field to
        // anything since it's an unvalidated u32 independent of
        // header.length.
        let mut buf = BytesMut::new();
        FrameHeader {
            version: 1,
            header_length: 8,
            message_type: MessageType::SendMessage as u8,
            length: 28,
        }
        .encode(&mut buf);
        buf.put_u64(10); // source
        buf.put_u64(20); // destination
        buf.put_u32(1000); // payload_length — inconsistent with header.length

        let result = decode_frame(&buf);
        assert!(matches!(result, Err(CodecError::MalformedPayload { .. })));
    }

    #[test]
    fn stream_split_at_every_offset_still_decodes_one_frame() {
        let original = SendMessage {
            source: 10,
            destination: 20,
            payload: Bytes::from_static(b"hello world, this is a test payload"),
        };
        let full = original.to_bytes();

        // Simulate arbitrary recv() segmentation: try feeding the frame
        // byte-by-byte and confirm it only ever completes once the full
        // frame is present, then matches.
        let mut assembled = Vec::new();
        let mut decoded = None;
        for &byte in full.iter() {
            assembled.push(byte);
            match decode_frame(&assembled) {
                Ok((frame, consumed)) => {
                    decoded = Some((frame, consumed));
                    break;
                }
                Err(CodecError::Incomplete) => continue,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        let (frame, consumed) = decoded.expect("frame should decode once complete");
        assert_eq!(consumed, full.len());
        assert_eq!(frame, Frame::SendMessage(original));
    }
}

//! Binary frame format.
//!
//! Frame layout (12 bytes header + payload):
//!
//! ```text
//! +--------+---------+--------+-------------+
//! | magic  | version | flags  | payload_len |
//! | 4 bytes| 2 bytes |2 bytes |   4 bytes   |
//! +--------+---------+--------+-------------+
//! | payload                                 |
//! | payload_len bytes                       |
//! +-----------------------------------------+
//! ```
//!
//! All integers are big-endian.

use crate::error::ProtocolError;
use crate::MAX_PAYLOAD_SIZE;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Magic bytes identifying frames: "PLCX"
pub const MAGIC: [u8; 4] = *b"PLCX";

/// Size of the fixed frame header in bytes (4+2+2+4 = 12).
pub const FRAME_HEADER_SIZE: usize = 12;

/// Frame flags bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameFlags(u16);

impl FrameFlags {
    /// Frame travels from the device to the client.
    pub const RESPONSE: u16 = 1 << 0;

    /// Valid flags mask for protocol version 1.
    const VALID_V1_MASK: u16 = 0x0001;

    pub fn new() -> Self {
        Self(0)
    }

    pub fn with_response(mut self) -> Self {
        self.0 |= Self::RESPONSE;
        self
    }

    pub fn is_response(&self) -> bool {
        self.0 & Self::RESPONSE != 0
    }

    pub fn bits(&self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Result<Self, ProtocolError> {
        if bits & !Self::VALID_V1_MASK != 0 {
            return Err(ProtocolError::InvalidFlags(bits));
        }
        Ok(Self(bits))
    }
}

/// A parsed frame.
#[derive(Debug, Clone)]
pub struct Frame {
    pub version: u16,
    pub flags: FrameFlags,
    pub payload: Bytes,
}

impl Frame {
    /// Creates a new request frame with the given payload.
    pub fn new(payload: Bytes) -> Self {
        Self {
            version: crate::PROTOCOL_VERSION,
            flags: FrameFlags::new(),
            payload,
        }
    }

    /// Creates a new response frame with the given payload.
    pub fn response(payload: Bytes) -> Self {
        Self {
            flags: FrameFlags::new().with_response(),
            ..Self::new(payload)
        }
    }

    /// Creates a new frame from a JSON-serializable value.
    pub fn from_json<T: serde::Serialize>(value: &T) -> Result<Self, ProtocolError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(Bytes::from(payload)))
    }

    /// Encodes the frame into bytes.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let payload_len = checked_payload_len(self.payload.len())?;

        let mut buf = BytesMut::with_capacity(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&MAGIC);
        buf.put_u16(self.version);
        buf.put_u16(self.flags.bits());
        buf.put_u32(payload_len);
        buf.put_slice(&self.payload);

        Ok(buf)
    }

    /// Returns the total length of the frame at the start of `buf`.
    ///
    /// Returns `Ok(None)` while the header is incomplete. The header is
    /// validated but nothing is consumed.
    pub fn peek_len(buf: &[u8]) -> Result<Option<usize>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }

        let magic: [u8; 4] = [buf[0], buf[1], buf[2], buf[3]];
        if magic != MAGIC {
            return Err(ProtocolError::InvalidMagic(magic));
        }

        let version = u16::from_be_bytes([buf[4], buf[5]]);
        if version != crate::PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion(version));
        }

        FrameFlags::from_bits(u16::from_be_bytes([buf[6], buf[7]]))?;

        let payload_len = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(Some(FRAME_HEADER_SIZE + payload_len as usize))
    }

    /// Decodes a frame from bytes.
    ///
    /// Returns `Ok(Some(frame))` if a complete frame was decoded,
    /// `Ok(None)` if more data is needed, or `Err` on protocol errors.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        let total_len = match Self::peek_len(buf)? {
            Some(len) => len,
            None => return Ok(None),
        };
        if buf.len() < total_len {
            return Ok(None);
        }

        let version = u16::from_be_bytes([buf[4], buf[5]]);
        let flags = FrameFlags::from_bits(u16::from_be_bytes([buf[6], buf[7]]))?;

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(total_len - FRAME_HEADER_SIZE).freeze();

        Ok(Some(Self {
            version,
            flags,
            payload,
        }))
    }

    /// Decodes exactly one frame from a complete buffer.
    pub fn decode_exact(data: &[u8]) -> Result<Self, ProtocolError> {
        let mut buf = BytesMut::from(data);
        match Self::decode(&mut buf)? {
            Some(frame) if buf.is_empty() => Ok(frame),
            Some(_) => Err(ProtocolError::TrailingBytes(buf.len())),
            None => {
                let needed = Self::peek_len(data)?
                    .map(|len| len - data.len())
                    .unwrap_or(FRAME_HEADER_SIZE - data.len());
                Err(ProtocolError::IncompleteFrame { needed })
            }
        }
    }
}

/// Payload length as carried in the header, rejecting oversized payloads.
fn checked_payload_len(len: usize) -> Result<u32, ProtocolError> {
    match u32::try_from(len) {
        Ok(size) if size <= MAX_PAYLOAD_SIZE => Ok(size),
        Ok(size) => Err(ProtocolError::FrameTooLarge {
            size,
            max: MAX_PAYLOAD_SIZE,
        }),
        Err(_) => Err(ProtocolError::FrameTooLarge {
            size: u32::MAX,
            max: MAX_PAYLOAD_SIZE,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let payload = Bytes::from(r#"{"header":{},"body":{"op":"READ","items":[]}}"#);
        let frame = Frame::new(payload.clone());

        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();

        assert_eq!(decoded.version, crate::PROTOCOL_VERSION);
        assert!(!decoded.flags.is_response());
        assert_eq!(decoded.payload, payload);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_response_flag() {
        let frame = Frame::response(Bytes::from_static(b"{}"));
        let mut buf = frame.encode().unwrap();
        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(decoded.flags.is_response());
    }

    #[test]
    fn test_invalid_magic() {
        let mut buf = BytesMut::from(&b"BADX\x00\x01\x00\x00\x00\x00\x00\x00"[..]);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::InvalidMagic(_))));
    }

    #[test]
    fn test_incomplete_frame() {
        let mut buf = BytesMut::from(&b"PLCX\x00\x01\x00"[..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());

        let encoded = Frame::new(Bytes::from_static(b"{\"a\":1}")).encode().unwrap();
        let mut partial = BytesMut::from(&encoded[..FRAME_HEADER_SIZE + 2]);
        assert!(Frame::decode(&mut partial).unwrap().is_none());
        assert_eq!(partial.len(), FRAME_HEADER_SIZE + 2);
    }

    #[test]
    fn test_unsupported_version() {
        let mut buf = BytesMut::from(&b"PLCX\x00\x63\x00\x00\x00\x00\x00\x00"[..]);
        let result = Frame::decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::UnsupportedVersion(99))));
    }

    #[test]
    fn test_invalid_flags() {
        let result = FrameFlags::from_bits(0x0100);
        assert!(matches!(result, Err(ProtocolError::InvalidFlags(0x0100))));
    }

    #[test]
    fn test_frame_too_large() {
        let huge_payload = vec![0u8; (MAX_PAYLOAD_SIZE + 1) as usize];
        let frame = Frame::new(Bytes::from(huge_payload));
        assert!(matches!(
            frame.encode(),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[test]
    fn test_payload_len_limits() {
        assert_eq!(checked_payload_len(0).unwrap(), 0);
        assert_eq!(
            checked_payload_len(MAX_PAYLOAD_SIZE as usize).unwrap(),
            MAX_PAYLOAD_SIZE
        );
        assert!(matches!(
            checked_payload_len(MAX_PAYLOAD_SIZE as usize + 1),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn test_payload_len_does_not_wrap() {
        // 4 GiB + 1 would wrap to 1 if truncated to u32.
        let len = u32::MAX as usize + 2;
        assert!(matches!(
            checked_payload_len(len),
            Err(ProtocolError::FrameTooLarge { size, .. }) if size == u32::MAX
        ));
    }

    #[test]
    fn test_peek_len() {
        let encoded = Frame::new(Bytes::from_static(b"12345")).encode().unwrap();
        assert_eq!(
            Frame::peek_len(&encoded).unwrap(),
            Some(FRAME_HEADER_SIZE + 5)
        );
        assert_eq!(Frame::peek_len(&encoded[..4]).unwrap(), None);
    }

    #[test]
    fn test_decode_exact() {
        let encoded = Frame::new(Bytes::from_static(b"abc")).encode().unwrap();
        assert_eq!(Frame::decode_exact(&encoded).unwrap().payload.as_ref(), b"abc");

        let mut doubled = encoded.to_vec();
        doubled.extend_from_slice(&encoded);
        assert!(matches!(
            Frame::decode_exact(&doubled),
            Err(ProtocolError::TrailingBytes(_))
        ));

        assert!(matches!(
            Frame::decode_exact(&encoded[..FRAME_HEADER_SIZE + 1]),
            Err(ProtocolError::IncompleteFrame { needed: 2 })
        ));
    }

    #[test]
    fn test_multiple_frames_in_buffer() {
        let frame1 = Frame::new(Bytes::from(r#"{"id":"1"}"#));
        let frame2 = Frame::new(Bytes::from(r#"{"id":"2"}"#));

        let mut buf = BytesMut::new();
        buf.extend_from_slice(&frame1.encode().unwrap());
        buf.extend_from_slice(&frame2.encode().unwrap());

        let decoded1 = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(std::str::from_utf8(&decoded1.payload)
            .unwrap()
            .contains("\"1\""));

        let decoded2 = Frame::decode(&mut buf).unwrap().unwrap();
        assert!(std::str::from_utf8(&decoded2.payload)
            .unwrap()
            .contains("\"2\""));
    }
}

//! Message codecs and stream framing.
//!
//! [`Codec`] is the seam between the generic connection core and a concrete
//! device protocol. [`JsonCodec`] is the reference implementation: the frame
//! header from [`crate::frame`] followed by a JSON payload.

use crate::error::{ProtocolError, ResultCode};
use crate::frame::Frame;
use crate::message::{Request, RequestBody, RequestHeader, Response, ResponseBody, SymbolHandle};
use bytes::{Bytes, BytesMut};

/// Encodes requests and decodes responses for one device protocol.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a request into one complete frame.
    fn encode_request(&self, request: &Request) -> Result<Bytes, ProtocolError>;

    /// Decodes one complete response frame.
    fn decode_response(&self, frame: &[u8]) -> Result<Response, ProtocolError>;

    /// Encodes a symbol lookup for `name`.
    fn encode_symbol_lookup(
        &self,
        header: RequestHeader,
        name: &str,
    ) -> Result<Bytes, ProtocolError> {
        self.encode_request(&Request::new(
            header,
            RequestBody::SymbolLookup {
                name: name.to_string(),
            },
        ))
    }

    /// Extracts the result code and handle of a symbol lookup response.
    fn decode_symbol_lookup(
        &self,
        response: &Response,
    ) -> Result<(ResultCode, Option<SymbolHandle>), ProtocolError> {
        if !response.is_ok() {
            return Ok((response.result, None));
        }
        match &response.body {
            ResponseBody::SymbolLookup { handle } => Ok((response.result, Some(*handle))),
            // Devices that answer lookups with raw bytes carry the handle
            // little-endian in the first four bytes.
            ResponseBody::Proprietary { data } => match SymbolHandle::from_le_slice(data) {
                Some(handle) => Ok((response.result, Some(handle))),
                None => Err(ProtocolError::InvalidHandle(data.len())),
            },
            other => Err(ProtocolError::UnexpectedBody {
                expected: "symbol_lookup",
                actual: other.kind(),
            }),
        }
    }
}

/// Frame header plus JSON payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl JsonCodec {
    pub fn new() -> Self {
        Self
    }

    /// Encodes a response frame (device side).
    pub fn encode_response(&self, response: &Response) -> Result<Bytes, ProtocolError> {
        let payload = serde_json::to_vec(response)?;
        Ok(Frame::response(Bytes::from(payload)).encode()?.freeze())
    }

    /// Decodes a request frame (device side).
    pub fn decode_request(&self, frame: &[u8]) -> Result<Request, ProtocolError> {
        let frame = Frame::decode_exact(frame)?;
        parse_payload(&frame.payload)
    }
}

impl Codec for JsonCodec {
    fn encode_request(&self, request: &Request) -> Result<Bytes, ProtocolError> {
        Ok(Frame::from_json(request)?.encode()?.freeze())
    }

    fn decode_response(&self, frame: &[u8]) -> Result<Response, ProtocolError> {
        let frame = Frame::decode_exact(frame)?;
        parse_payload(&frame.payload)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, ProtocolError> {
    let text = std::str::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
    Ok(serde_json::from_str(text)?)
}

/// Splits a byte stream into complete raw frames.
pub struct FrameDecoder {
    buffer: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Takes the next complete frame, header included, off the buffer.
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, ProtocolError> {
        match Frame::peek_len(&self.buffer)? {
            Some(len) if self.buffer.len() >= len => Ok(Some(self.buffer.split_to(len).freeze())),
            _ => Ok(None),
        }
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

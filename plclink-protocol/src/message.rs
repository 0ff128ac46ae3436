//! Request and response messages exchanged with a device.

use crate::address::DirectAddress;
use crate::error::ResultCode;
use crate::identity::EndpointId;
use crate::value::{DataType, PlcValue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Device-side handle a symbolic address resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymbolHandle(pub u32);

impl SymbolHandle {
    /// Decodes a handle from the little-endian bytes returned by a lookup.
    pub fn from_le_slice(data: &[u8]) -> Option<Self> {
        let bytes: [u8; 4] = data.get(..4)?.try_into().ok()?;
        Some(SymbolHandle(u32::from_le_bytes(bytes)))
    }
}

impl fmt::Display for SymbolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle:{:#010x}", self.0)
    }
}

/// An address as placed on the wire: either direct or a resolved handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireAddress {
    Direct(DirectAddress),
    Handle(SymbolHandle),
}

/// Header shared by requests and responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestHeader {
    /// Correlates a response with its request. Never zero.
    pub correlation_id: u32,
    pub source: EndpointId,
    pub target: EndpointId,
}

impl RequestHeader {
    /// Header of the response to this request: endpoints swapped.
    pub fn reply(&self) -> Self {
        Self {
            correlation_id: self.correlation_id,
            source: self.target,
            target: self.source,
        }
    }
}

/// One item of a batched read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireReadItem {
    pub address: WireAddress,
    pub data_type: DataType,
    pub count: u16,
}

/// One item of a batched write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireWriteItem {
    pub address: WireAddress,
    pub data_type: DataType,
    pub values: Vec<PlcValue>,
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestBody {
    Read { items: Vec<WireReadItem> },
    Write { items: Vec<WireWriteItem> },
    SymbolLookup { name: String },
    Proprietary { data: Vec<u8> },
}

impl RequestBody {
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Read { .. } => "read",
            RequestBody::Write { .. } => "write",
            RequestBody::SymbolLookup { .. } => "symbol_lookup",
            RequestBody::Proprietary { .. } => "proprietary",
        }
    }
}

/// Request message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub header: RequestHeader,
    pub body: RequestBody,
}

impl Request {
    pub fn new(header: RequestHeader, body: RequestBody) -> Self {
        Self { header, body }
    }
}

/// Result of one item of a batched read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemResult {
    pub result: ResultCode,
    #[serde(default)]
    pub values: Vec<PlcValue>,
}

impl ItemResult {
    pub fn ok(values: Vec<PlcValue>) -> Self {
        Self {
            result: ResultCode::OK,
            values,
        }
    }

    pub fn failed(result: ResultCode) -> Self {
        Self {
            result,
            values: Vec::new(),
        }
    }
}

/// Response payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseBody {
    Read { items: Vec<ItemResult> },
    Write { items: Vec<ResultCode> },
    SymbolLookup { handle: SymbolHandle },
    Proprietary { data: Vec<u8> },
    Empty,
}

impl ResponseBody {
    pub fn kind(&self) -> &'static str {
        match self {
            ResponseBody::Read { .. } => "read",
            ResponseBody::Write { .. } => "write",
            ResponseBody::SymbolLookup { .. } => "symbol_lookup",
            ResponseBody::Proprietary { .. } => "proprietary",
            ResponseBody::Empty => "empty",
        }
    }
}

/// Response message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub header: RequestHeader,
    /// Response-level result code; non-zero fails the whole request.
    pub result: ResultCode,
    pub body: ResponseBody,
}

impl Response {
    pub fn ok(header: RequestHeader, body: ResponseBody) -> Self {
        Self {
            header,
            result: ResultCode::OK,
            body,
        }
    }

    pub fn error(header: RequestHeader, result: ResultCode) -> Self {
        Self {
            header,
            result,
            body: ResponseBody::Empty,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn correlation_id(&self) -> u32 {
        self.header.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, MemoryArea};

    fn header() -> RequestHeader {
        RequestHeader {
            correlation_id: 7,
            source: EndpointId::new([10, 0, 0, 1, 1, 1], 32905),
            target: EndpointId::new([10, 0, 0, 2, 1, 1], 851),
        }
    }

    #[test]
    fn test_request_serialization() {
        let direct = Address::parse("INPUTS/0").unwrap().as_direct().cloned().unwrap();
        let request = Request::new(
            header(),
            RequestBody::Read {
                items: vec![WireReadItem {
                    address: WireAddress::Direct(direct),
                    data_type: DataType::Byte,
                    count: 4,
                }],
            },
        );
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""op":"READ""#));
        assert!(json.contains(r#""correlation_id":7"#));

        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_symbol_lookup_serialization() {
        let body = RequestBody::SymbolLookup {
            name: "Main.byByte[0]".to_string(),
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(json, r#"{"op":"SYMBOL_LOOKUP","name":"Main.byByte[0]"}"#);
        assert_eq!(body.kind(), "symbol_lookup");
    }

    #[test]
    fn test_response_error_serialization() {
        let response = Response::error(header().reply(), ResultCode::SYMBOL_NOT_FOUND);
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains(r#""result":1808"#));
        assert!(json.contains(r#""op":"EMPTY""#));

        let parsed: Response = serde_json::from_str(&json).unwrap();
        assert!(!parsed.is_ok());
        assert_eq!(parsed.correlation_id(), 7);
    }

    #[test]
    fn test_reply_swaps_endpoints() {
        let h = header();
        let reply = h.reply();
        assert_eq!(reply.source, h.target);
        assert_eq!(reply.target, h.source);
        assert_eq!(reply.correlation_id, h.correlation_id);
    }

    #[test]
    fn test_symbol_handle_from_bytes() {
        assert_eq!(
            SymbolHandle::from_le_slice(&[1, 2, 3, 4]),
            Some(SymbolHandle(0x04030201))
        );
        assert_eq!(SymbolHandle::from_le_slice(&[1, 2]), None);
    }

    #[test]
    fn test_wire_address_handle() {
        let addr = WireAddress::Handle(SymbolHandle(5));
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, r#"{"handle":5}"#);

        let direct = WireAddress::Direct(DirectAddress::new(MemoryArea::new("M").unwrap(), 2));
        let json = serde_json::to_string(&direct).unwrap();
        assert!(json.contains(r#""area":"M""#));
    }
}

//! Protocol error types and device result codes.

use crate::value::DataType;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Protocol-level errors that can occur during framing or message handling.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid magic bytes: expected 'PLCX', got {0:?}")]
    InvalidMagic([u8; 4]),

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u32, max: u32 },

    #[error("invalid frame flags: {0:#x}")]
    InvalidFlags(u16),

    #[error("incomplete frame: need {needed} more bytes")]
    IncompleteFrame { needed: usize },

    #[error("trailing bytes after frame: {0}")]
    TrailingBytes(usize),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid UTF-8 in payload")]
    InvalidUtf8,

    #[error("unexpected response body: expected {expected}, got {actual}")]
    UnexpectedBody {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("symbol handle needs 4 bytes, got {0}")]
    InvalidHandle(usize),

    #[error("item count mismatch: requested {requested}, received {received}")]
    ItemCountMismatch { requested: usize, received: usize },
}

/// Error returned when an address expression matches neither the direct nor
/// the symbolic grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid address '{input}': {reason}")]
pub struct AddressFormatError {
    pub input: String,
    pub reason: String,
}

impl AddressFormatError {
    pub fn new(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            reason: reason.into(),
        }
    }
}

/// Error returned when a decoded value is converted to the wrong Rust type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} value, got {actual}")]
pub struct ValueTypeError {
    pub expected: DataType,
    pub actual: DataType,
}

/// Result code reported by the device, per response and per batch item.
///
/// Zero means success. Any other value is a device-level failure whose
/// meaning is owned by the concrete protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultCode(pub u32);

impl ResultCode {
    pub const OK: ResultCode = ResultCode(0);
    pub const DEVICE_ERROR: ResultCode = ResultCode(1);
    pub const INVALID_REQUEST: ResultCode = ResultCode(0x0701);
    pub const SYMBOL_NOT_FOUND: ResultCode = ResultCode(0x0710);
    pub const ACCESS_DENIED: ResultCode = ResultCode(0x0719);

    pub fn is_ok(&self) -> bool {
        self.0 == 0
    }

    pub fn code(&self) -> u32 {
        self.0
    }
}

impl From<u32> for ResultCode {
    fn from(code: u32) -> Self {
        ResultCode(code)
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_code_ok() {
        assert!(ResultCode::OK.is_ok());
        assert!(!ResultCode::DEVICE_ERROR.is_ok());
        assert!(!ResultCode(0x0710).is_ok());
        assert_eq!(ResultCode::from(7).code(), 7);
    }

    #[test]
    fn test_result_code_display() {
        assert_eq!(format!("{}", ResultCode::OK), "0x0000");
        assert_eq!(format!("{}", ResultCode::DEVICE_ERROR), "0x0001");
        assert_eq!(format!("{}", ResultCode::SYMBOL_NOT_FOUND), "0x0710");
    }

    #[test]
    fn test_result_code_serialization() {
        let json = serde_json::to_string(&ResultCode(1)).unwrap();
        assert_eq!(json, "1");

        let parsed: ResultCode = serde_json::from_str("1808").unwrap();
        assert_eq!(parsed, ResultCode::SYMBOL_NOT_FOUND);
    }

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::InvalidMagic(*b"XXXX");
        assert!(err.to_string().contains("magic"));

        let err = ProtocolError::UnsupportedVersion(99);
        assert!(err.to_string().contains("99"));

        let err = ProtocolError::FrameTooLarge { size: 100, max: 50 };
        assert!(err.to_string().contains("100"));

        let err = ProtocolError::IncompleteFrame { needed: 10 };
        assert!(err.to_string().contains("10"));

        let err = ProtocolError::InvalidUtf8;
        assert!(err.to_string().contains("UTF-8"));

        let err = ProtocolError::InvalidFlags(0xFF);
        let msg = err.to_string();
        assert!(msg.contains("ff") || msg.contains("FF"));

        let err = ProtocolError::ItemCountMismatch {
            requested: 2,
            received: 1,
        };
        assert!(err.to_string().contains("requested 2"));
    }

    #[test]
    fn test_value_type_error_display() {
        let err = ValueTypeError {
            expected: DataType::Int,
            actual: DataType::Real,
        };
        assert_eq!(err.to_string(), "expected INT value, got REAL");
    }

    #[test]
    fn test_address_format_error_display() {
        let err = AddressFormatError::new("A//1", "empty byte offset");
        let msg = err.to_string();
        assert!(msg.contains("A//1"));
        assert!(msg.contains("empty byte offset"));
    }
}

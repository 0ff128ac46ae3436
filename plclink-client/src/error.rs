//! Client error types.

use plclink_protocol::{AddressFormatError, ProtocolError, ResultCode, ValueTypeError};
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;

/// A channel-level failure reported by the transport.
///
/// Cloning shares the underlying cause, so every request failed by the same
/// event carries the same error object.
#[derive(Debug, Clone)]
pub struct TransportError(Arc<io::Error>);

impl TransportError {
    pub fn new(cause: io::Error) -> Self {
        Self(Arc::new(cause))
    }

    pub fn kind(&self) -> io::ErrorKind {
        self.0.kind()
    }

    /// The underlying I/O error.
    pub fn cause(&self) -> &io::Error {
        &self.0
    }

    /// Whether both errors originate from the same reported failure.
    pub fn same_cause(&self, other: &TransportError) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for TransportError {
    fn eq(&self, other: &Self) -> bool {
        self.same_cause(other)
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TransportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.0.as_ref())
    }
}

impl From<io::Error> for TransportError {
    fn from(cause: io::Error) -> Self {
        Self::new(cause)
    }
}

/// Client errors.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error(transparent)]
    AddressFormat(#[from] AddressFormatError),

    #[error("failed to resolve symbol '{symbol}': device returned {code}")]
    AddressResolution { symbol: String, code: ResultCode },

    #[error("cannot connect to {endpoint}: {reason}")]
    Connection { endpoint: String, reason: String },

    #[error("transport failure: {0}")]
    TransportFailure(#[source] TransportError),

    #[error("device rejected request: {code}")]
    DeviceRejected { code: ResultCode },

    #[error("operation timed out")]
    OperationTimeout,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("protocol error: {0}")]
    Protocol(Arc<ProtocolError>),

    #[error("invalid value: {0}")]
    InvalidValue(String),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::TransportFailure(_) => true,
            ClientError::OperationTimeout => true,
            ClientError::Connection { .. } => true,
            ClientError::AddressResolution { .. } => true,
            _ => false,
        }
    }

    /// Device result code carried by this error, if any.
    pub fn result_code(&self) -> Option<ResultCode> {
        match self {
            ClientError::AddressResolution { code, .. } | ClientError::DeviceRejected { code } => {
                Some(*code)
            }
            _ => None,
        }
    }
}

impl From<ProtocolError> for ClientError {
    fn from(err: ProtocolError) -> Self {
        ClientError::Protocol(Arc::new(err))
    }
}

impl From<ValueTypeError> for ClientError {
    fn from(err: ValueTypeError) -> Self {
        ClientError::InvalidValue(err.to_string())
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        ClientError::TransportFailure(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_error_identity() {
        let a = TransportError::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let b = a.clone();
        let c = TransportError::new(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.kind(), io::ErrorKind::ConnectionReset);
        assert_eq!(a.to_string(), "reset");
    }

    #[test]
    fn test_retryable() {
        assert!(ClientError::OperationTimeout.is_retryable());
        assert!(ClientError::TransportFailure(TransportError::new(io::Error::from(
            io::ErrorKind::BrokenPipe
        )))
        .is_retryable());
        assert!(!ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::DeviceRejected {
            code: ResultCode::DEVICE_ERROR
        }
        .is_retryable());
        assert!(!ClientError::from(AddressFormatError::new("x/", "bad")).is_retryable());
    }

    #[test]
    fn test_result_code() {
        let err = ClientError::AddressResolution {
            symbol: "Main.x".to_string(),
            code: ResultCode(1),
        };
        assert_eq!(err.result_code(), Some(ResultCode(1)));
        assert!(err.to_string().contains("Main.x"));
        assert_eq!(ClientError::ConnectionClosed.result_code(), None);
    }

    #[test]
    fn test_value_type_error_is_invalid_value() {
        let err = ClientError::from(ValueTypeError {
            expected: plclink_protocol::DataType::Bool,
            actual: plclink_protocol::DataType::Byte,
        });
        assert!(matches!(err, ClientError::InvalidValue(msg) if msg.contains("BOOL")));
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let err = ClientError::TransportFailure(TransportError::new(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "peer reset",
        )));
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "peer reset");
        assert!(source.source().is_some());
    }
}

//! Endpoint identifiers used to route responses back to one logical
//! connection over a shared transport.

use crate::error::AddressFormatError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Port used for locally generated source endpoints.
pub const DEFAULT_SOURCE_PORT: u16 = 0xFFFE;

/// A device or client endpoint: a six-byte node id plus a port.
///
/// Rendered as `a.b.c.d.e.f:port`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct EndpointId {
    pub node: [u8; 6],
    pub port: u16,
}

impl EndpointId {
    pub const UNSPECIFIED: EndpointId = EndpointId {
        node: [0; 6],
        port: 0,
    };

    pub fn new(node: [u8; 6], port: u16) -> Self {
        Self { node, port }
    }

    /// Generates a random source endpoint.
    ///
    /// The node id is taken from a fresh v4 UUID, so two connections in the
    /// same process never share an identity by accident.
    pub fn generate(port: u16) -> Self {
        let uuid = uuid::Uuid::new_v4();
        let bytes = uuid.as_bytes();
        let mut node = [0u8; 6];
        node.copy_from_slice(&bytes[..6]);
        Self { node, port }
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.node;
        write!(f, "{}.{}.{}.{}.{}.{}:{}", a, b, c, d, e, g, self.port)
    }
}

impl FromStr for EndpointId {
    type Err = AddressFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (node_part, port_part) = s
            .rsplit_once(':')
            .ok_or_else(|| AddressFormatError::new(s, "expected <node>:<port>"))?;

        let octets: Vec<&str> = node_part.split('.').collect();
        if octets.len() != 6 {
            return Err(AddressFormatError::new(s, "node id needs six octets"));
        }

        let mut node = [0u8; 6];
        for (slot, octet) in node.iter_mut().zip(octets) {
            *slot = octet
                .parse()
                .map_err(|_| AddressFormatError::new(s, format!("invalid octet '{}'", octet)))?;
        }

        let port = port_part
            .parse()
            .map_err(|_| AddressFormatError::new(s, format!("invalid port '{}'", port_part)))?;

        Ok(Self { node, port })
    }
}

/// Source and target endpoints of one logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionIdentity {
    pub source: EndpointId,
    pub target: EndpointId,
}

impl ConnectionIdentity {
    pub fn new(source: EndpointId, target: EndpointId) -> Self {
        Self { source, target }
    }

    /// Uses a generated source endpoint for the given target.
    pub fn generated(target: EndpointId) -> Self {
        Self::new(EndpointId::generate(DEFAULT_SOURCE_PORT), target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display_parse() {
        let id = EndpointId::new([192, 168, 0, 1, 1, 1], 851);
        assert_eq!(id.to_string(), "192.168.0.1.1.1:851");
        assert_eq!("192.168.0.1.1.1:851".parse::<EndpointId>().unwrap(), id);
    }

    #[test]
    fn test_endpoint_parse_errors() {
        assert!("192.168.0.1:851".parse::<EndpointId>().is_err());
        assert!("1.2.3.4.5.6".parse::<EndpointId>().is_err());
        assert!("1.2.3.4.5.256:1".parse::<EndpointId>().is_err());
        assert!("1.2.3.4.5.6:70000".parse::<EndpointId>().is_err());
    }

    #[test]
    fn test_generate_is_unique() {
        let a = EndpointId::generate(DEFAULT_SOURCE_PORT);
        let b = EndpointId::generate(DEFAULT_SOURCE_PORT);
        assert_eq!(a.port, DEFAULT_SOURCE_PORT);
        assert_ne!(a.node, b.node);
    }

    #[test]
    fn test_generated_identity() {
        let target = EndpointId::new([10, 0, 0, 2, 1, 1], 851);
        let identity = ConnectionIdentity::generated(target);
        assert_eq!(identity.target, target);
        assert_ne!(identity.source, EndpointId::UNSPECIFIED);
    }
}

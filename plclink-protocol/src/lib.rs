//! # plclink-protocol
//!
//! Wire-level building blocks for plclink.
//!
//! This crate provides:
//! - Address model and parser (direct and symbolic addresses)
//! - Element data types and decoded values
//! - Connection identity (source/target endpoints)
//! - Request/Response message types
//! - Binary framing and the pluggable `Codec` seam

pub mod address;
pub mod codec;
pub mod error;
pub mod frame;
pub mod identity;
pub mod message;
pub mod value;

pub use address::{Address, DirectAddress, ItemSpec, MemoryArea, SymbolicAddress};
pub use codec::{Codec, FrameDecoder, JsonCodec};
pub use error::{AddressFormatError, ProtocolError, ResultCode, ValueTypeError};
pub use frame::{Frame, FrameFlags, FRAME_HEADER_SIZE, MAGIC};
pub use identity::{ConnectionIdentity, EndpointId, DEFAULT_SOURCE_PORT};
pub use message::{
    ItemResult, Request, RequestBody, RequestHeader, Response, ResponseBody, SymbolHandle,
    WireAddress, WireReadItem, WireWriteItem,
};
pub use value::{DataType, PlcType, PlcValue};

/// Protocol version supported by this implementation.
pub const PROTOCOL_VERSION: u16 = 1;

/// Maximum frame payload size (16 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

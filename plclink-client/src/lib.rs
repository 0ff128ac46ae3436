//! # plclink-client
//!
//! Connection engine for plclink.
//!
//! This crate provides:
//! - Asynchronous result handles with async and blocking waits
//! - Transport channels (TCP and in-memory)
//! - Request correlation over a reordering, possibly failing channel
//! - Symbol resolution with a shared, coalescing cache
//! - The protocol connection composing all of the above
//! - Sinks for publishing read results

pub mod batch;
pub mod config;
pub mod connection;
pub mod correlation;
pub mod error;
pub mod handle;
pub mod resolver;
pub mod sink;
pub mod transport;

pub use batch::{ItemOutcome, ReadItem, ReadResponse, WriteItem, WriteResponse};
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use correlation::CorrelationEngine;
pub use error::{ClientError, TransportError};
pub use handle::{Resolver, ResponseHandle};
pub use resolver::SymbolResolver;
pub use sink::{JsonSink, Sink, SinkValue};
pub use transport::{Channel, ChannelEvent, MemoryPeer, MemoryTransport, TcpTransport, Transport};

//! plclink - industrial device connection engine
//!
//! Opens logical connections to PLCs, addresses device memory directly or
//! through named symbols, and performs asynchronous read, write and
//! proprietary exchanges over a framed transport.
//!
//! ```no_run
//! use plclink::{Connection, ConnectionConfig, DataType, ReadItem, TcpTransport};
//!
//! # async fn run() -> Result<(), plclink::ClientError> {
//! let config = ConnectionConfig::new("192.168.0.20:48898");
//! let connection = Connection::connect(&TcpTransport::new(), config).await?;
//!
//! let items = vec![ReadItem::parse("counter", "Main.counter", DataType::DInt)?];
//! let response = connection.wait(&connection.read(items)).await?;
//! for (name, outcome) in response.iter() {
//!     println!("{}: {:?}", name, outcome);
//! }
//! # Ok(())
//! # }
//! ```

pub use plclink_client as client;
pub use plclink_protocol as protocol;

pub use plclink_client::{
    ClientError, Connection, ConnectionConfig, ItemOutcome, JsonSink, MemoryPeer,
    MemoryTransport, ReadItem, ReadResponse, ResponseHandle, Sink, SinkValue, TcpTransport,
    Transport, TransportError, WriteItem, WriteResponse,
};
pub use plclink_protocol::{
    Address, AddressFormatError, Codec, ConnectionIdentity, DataType, DirectAddress,
    EndpointId, ItemSpec, JsonCodec, MemoryArea, PlcType, PlcValue, ProtocolError, ResultCode,
    SymbolHandle, SymbolicAddress, ValueTypeError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use plclink_protocol::{Response, ResponseBody};

    #[tokio::test]
    async fn test_facade_roundtrip() {
        let (transport, mut peer) = MemoryTransport::pair();
        let connection = Connection::connect(&transport, ConnectionConfig::new("memory"))
            .await
            .unwrap();

        let reply = connection.send_proprietary(Bytes::from_static(b"ping"));
        let request = peer.recv_request().await.unwrap().unwrap();
        peer.reply(&Response::ok(
            request.header.reply(),
            ResponseBody::Proprietary {
                data: b"pong".to_vec(),
            },
        ))
        .unwrap();

        assert_eq!(connection.wait(&reply).await.unwrap().as_ref(), b"pong");
    }

    #[test]
    fn test_parse_through_facade() {
        let address: Address = "outputs/12/3".parse().unwrap();
        assert_eq!(address.to_string(), "OUTPUTS/12/3");
        assert!("Main.x".parse::<Address>().unwrap().is_symbolic());
    }
}

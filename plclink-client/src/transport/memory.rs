//! In-memory transport for tests and device simulations.
//!
//! [`MemoryTransport::pair`] returns the transport plus a [`MemoryPeer`] that
//! plays the device: it sees every frame the connection writes and decides
//! when (and whether) to answer, fail, or disconnect.

use super::{Channel, ChannelEvent, ChannelIo, Transport};
use crate::config::ConnectionConfig;
use crate::error::{ClientError, TransportError};
use bytes::Bytes;
use parking_lot::Mutex;
use plclink_protocol::{JsonCodec, ProtocolError, Request, Response};
use std::io;

/// A transport whose only channel is wired to a [`MemoryPeer`].
pub struct MemoryTransport {
    channel: Mutex<Option<Channel>>,
    refuse: Option<String>,
}

impl MemoryTransport {
    /// Creates a transport and the device end of its channel.
    pub fn pair() -> (Self, MemoryPeer) {
        let (channel, io) = Channel::new("memory");
        let transport = Self {
            channel: Mutex::new(Some(channel)),
            refuse: None,
        };
        (transport, MemoryPeer::new(io))
    }

    /// Creates a transport that refuses every open.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            channel: Mutex::new(None),
            refuse: Some(reason.into()),
        }
    }
}

impl Transport for MemoryTransport {
    async fn open(&self, config: &ConnectionConfig) -> Result<Channel, ClientError> {
        if let Some(reason) = &self.refuse {
            return Err(ClientError::Connection {
                endpoint: config.endpoint.clone(),
                reason: reason.clone(),
            });
        }
        self.channel
            .lock()
            .take()
            .ok_or_else(|| ClientError::Connection {
                endpoint: config.endpoint.clone(),
                reason: "memory channel already opened".to_string(),
            })
    }
}

/// Device end of an in-memory channel.
pub struct MemoryPeer {
    io: ChannelIo,
    codec: JsonCodec,
    received: usize,
}

impl MemoryPeer {
    fn new(io: ChannelIo) -> Self {
        Self {
            io,
            codec: JsonCodec::new(),
            received: 0,
        }
    }

    /// Waits for the next frame written by the connection.
    pub async fn recv_frame(&mut self) -> Option<Bytes> {
        let frame = self.io.outbound.recv().await?;
        self.received += 1;
        Some(frame)
    }

    /// Waits for the next request written by the connection.
    pub async fn recv_request(&mut self) -> Option<Result<Request, ProtocolError>> {
        let frame = self.recv_frame().await?;
        Some(self.codec.decode_request(&frame))
    }

    /// Takes a request that was already written, without waiting.
    pub fn try_recv_request(&mut self) -> Option<Result<Request, ProtocolError>> {
        let frame = self.io.outbound.try_recv().ok()?;
        self.received += 1;
        Some(self.codec.decode_request(&frame))
    }

    /// Number of frames taken off the channel so far.
    pub fn frames_received(&self) -> usize {
        self.received
    }

    /// Delivers a response to the connection.
    pub fn reply(&self, response: &Response) -> Result<(), ProtocolError> {
        let frame = self.codec.encode_response(response)?;
        self.send_frame(frame);
        Ok(())
    }

    /// Delivers raw bytes as one frame.
    pub fn send_frame(&self, frame: Bytes) {
        let _ = self.io.events.send(ChannelEvent::Frame(frame));
    }

    /// Reports a channel-level failure and returns the error the connection
    /// will observe.
    pub fn fail(&self, cause: io::Error) -> TransportError {
        let err = TransportError::new(cause);
        let _ = self.io.events.send(ChannelEvent::Failure(err.clone()));
        err
    }

    /// Whether the connection closed the channel.
    pub fn is_shutdown(&self) -> bool {
        *self.io.shutdown.borrow()
    }

    /// Waits until the connection closes the channel.
    pub async fn wait_shutdown(&mut self) {
        while !*self.io.shutdown.borrow_and_update() {
            if self.io.shutdown.changed().await.is_err() {
                return;
            }
        }
    }
}

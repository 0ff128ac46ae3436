//! Transport channel abstraction.
//!
//! A [`Transport`] opens a [`Channel`]: an outbound queue of complete frames
//! plus a stream of [`ChannelEvent`]s (frame arrivals and channel-level
//! failures) produced on the transport's own tasks. The connection core only
//! ever talks to the channel; socket handling stays inside the transport.

pub mod memory;
pub mod tcp;

pub use memory::{MemoryPeer, MemoryTransport};
pub use tcp::TcpTransport;

use crate::config::ConnectionConfig;
use crate::error::{ClientError, TransportError};
use bytes::Bytes;
use std::future::Future;
use std::io;
use tokio::sync::{mpsc, watch};

/// Notification delivered by a transport.
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// One complete frame arrived.
    Frame(Bytes),
    /// The channel failed; requests in flight on it are lost.
    Failure(TransportError),
}

/// Opens channels to devices.
pub trait Transport: Send + Sync {
    fn open(
        &self,
        config: &ConnectionConfig,
    ) -> impl Future<Output = Result<Channel, ClientError>> + Send;
}

/// Caller side of an open channel.
pub struct Channel {
    sender: ChannelSender,
    events: mpsc::UnboundedReceiver<ChannelEvent>,
}

/// Transport side of an open channel.
pub struct ChannelIo {
    /// Frames queued by the caller, in send order.
    pub outbound: mpsc::UnboundedReceiver<Bytes>,
    /// Where the transport reports arrivals and failures.
    pub events: mpsc::UnboundedSender<ChannelEvent>,
    /// Flips to `true` when the caller closes the channel.
    pub shutdown: watch::Receiver<bool>,
}

impl Channel {
    /// Creates a connected caller/transport pair.
    pub fn new(peer: impl Into<String>) -> (Channel, ChannelIo) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let channel = Channel {
            sender: ChannelSender {
                peer: peer.into(),
                outbound: outbound_tx,
                shutdown: shutdown_tx,
            },
            events: events_rx,
        };
        let io = ChannelIo {
            outbound: outbound_rx,
            events: events_tx,
            shutdown: shutdown_rx,
        };
        (channel, io)
    }

    pub fn peer(&self) -> &str {
        &self.sender.peer
    }

    /// Splits the channel into its sending half and its event stream.
    pub fn into_split(self) -> (ChannelSender, mpsc::UnboundedReceiver<ChannelEvent>) {
        (self.sender, self.events)
    }
}

/// Sending half of a channel.
pub struct ChannelSender {
    peer: String,
    outbound: mpsc::UnboundedSender<Bytes>,
    shutdown: watch::Sender<bool>,
}

impl ChannelSender {
    /// Queues one frame for writing.
    pub fn send(&self, frame: Bytes) -> Result<(), TransportError> {
        if *self.shutdown.borrow() {
            return Err(TransportError::new(io::Error::new(
                io::ErrorKind::NotConnected,
                "channel closed",
            )));
        }
        self.outbound.send(frame).map_err(|_| {
            TransportError::new(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "channel writer stopped",
            ))
        })
    }

    /// Asks the transport to release the channel.
    pub fn close(&self) {
        self.shutdown.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.shutdown.borrow() || self.outbound.is_closed()
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }
}

//! TCP transport.

use super::{Channel, ChannelEvent, ChannelIo, Transport};
use crate::config::ConnectionConfig;
use crate::error::{ClientError, TransportError};
use bytes::Bytes;
use plclink_protocol::FrameDecoder;
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

/// Plain TCP transport carrying length-prefixed frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

impl TcpTransport {
    pub fn new() -> Self {
        Self
    }
}

impl Transport for TcpTransport {
    async fn open(&self, config: &ConnectionConfig) -> Result<Channel, ClientError> {
        let endpoint = config.endpoint.clone();
        tracing::debug!("Connecting to {}...", endpoint);

        let stream = TcpStream::connect(&endpoint)
            .await
            .map_err(|e| ClientError::Connection {
                endpoint: endpoint.clone(),
                reason: e.to_string(),
            })?;

        // Configure TCP options for better performance
        stream.set_nodelay(true).ok();

        let (read_half, write_half) = stream.into_split();
        let (channel, io) = Channel::new(endpoint.clone());
        let ChannelIo {
            outbound,
            events,
            shutdown,
        } = io;

        // Reader tells the writer to stop once the socket is gone.
        let (stop_tx, stop_rx) = watch::channel(false);

        tokio::spawn(write_loop(
            write_half,
            outbound,
            events.clone(),
            shutdown.clone(),
            stop_rx,
        ));
        tokio::spawn(read_loop(
            read_half,
            events,
            shutdown,
            stop_tx,
            config.read_buffer_size,
        ));

        tracing::debug!("TCP channel to {} open", endpoint);
        Ok(channel)
    }
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            frame = outbound.recv() => {
                let Some(frame) = frame else { break };
                if let Err(e) = writer.write_all(&frame).await {
                    tracing::warn!("write_loop: write failed: {}", e);
                    let _ = events.send(ChannelEvent::Failure(TransportError::new(e)));
                    break;
                }
                tracing::trace!("write_loop: wrote {} bytes", frame.len());
            }
            _ = shutdown.changed() => break,
            _ = stop.changed() => break,
        }
    }
    let _ = writer.shutdown().await;
    tracing::debug!("write_loop stopped");
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
    stop: watch::Sender<bool>,
    buffer_size: usize,
) {
    let mut buf = vec![0u8; buffer_size];
    let mut decoder = FrameDecoder::new();

    loop {
        let n = tokio::select! {
            n = reader.read(&mut buf) => n,
            _ = shutdown.changed() => break,
        };

        let failure = match n {
            Ok(0) => Some(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed by peer",
            )),
            Ok(n) => {
                tracing::trace!("read_loop: received {} bytes", n);
                decoder.extend(&buf[..n]);
                drain_frames(&mut decoder, &events).err()
            }
            Err(e) => Some(e),
        };

        if let Some(cause) = failure {
            tracing::warn!("read_loop: channel failed: {}", cause);
            let _ = events.send(ChannelEvent::Failure(TransportError::new(cause)));
            break;
        }
    }

    stop.send_replace(true);
    tracing::debug!("read_loop stopped");
}

fn drain_frames(
    decoder: &mut FrameDecoder,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> Result<(), io::Error> {
    loop {
        match decoder.next_frame() {
            Ok(Some(frame)) => {
                let _ = events.send(ChannelEvent::Frame(frame));
            }
            Ok(None) => return Ok(()),
            // A corrupt stream cannot be resynchronized.
            Err(e) => return Err(io::Error::new(io::ErrorKind::InvalidData, e.to_string())),
        }
    }
}

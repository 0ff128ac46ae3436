//! Request correlation.
//!
//! The engine owns the table of in-flight requests. Every request is
//! registered under a fresh correlation id *before* its frame is handed to
//! the channel, and leaves the table exactly once: when its response
//! arrives, when the channel fails, or when the engine closes.
//!
//! Completions always run after the table lock is released, so a completion
//! may submit follow-up requests.

use crate::error::{ClientError, TransportError};
use crate::handle::{self, ResponseHandle};
use crate::transport::{ChannelEvent, ChannelSender};
use bytes::Bytes;
use parking_lot::Mutex;
use plclink_protocol::{
    Codec, ConnectionIdentity, ProtocolError, Request, RequestBody, RequestHeader, Response,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One-shot callback receiving a request's outcome.
pub type Completion = Box<dyn FnOnce(Result<Response, ClientError>) + Send + 'static>;

struct PendingRequest {
    kind: &'static str,
    completion: Completion,
}

struct PendingTable {
    entries: HashMap<u32, PendingRequest>,
    next_id: u32,
    /// Set once the engine stops accepting requests.
    closed: Option<ClientError>,
}

impl PendingTable {
    /// Next non-zero id that is not currently pending.
    fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if id != 0 && !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    fn drain(&mut self) -> Vec<(u32, PendingRequest)> {
        self.entries.drain().collect()
    }
}

/// Matches responses to outstanding requests by correlation id.
pub struct CorrelationEngine {
    identity: ConnectionIdentity,
    codec: Arc<dyn Codec>,
    sender: ChannelSender,
    table: Mutex<PendingTable>,
}

impl CorrelationEngine {
    pub fn new(identity: ConnectionIdentity, codec: Arc<dyn Codec>, sender: ChannelSender) -> Self {
        Self {
            identity,
            codec,
            sender,
            table: Mutex::new(PendingTable {
                entries: HashMap::new(),
                next_id: 1,
                closed: None,
            }),
        }
    }

    pub fn identity(&self) -> ConnectionIdentity {
        self.identity
    }

    pub fn codec(&self) -> &Arc<dyn Codec> {
        &self.codec
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.table.lock().entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.table.lock().closed.is_some()
    }

    /// Sends a request and returns a handle to its response.
    pub fn send(&self, body: RequestBody) -> ResponseHandle<Response> {
        let (resolver, handle) = handle::pending();
        self.submit(
            body,
            Box::new(move |outcome| {
                resolver.complete(outcome);
            }),
        );
        handle
    }

    /// Sends a request; `completion` receives its outcome exactly once.
    pub fn submit(&self, body: RequestBody, completion: Completion) {
        let codec = Arc::clone(&self.codec);
        self.enqueue(
            body.kind(),
            move |header| codec.encode_request(&Request::new(header, body)),
            completion,
        );
    }

    /// Sends a symbol lookup encoded by the codec's lookup encoder.
    pub fn submit_symbol_lookup(&self, name: &str, completion: Completion) {
        let codec = Arc::clone(&self.codec);
        let name = name.to_string();
        self.enqueue(
            "symbol_lookup",
            move |header| codec.encode_symbol_lookup(header, &name),
            completion,
        );
    }

    fn enqueue<E>(&self, kind: &'static str, encode: E, completion: Completion)
    where
        E: FnOnce(RequestHeader) -> Result<Bytes, ProtocolError>,
    {
        let id = {
            let mut table = self.table.lock();
            let closed = table.closed.clone();
            if let Some(err) = closed {
                drop(table);
                completion(Err(err));
                return;
            }
            let id = table.allocate_id();
            table
                .entries
                .insert(id, PendingRequest { kind, completion });
            id
        };

        let header = RequestHeader {
            correlation_id: id,
            source: self.identity.source,
            target: self.identity.target,
        };

        let sent = encode(header)
            .map_err(ClientError::from)
            .and_then(|frame| self.sender.send(frame).map_err(ClientError::from));

        match sent {
            Ok(()) => tracing::debug!("Sent {} request id={}", kind, id),
            Err(err) => {
                tracing::debug!("Failed to send {} request id={}: {}", kind, id, err);
                // The entry may already be gone if the channel failed meanwhile.
                let entry = self.table.lock().entries.remove(&id);
                if let Some(entry) = entry {
                    (entry.completion)(Err(err));
                }
            }
        }
    }

    /// Routes one received frame to its pending request.
    pub fn on_frame(&self, frame: &[u8]) {
        let response = match self.codec.decode_response(frame) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame ({} bytes): {}", frame.len(), e);
                return;
            }
        };

        if response.header.target != self.identity.source {
            tracing::debug!(
                "Ignoring response id={} addressed to {}",
                response.correlation_id(),
                response.header.target
            );
            return;
        }

        let id = response.correlation_id();
        let entry = self.table.lock().entries.remove(&id);
        let Some(entry) = entry else {
            tracing::warn!("Dropping response for unknown request id={}", id);
            return;
        };

        tracing::debug!(
            "Dispatching {} response id={} result={}",
            entry.kind,
            id,
            response.result
        );
        let outcome = if response.is_ok() {
            Ok(response)
        } else {
            Err(ClientError::DeviceRejected {
                code: response.result,
            })
        };
        (entry.completion)(outcome);
    }

    /// Fails every pending request with the same channel failure.
    pub fn on_failure(&self, cause: TransportError) {
        let drained = self.table.lock().drain();
        tracing::warn!(
            "Channel failure, rejecting {} pending request(s): {}",
            drained.len(),
            cause
        );
        for (_, entry) in drained {
            (entry.completion)(Err(ClientError::TransportFailure(cause.clone())));
        }
    }

    /// Stops accepting requests, releases the channel and rejects everything
    /// still pending.
    pub fn close(&self) {
        self.sender.close();
        let drained = {
            let mut table = self.table.lock();
            if table.closed.is_none() {
                table.closed = Some(ClientError::ConnectionClosed);
            }
            table.drain()
        };
        if !drained.is_empty() {
            tracing::debug!("Closing with {} pending request(s)", drained.len());
        }
        for (_, entry) in drained {
            (entry.completion)(Err(ClientError::ConnectionClosed));
        }
    }
}

/// Feeds channel events into the engine until the channel goes away.
pub async fn run_dispatch(
    engine: Arc<CorrelationEngine>,
    mut events: mpsc::UnboundedReceiver<ChannelEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            ChannelEvent::Frame(frame) => engine.on_frame(&frame),
            ChannelEvent::Failure(cause) => engine.on_failure(cause),
        }
    }
    tracing::debug!("Channel event stream ended");
    engine.close();
}

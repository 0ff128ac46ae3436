//! Protocol connection.
//!
//! A [`Connection`] composes one transport channel, the correlation engine
//! and the symbol resolver. All operations return immediately with a
//! [`ResponseHandle`]; symbolic addresses in a batch are resolved first and
//! the batch is sent once every handle is known.

use crate::batch::{ItemOutcome, ReadItem, ReadResponse, WriteItem, WriteResponse};
use crate::config::ConnectionConfig;
use crate::correlation::{run_dispatch, CorrelationEngine};
use crate::error::ClientError;
use crate::handle::{self, ResponseHandle};
use crate::resolver::SymbolResolver;
use crate::transport::Transport;
use bytes::Bytes;
use parking_lot::Mutex;
use plclink_protocol::{
    Address, Codec, ConnectionIdentity, ItemResult, ItemSpec, JsonCodec, PlcValue,
    ProtocolError, RequestBody, Response, ResponseBody, ResultCode, SymbolHandle,
    SymbolicAddress, WireAddress, WireReadItem, WireWriteItem,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// A connection to one device.
pub struct Connection {
    config: ConnectionConfig,
    engine: Arc<CorrelationEngine>,
    symbols: SymbolResolver,
    runtime: Handle,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl Connection {
    /// Opens a connection speaking the JSON reference codec.
    pub async fn connect<T: Transport>(
        transport: &T,
        config: ConnectionConfig,
    ) -> Result<Self, ClientError> {
        Self::connect_with_codec(transport, config, Arc::new(JsonCodec::new())).await
    }

    /// Opens a connection speaking `codec`.
    pub async fn connect_with_codec<T: Transport>(
        transport: &T,
        config: ConnectionConfig,
        codec: Arc<dyn Codec>,
    ) -> Result<Self, ClientError> {
        tracing::info!("Connecting to {}", config.endpoint);

        let channel = tokio::time::timeout(config.connect_timeout, transport.open(&config))
            .await
            .map_err(|_| ClientError::Connection {
                endpoint: config.endpoint.clone(),
                reason: format!("timed out after {:?}", config.connect_timeout),
            })??;

        let identity = config.identity();
        let (sender, events) = channel.into_split();
        let engine = Arc::new(CorrelationEngine::new(identity, codec, sender));
        let dispatch = tokio::spawn(run_dispatch(Arc::clone(&engine), events));

        tracing::info!(
            "Connected to {} as {} -> {}",
            config.endpoint,
            identity.source,
            identity.target
        );

        Ok(Self {
            symbols: SymbolResolver::new(Arc::clone(&engine)),
            engine,
            config,
            runtime: Handle::current(),
            dispatch: Mutex::new(Some(dispatch)),
            closed: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Source and target endpoints used in every request header.
    pub fn identity(&self) -> ConnectionIdentity {
        self.engine.identity()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.engine.is_closed()
    }

    /// Number of requests awaiting a response.
    pub fn pending_count(&self) -> usize {
        self.engine.pending_count()
    }

    /// Parses an address expression. Performs no I/O.
    pub fn parse_address(&self, text: &str) -> Result<Address, ClientError> {
        Ok(Address::parse(text)?)
    }

    /// Resolves a symbol to its device handle, using the cache when possible.
    pub fn resolve(&self, symbol: &SymbolicAddress) -> ResponseHandle<SymbolHandle> {
        self.symbols.resolve(symbol)
    }

    /// Cached handle of `name`, if already resolved.
    pub fn cached_handle(&self, name: &str) -> Option<SymbolHandle> {
        self.symbols.cached(name)
    }

    /// Drops every cached symbol mapping.
    pub fn clear_mapping(&self) {
        self.symbols.clear();
    }

    /// Reads a batch of items in one request.
    pub fn read<K>(&self, items: Vec<ReadItem<K>>) -> ResponseHandle<ReadResponse<K>>
    where
        K: Clone + Send + 'static,
    {
        if items.is_empty() {
            return handle::resolved(ReadResponse::new(Vec::new()));
        }

        let (resolver, response) = handle::pending();
        let (tokens, specs): (Vec<K>, Vec<ItemSpec>) =
            items.into_iter().map(|item| (item.token, item.spec)).unzip();

        self.submit_read(specs, move |outcome| {
            resolver.complete(outcome.map(|results| {
                ReadResponse::new(
                    tokens
                        .into_iter()
                        .zip(results.into_iter().map(item_outcome))
                        .collect(),
                )
            }));
        });
        response
    }

    /// Reads a batch in one request, returning one handle per item.
    ///
    /// Item failures are independent; a failure of the whole request rejects
    /// every item handle with the same error.
    pub fn read_each<K>(&self, items: Vec<ReadItem<K>>) -> Vec<(K, ResponseHandle<Vec<PlcValue>>)> {
        let mut handles = Vec::with_capacity(items.len());
        let mut resolvers = Vec::with_capacity(items.len());
        let mut specs = Vec::with_capacity(items.len());

        for item in items {
            let (resolver, item_handle) = handle::pending();
            handles.push((item.token, item_handle));
            resolvers.push(resolver);
            specs.push(item.spec);
        }

        if specs.is_empty() {
            return handles;
        }

        self.submit_read(specs, move |outcome| match outcome {
            Ok(results) => {
                for (resolver, result) in resolvers.into_iter().zip(results) {
                    resolver.complete(item_outcome(result));
                }
            }
            Err(err) => {
                for resolver in resolvers {
                    resolver.reject(err.clone());
                }
            }
        });
        handles
    }

    /// Writes a batch of items in one request.
    pub fn write<K>(&self, items: Vec<WriteItem<K>>) -> ResponseHandle<WriteResponse<K>>
    where
        K: Clone + Send + 'static,
    {
        if items.is_empty() {
            return handle::resolved(WriteResponse::new(Vec::new()));
        }

        let requested = items.len();
        let mut tokens = Vec::with_capacity(requested);
        let mut addresses = Vec::with_capacity(requested);
        let mut payloads = Vec::with_capacity(requested);
        for item in items {
            let (token, address, data_type, values) = item.into_parts();
            tokens.push(token);
            addresses.push(address);
            payloads.push((data_type, values));
        }

        let (resolver, response) = handle::pending();
        let engine = Arc::clone(&self.engine);

        self.with_wire_addresses(&addresses, move |resolved| {
            let wire = match resolved {
                Ok(wire) => wire,
                Err(err) => {
                    resolver.reject(err);
                    return;
                }
            };
            let items = wire
                .into_iter()
                .zip(payloads)
                .map(|(address, (data_type, values))| WireWriteItem {
                    address,
                    data_type,
                    values,
                })
                .collect();

            engine.submit(
                RequestBody::Write { items },
                Box::new(move |outcome| {
                    let outcome = outcome.and_then(|response| write_results(response, requested));
                    resolver.complete(outcome.map(|codes| {
                        WriteResponse::new(
                            tokens
                                .into_iter()
                                .zip(codes.into_iter().map(code_outcome))
                                .collect(),
                        )
                    }));
                }),
            );
        });
        response
    }

    /// Sends an opaque payload and returns the device's opaque answer.
    pub fn send_proprietary(&self, data: Bytes) -> ResponseHandle<Bytes> {
        let (resolver, response) = handle::pending();
        self.engine.submit(
            RequestBody::Proprietary {
                data: data.to_vec(),
            },
            Box::new(move |outcome| {
                resolver.complete(outcome.and_then(|response| match response.body {
                    ResponseBody::Proprietary { data } => Ok(Bytes::from(data)),
                    ResponseBody::Empty => Ok(Bytes::new()),
                    other => Err(ProtocolError::UnexpectedBody {
                        expected: "proprietary",
                        actual: other.kind(),
                    }
                    .into()),
                }));
            }),
        );
        response
    }

    /// Waits for `handle` within the configured request timeout.
    pub async fn wait<T>(&self, handle: &ResponseHandle<T>) -> Result<T, ClientError>
    where
        T: Clone,
    {
        handle.wait_timeout(self.config.request_timeout).await
    }

    /// Blocks the current thread on `handle` within the configured request
    /// timeout. Must not be called from inside an async task.
    pub fn blocking_wait<T>(&self, handle: &ResponseHandle<T>) -> Result<T, ClientError>
    where
        T: Clone,
    {
        handle.blocking_wait_timeout(self.config.request_timeout)
    }

    /// Closes the connection.
    ///
    /// Pending requests are rejected with [`ClientError::ConnectionClosed`],
    /// the symbol cache is cleared and the channel released. Idempotent.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Closing connection to {}", self.config.endpoint);

        self.symbols.close();
        self.engine.close();
        if let Some(dispatch) = self.dispatch.lock().take() {
            dispatch.abort();
        }
    }

    fn submit_read<F>(&self, specs: Vec<ItemSpec>, then: F)
    where
        F: FnOnce(Result<Vec<ItemResult>, ClientError>) + Send + 'static,
    {
        if let Some(spec) = specs.iter().find(|spec| spec.count == 0) {
            return then(Err(ClientError::InvalidValue(format!(
                "zero element count for {}",
                spec.address
            ))));
        }

        let requested = specs.len();
        let addresses: Vec<Address> = specs.iter().map(|spec| spec.address.clone()).collect();
        let engine = Arc::clone(&self.engine);

        self.with_wire_addresses(&addresses, move |resolved| {
            let wire = match resolved {
                Ok(wire) => wire,
                Err(err) => return then(Err(err)),
            };
            let items = wire
                .into_iter()
                .zip(specs)
                .map(|(address, spec)| WireReadItem {
                    address,
                    data_type: spec.data_type,
                    count: spec.count,
                })
                .collect();

            engine.submit(
                RequestBody::Read { items },
                Box::new(move |outcome| {
                    then(outcome.and_then(|response| read_results(response, requested)))
                }),
            );
        });
    }

    /// Maps addresses to their wire form, resolving symbols first.
    ///
    /// `then` runs inline when every symbol is already cached, otherwise on
    /// a task that waits for the outstanding resolutions.
    fn with_wire_addresses<F>(&self, addresses: &[Address], then: F)
    where
        F: FnOnce(Result<Vec<WireAddress>, ClientError>) + Send + 'static,
    {
        let lookups: Vec<Lookup> = addresses
            .iter()
            .map(|address| match address {
                Address::Direct(direct) => Lookup::Ready(WireAddress::Direct(direct.clone())),
                Address::Symbolic(symbol) => Lookup::Resolving(self.symbols.resolve(symbol)),
            })
            .collect();

        let ready: Option<Vec<Result<WireAddress, ClientError>>> =
            lookups.iter().map(Lookup::try_ready).collect();
        if let Some(ready) = ready {
            then(ready.into_iter().collect());
            return;
        }

        self.runtime.spawn(async move {
            let mut wire = Vec::with_capacity(lookups.len());
            for lookup in lookups {
                match lookup.wait().await {
                    Ok(address) => wire.push(address),
                    Err(err) => return then(Err(err)),
                }
            }
            then(Ok(wire));
        });
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.config.endpoint)
            .field("identity", &self.identity())
            .field("pending", &self.pending_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

enum Lookup {
    Ready(WireAddress),
    Resolving(ResponseHandle<SymbolHandle>),
}

impl Lookup {
    fn try_ready(&self) -> Option<Result<WireAddress, ClientError>> {
        match self {
            Lookup::Ready(address) => Some(Ok(address.clone())),
            Lookup::Resolving(pending) => pending
                .try_result()
                .map(|outcome| outcome.map(WireAddress::Handle)),
        }
    }

    async fn wait(self) -> Result<WireAddress, ClientError> {
        match self {
            Lookup::Ready(address) => Ok(address),
            Lookup::Resolving(pending) => pending.wait().await.map(WireAddress::Handle),
        }
    }
}

fn read_results(response: Response, requested: usize) -> Result<Vec<ItemResult>, ClientError> {
    match response.body {
        ResponseBody::Read { items } if items.len() == requested => Ok(items),
        ResponseBody::Read { items } => Err(ProtocolError::ItemCountMismatch {
            requested,
            received: items.len(),
        }
        .into()),
        other => Err(ProtocolError::UnexpectedBody {
            expected: "read",
            actual: other.kind(),
        }
        .into()),
    }
}

fn write_results(response: Response, requested: usize) -> Result<Vec<ResultCode>, ClientError> {
    match response.body {
        ResponseBody::Write { items } if items.len() == requested => Ok(items),
        ResponseBody::Write { items } => Err(ProtocolError::ItemCountMismatch {
            requested,
            received: items.len(),
        }
        .into()),
        other => Err(ProtocolError::UnexpectedBody {
            expected: "write",
            actual: other.kind(),
        }
        .into()),
    }
}

fn item_outcome(result: ItemResult) -> ItemOutcome {
    if result.result.is_ok() {
        Ok(result.values)
    } else {
        Err(ClientError::DeviceRejected {
            code: result.result,
        })
    }
}

fn code_outcome(code: ResultCode) -> Result<(), ClientError> {
    if code.is_ok() {
        Ok(())
    } else {
        Err(ClientError::DeviceRejected { code })
    }
}

//! Symbolic address resolution.
//!
//! Symbol names are resolved to device handles once per connection and
//! cached. Concurrent resolutions of one name share a single lookup round
//! trip: the first caller registers an in-flight entry, later callers get a
//! clone of its handle. Failed lookups are never cached, so the next
//! `resolve` retries.

use crate::correlation::CorrelationEngine;
use crate::error::ClientError;
use crate::handle::{self, ResponseHandle};
use parking_lot::Mutex;
use plclink_protocol::{Response, SymbolHandle, SymbolicAddress};
use std::collections::HashMap;
use std::sync::Arc;

enum CacheEntry {
    Resolved(SymbolHandle),
    InFlight(ResponseHandle<SymbolHandle>),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// Bumped by `clear`; lookups started under an older generation do not
    /// write back.
    generation: u64,
    closed: bool,
}

/// Resolves symbol names through the correlation engine, with a shared cache.
pub struct SymbolResolver {
    engine: Arc<CorrelationEngine>,
    cache: Arc<Mutex<CacheState>>,
}

impl SymbolResolver {
    pub fn new(engine: Arc<CorrelationEngine>) -> Self {
        Self {
            engine,
            cache: Arc::new(Mutex::new(CacheState::default())),
        }
    }

    /// Returns a handle to the device handle of `symbol`.
    pub fn resolve(&self, symbol: &SymbolicAddress) -> ResponseHandle<SymbolHandle> {
        let name = symbol.name();

        let (resolver, pending, generation) = {
            let mut cache = self.cache.lock();
            if cache.closed {
                return handle::rejected(ClientError::ConnectionClosed);
            }
            match cache.entries.get(name) {
                Some(CacheEntry::Resolved(resolved)) => {
                    tracing::debug!("Symbol cache hit: {} -> {}", name, resolved);
                    return handle::resolved(*resolved);
                }
                Some(CacheEntry::InFlight(in_flight)) => {
                    tracing::debug!("Joining in-flight lookup for {}", name);
                    return in_flight.clone();
                }
                None => {}
            }
            let (resolver, pending) = handle::pending();
            cache
                .entries
                .insert(name.to_string(), CacheEntry::InFlight(pending.clone()));
            (resolver, pending, cache.generation)
        };

        tracing::debug!("Resolving symbol {}", name);
        let cache = Arc::clone(&self.cache);
        let codec = Arc::clone(self.engine.codec());
        let symbol_name = name.to_string();

        self.engine.submit_symbol_lookup(
            name,
            Box::new(move |outcome| {
                let outcome = outcome
                    .and_then(|response: Response| {
                        match codec.decode_symbol_lookup(&response)? {
                            (_, Some(resolved)) => Ok(resolved),
                            (code, None) => Err(ClientError::DeviceRejected { code }),
                        }
                    })
                    .map_err(|err| match err {
                        ClientError::DeviceRejected { code } => ClientError::AddressResolution {
                            symbol: symbol_name.clone(),
                            code,
                        },
                        other => other,
                    });

                {
                    let mut state = cache.lock();
                    if state.generation == generation {
                        match &outcome {
                            Ok(resolved) => {
                                state
                                    .entries
                                    .insert(symbol_name.clone(), CacheEntry::Resolved(*resolved));
                            }
                            Err(_) => {
                                state.entries.remove(&symbol_name);
                            }
                        }
                    }
                }

                match &outcome {
                    Ok(resolved) => tracing::debug!("Resolved {} -> {}", symbol_name, resolved),
                    Err(e) => tracing::debug!("Resolution of {} failed: {}", symbol_name, e),
                }
                resolver.complete(outcome);
            }),
        );

        pending
    }

    /// Returns the cached handle for `name`, if resolved.
    pub fn cached(&self, name: &str) -> Option<SymbolHandle> {
        match self.cache.lock().entries.get(name) {
            Some(CacheEntry::Resolved(resolved)) => Some(*resolved),
            _ => None,
        }
    }

    /// Number of resolved names in the cache.
    pub fn len(&self) -> usize {
        self.cache
            .lock()
            .entries
            .values()
            .filter(|entry| matches!(entry, CacheEntry::Resolved(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every cached mapping.
    ///
    /// Lookups already in flight still complete their waiters but no longer
    /// populate the cache.
    pub fn clear(&self) {
        let mut cache = self.cache.lock();
        cache.generation += 1;
        cache.entries.clear();
        tracing::debug!("Symbol cache cleared");
    }

    /// Clears the cache and rejects later resolutions.
    pub fn close(&self) {
        let mut cache = self.cache.lock();
        cache.closed = true;
        cache.generation += 1;
        cache.entries.clear();
    }
}

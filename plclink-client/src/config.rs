//! Connection configuration.
//!
//! Built in code with the `with_*` builders; `apply_env_overrides` lets
//! deployments adjust endpoints and timeouts through environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `PLCLINK_ENDPOINT` | `endpoint` |
//! | `PLCLINK_CONNECT_TIMEOUT_MS` | `connect_timeout` |
//! | `PLCLINK_REQUEST_TIMEOUT_MS` | `request_timeout` |
//! | `PLCLINK_SOURCE` | `source` (`a.b.c.d.e.f:port`) |
//! | `PLCLINK_TARGET` | `target` (`a.b.c.d.e.f:port`) |

use plclink_protocol::{ConnectionIdentity, EndpointId, DEFAULT_SOURCE_PORT};
use std::time::Duration;

/// Default read buffer size (8 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 8 * 1024;

/// Minimum read buffer size (1 KiB).
pub const MIN_READ_BUFFER_SIZE: usize = 1024;

/// Maximum read buffer size (1 MiB).
pub const MAX_READ_BUFFER_SIZE: usize = 1024 * 1024;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Transport endpoint, e.g. `192.168.0.1:48898`.
    pub endpoint: String,
    /// Upper bound for opening the channel.
    pub connect_timeout: Duration,
    /// Deadline used by `Connection::wait` and `Connection::blocking_wait`.
    pub request_timeout: Duration,
    /// Read buffer size for socket reads.
    pub read_buffer_size: usize,
    /// Source endpoint; generated at connect time when `None`.
    pub source: Option<EndpointId>,
    /// Target endpoint on the device.
    pub target: EndpointId,
}

impl ConnectionConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            source: None,
            target: EndpointId::UNSPECIFIED,
        }
    }

    /// Builds a configuration from environment variables only.
    pub fn from_env(default_endpoint: impl Into<String>) -> Self {
        let mut config = Self::new(default_endpoint);
        config.apply_env_overrides();
        config
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.clamp(MIN_READ_BUFFER_SIZE, MAX_READ_BUFFER_SIZE);
        self
    }

    pub fn with_source(mut self, source: EndpointId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_target(mut self, target: EndpointId) -> Self {
        self.target = target;
        self
    }

    /// Resolves the connection identity, generating the source if unset.
    pub fn identity(&self) -> ConnectionIdentity {
        let source = self
            .source
            .unwrap_or_else(|| EndpointId::generate(DEFAULT_SOURCE_PORT));
        ConnectionIdentity::new(source, self.target)
    }

    /// Applies environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(endpoint) = std::env::var("PLCLINK_ENDPOINT") {
            if !endpoint.is_empty() {
                self.endpoint = endpoint;
            }
        }

        if let Ok(ms) = std::env::var("PLCLINK_CONNECT_TIMEOUT_MS") {
            match ms.parse() {
                Ok(ms) => self.connect_timeout = Duration::from_millis(ms),
                Err(e) => tracing::warn!("Ignoring PLCLINK_CONNECT_TIMEOUT_MS '{}': {}", ms, e),
            }
        }

        if let Ok(ms) = std::env::var("PLCLINK_REQUEST_TIMEOUT_MS") {
            match ms.parse() {
                Ok(ms) => self.request_timeout = Duration::from_millis(ms),
                Err(e) => tracing::warn!("Ignoring PLCLINK_REQUEST_TIMEOUT_MS '{}': {}", ms, e),
            }
        }

        if let Ok(source) = std::env::var("PLCLINK_SOURCE") {
            match source.parse() {
                Ok(parsed) => self.source = Some(parsed),
                Err(e) => tracing::warn!("Ignoring PLCLINK_SOURCE: {}", e),
            }
        }

        if let Ok(target) = std::env::var("PLCLINK_TARGET") {
            match target.parse() {
                Ok(parsed) => self.target = parsed,
                Err(e) => tracing::warn!("Ignoring PLCLINK_TARGET: {}", e),
            }
        }
    }
}

//! Server configuration.

use crate::error::{ServerError, ServerResult};
use ancient_protocol::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_NAMESPACE};
use std::net::SocketAddr;
use std::time::Duration;

/// Configuration for the RPC server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Method namespace (`<namespace>_<method>`).
    pub namespace: String,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest request line accepted, in bytes.
    pub max_frame_size: usize,
    /// Upper bound on the time a single request may take.
    pub request_timeout: Duration,
}

impl ServerConfig {
    /// Creates a new server configuration.
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            namespace: DEFAULT_NAMESPACE.to_string(),
            max_connections: 256,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the method namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the maximum concurrent connections.
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets the largest accepted request line.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Checks that the configuration can be served.
    pub fn validate(&self) -> ServerResult<()> {
        if self.namespace.is_empty() {
            return Err(ServerError::InvalidConfig("namespace must not be empty".into()));
        }
        if self.max_connections == 0 {
            return Err(ServerError::InvalidConfig(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ServerError::InvalidConfig(
                "max_frame_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new(SocketAddr::from(([127, 0, 0, 1], 8545)))
    }
}

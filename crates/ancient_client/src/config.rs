//! Configuration for the remote client.

use ancient_protocol::{DEFAULT_MAX_FRAME_SIZE, DEFAULT_NAMESPACE};
use std::time::Duration;

/// Configuration for a [`RemoteFreezer`](crate::RemoteFreezer).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Method namespace; must match the server's.
    pub namespace: String,
    /// Time allowed for dialing and the handshake.
    pub connect_timeout: Duration,
    /// Deadline applied to calls whose context carries none.
    pub default_timeout: Duration,
    /// Largest response line accepted, in bytes.
    pub max_frame_size: usize,
    /// Idle connections kept for reuse.
    pub max_idle_connections: usize,
}

impl ClientConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            connect_timeout: Duration::from_secs(5),
            default_timeout: Duration::from_secs(30),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            max_idle_connections: 4,
        }
    }

    /// Sets the method namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Sets the connect and handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the default per-call timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Sets the largest accepted response line.
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Sets how many idle connections are pooled.
    pub fn with_max_idle_connections(mut self, max: usize) -> Self {
        self.max_idle_connections = max;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

//! Error types for the RPC server.

use ancient_store::AncientError;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that stop the server from starting or serving.
///
/// Per-request failures never surface here; they are reported to the
/// caller as JSON-RPC error objects.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The configuration cannot be served.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Binding the listen address failed.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// Address that could not be bound.
        addr: std::net::SocketAddr,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The engine failed during startup.
    #[error("engine error: {0}")]
    Engine(#[from] AncientError),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ServerError::Bind {
            addr: "127.0.0.1:1".parse().unwrap(),
            source: std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use"),
        };
        let msg = err.to_string();
        assert!(msg.contains("127.0.0.1:1"));
        assert!(msg.contains("in use"));
    }

    #[test]
    fn wraps_engine_errors() {
        let err: ServerError = AncientError::Closed.into();
        assert!(matches!(err, ServerError::Engine(AncientError::Closed)));
    }
}

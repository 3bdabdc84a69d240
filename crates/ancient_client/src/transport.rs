//! Transport layer abstraction for RPC calls.

use ancient_protocol::{RpcRequest, RpcResponse};
use ancient_store::{AncientError, AncientResult, CallContext};
use std::sync::atomic::{AtomicBool, Ordering};

/// Carries one JSON-RPC exchange to a server and back.
///
/// Implementations must honor the context: a canceled or expired call
/// returns `Canceled` or `DeadlineExceeded` instead of blocking.
pub trait RpcTransport: Send + Sync {
    /// Sends `request` and waits for its response.
    fn call(&self, request: &RpcRequest, ctx: &CallContext) -> AncientResult<RpcResponse>;

    /// Checks if the transport is usable.
    fn is_connected(&self) -> bool;

    /// Closes the transport. Later calls fail.
    fn close(&self) -> AncientResult<()>;
}

/// An in-process server reachable without a socket.
pub trait LoopbackServer: Send + Sync {
    /// Handles one encoded request line and returns the encoded response.
    fn handle_line(&self, line: &[u8]) -> Vec<u8>;
}

impl<F> LoopbackServer for F
where
    F: Fn(&[u8]) -> Vec<u8> + Send + Sync,
{
    fn handle_line(&self, line: &[u8]) -> Vec<u8> {
        self(line)
    }
}

/// A transport that hands encoded requests straight to an in-process
/// server. Requests and responses still go through their wire encoding.
pub struct LoopbackTransport<S: LoopbackServer> {
    server: S,
    connected: AtomicBool,
}

impl<S: LoopbackServer> LoopbackTransport<S> {
    /// Creates a loopback transport.
    pub fn new(server: S) -> Self {
        Self {
            server,
            connected: AtomicBool::new(true),
        }
    }
}

impl<S: LoopbackServer> RpcTransport for LoopbackTransport<S> {
    fn call(&self, request: &RpcRequest, ctx: &CallContext) -> AncientResult<RpcResponse> {
        ctx.check()?;
        if !self.is_connected() {
            return Err(AncientError::Transport("loopback transport closed".into()));
        }
        let line = request
            .encode()
            .map_err(|e| AncientError::Protocol(format!("failed to encode request: {e}")))?;
        RpcResponse::decode(&self.server.handle_line(&line))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn close(&self) -> AncientResult<()> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}

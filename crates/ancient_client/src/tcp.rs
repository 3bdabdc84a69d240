//! Newline-delimited JSON-RPC over TCP.

use crate::config::ClientConfig;
use crate::transport::RpcTransport;
use ancient_protocol::{read_frame, write_frame, RpcRequest, RpcResponse};
use ancient_store::{AncientError, AncientResult, CallContext};
use parking_lot::Mutex;
use std::future::Future;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tracing::debug;

struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

/// A blocking TCP transport with a pool of idle connections.
///
/// Each call checks a connection out of the pool (or dials a new one),
/// performs one request/response exchange and returns the connection.
/// The pool lock is held only for checkout and return, so concurrent
/// callers run on separate connections. A connection that fails, is
/// canceled or times out is dropped rather than reused.
///
/// The transport drives its own runtime and must not be called from
/// inside an async context.
pub struct TcpTransport {
    endpoint: String,
    connect_timeout: Duration,
    max_frame_size: usize,
    max_idle: usize,
    idle: Mutex<Vec<Connection>>,
    closed: AtomicBool,
    // Dropped after the pooled connections.
    runtime: Runtime,
}

impl TcpTransport {
    /// Dials `endpoint` (`host:port`) once to verify it is reachable.
    pub fn connect(endpoint: &str, config: &ClientConfig, ctx: &CallContext) -> AncientResult<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("ancient-client")
            .enable_all()
            .build()
            .map_err(|e| AncientError::Transport(format!("failed to start runtime: {e}")))?;

        let transport = Self {
            endpoint: endpoint.to_string(),
            connect_timeout: config.connect_timeout,
            max_frame_size: config.max_frame_size,
            max_idle: config.max_idle_connections,
            idle: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            runtime,
        };
        let connection = transport.dial(ctx)?;
        transport.check_in(connection);
        Ok(transport)
    }

    /// Returns the endpoint this transport dials.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Returns the number of pooled idle connections.
    pub fn idle_connections(&self) -> usize {
        self.idle.lock().len()
    }

    fn dial(&self, ctx: &CallContext) -> AncientResult<Connection> {
        let endpoint = self.endpoint.as_str();
        let connect_timeout = self.connect_timeout;
        let stream = self.runtime.block_on(bounded(ctx, async move {
            match tokio::time::timeout(connect_timeout, TcpStream::connect(endpoint)).await {
                Ok(Ok(stream)) => Ok(stream),
                Ok(Err(e)) => Err(AncientError::Transport(format!("failed to dial {endpoint}: {e}"))),
                Err(_) => Err(AncientError::Transport(format!(
                    "dialing {endpoint} timed out after {connect_timeout:?}"
                ))),
            }
        }))??;

        stream
            .set_nodelay(true)
            .map_err(|e| AncientError::Transport(e.to_string()))?;
        debug!(endpoint, "dialed ancient server");

        let (read_half, writer) = stream.into_split();
        Ok(Connection {
            reader: BufReader::new(read_half),
            writer,
        })
    }

    fn check_out(&self, ctx: &CallContext) -> AncientResult<Connection> {
        let pooled = self.idle.lock().pop();
        match pooled {
            Some(connection) => Ok(connection),
            None => self.dial(ctx),
        }
    }

    fn check_in(&self, connection: Connection) {
        if self.closed.load(Ordering::Acquire) {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < self.max_idle {
            idle.push(connection);
        }
    }
}

impl RpcTransport for TcpTransport {
    fn call(&self, request: &RpcRequest, ctx: &CallContext) -> AncientResult<RpcResponse> {
        ctx.check()?;
        if self.closed.load(Ordering::Acquire) {
            return Err(AncientError::Transport("transport closed".into()));
        }
        let payload = request
            .encode()
            .map_err(|e| AncientError::Protocol(format!("failed to encode request: {e}")))?;

        let mut connection = self.check_out(ctx)?;
        let max_frame_size = self.max_frame_size;
        let frame = self
            .runtime
            .block_on(bounded(ctx, exchange(&mut connection, &payload, max_frame_size)))?
            .map_err(|e| AncientError::Transport(format!("exchange with {} failed: {e}", self.endpoint)))?;

        let Some(frame) = frame else {
            return Err(AncientError::Transport(format!(
                "connection to {} closed by server",
                self.endpoint
            )));
        };
        let response = RpcResponse::decode(&frame)?;
        self.check_in(connection);
        Ok(response)
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn close(&self) -> AncientResult<()> {
        self.closed.store(true, Ordering::Release);
        self.idle.lock().clear();
        Ok(())
    }
}

async fn exchange(
    connection: &mut Connection,
    payload: &[u8],
    max_frame_size: usize,
) -> io::Result<Option<Vec<u8>>> {
    write_frame(&mut connection.writer, payload).await?;
    read_frame(&mut connection.reader, max_frame_size).await
}

/// Runs `fut` unless the context is canceled or its deadline passes first.
async fn bounded<F: Future>(ctx: &CallContext, fut: F) -> AncientResult<F::Output> {
    let canceled = async {
        match ctx.cancel_token() {
            Some(token) => token.cancelled().await,
            None => std::future::pending::<()>().await,
        }
    };
    let expired = async {
        match ctx.deadline() {
            Some(deadline) => {
                tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await;
            }
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        biased;
        () = canceled => Err(AncientError::Canceled),
        () = expired => Err(AncientError::DeadlineExceeded),
        output = fut => Ok(output),
    }
}

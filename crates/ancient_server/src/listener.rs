//! TCP accept loop.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::server::RpcServer;
use ancient_protocol::{codes, read_frame, write_frame, RpcErrorObject, RpcResponse};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Serves an [`RpcServer`] over newline-delimited TCP.
///
/// Each connection runs in its own task and handles requests one at a
/// time; engine calls run on the blocking pool. Connections beyond
/// `max_connections` wait in the accept backlog.
///
/// A request is canceled when the listener shuts down or its peer hangs
/// up before the response is written.
pub struct RpcListener {
    server: Arc<RpcServer>,
    listener: TcpListener,
    local_addr: SocketAddr,
    max_frame_size: usize,
    permits: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl RpcListener {
    /// Repairs the engine and binds the configured address.
    ///
    /// Traffic is accepted only once [`run`](Self::run) is awaited.
    pub async fn bind(server: Arc<RpcServer>, config: &ServerConfig) -> ServerResult<Self> {
        config.validate()?;
        server.repair()?;

        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, namespace = server.namespace(), "ancient RPC server listening");

        Ok(Self {
            server,
            listener,
            local_addr,
            max_frame_size: config.max_frame_size,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            shutdown: CancellationToken::new(),
        })
    }

    /// Returns the bound address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Returns a token that stops the listener and its connections when
    /// canceled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until shut down.
    pub async fn run(self) -> ServerResult<()> {
        loop {
            let permit = tokio::select! {
                permit = Arc::clone(&self.permits).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown.cancelled() => break,
            };

            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => {
                            let server = Arc::clone(&self.server);
                            let shutdown = self.shutdown.clone();
                            let max_frame_size = self.max_frame_size;

                            tokio::spawn(async move {
                                debug!(%peer_addr, "connection opened");
                                if let Err(e) =
                                    handle_connection(stream, server, max_frame_size, shutdown).await
                                {
                                    error!(%peer_addr, error = %e, "connection failed");
                                }
                                debug!(%peer_addr, "connection closed");
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                        }
                    }
                }

                _ = self.shutdown.cancelled() => break,
            }
        }

        info!(local_addr = %self.local_addr, "ancient RPC server shutting down");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    server: Arc<RpcServer>,
    max_frame_size: usize,
    shutdown: CancellationToken,
) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    loop {
        let frame = tokio::select! {
            frame = read_frame(&mut reader, max_frame_size) => frame,
            _ = shutdown.cancelled() => return Ok(()),
        };

        let line = match frame {
            Ok(Some(line)) => line,
            Ok(None) => return Ok(()),
            Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                // The rest of the oversized line cannot be resynchronised.
                let response = RpcResponse::failure(
                    None,
                    RpcErrorObject::invalid_request(e.to_string()),
                    None,
                );
                send(&mut write_half, &response).await?;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if line.is_empty() {
            continue;
        }

        let cancel = shutdown.child_token();
        let request_cancel = cancel.clone();
        let worker = Arc::clone(&server);
        let mut task =
            tokio::task::spawn_blocking(move || worker.handle_line_until(&line, &request_cancel));

        let joined = tokio::select! {
            joined = &mut task => joined,
            () = hangup(reader.get_mut()) => {
                debug!("peer hung up mid-request, canceling");
                cancel.cancel();
                let _ = task.await;
                return Ok(());
            }
        };
        let response = match joined {
            Ok(response) => response,
            Err(e) => RpcResponse::failure(
                None,
                RpcErrorObject::new(codes::ENGINE_ERROR, format!("request task failed: {e}")),
                None,
            ),
        };
        send(&mut write_half, &response).await?;
    }
}

/// Resolves once the peer has closed its side. Pending input means the
/// peer is still there, so it never resolves in that case.
async fn hangup(read_half: &mut OwnedReadHalf) {
    let mut probe = [0u8; 1];
    match read_half.peek(&mut probe).await {
        Ok(0) | Err(_) => {}
        Ok(_) => std::future::pending::<()>().await,
    }
}

async fn send<W>(writer: &mut W, response: &RpcResponse) -> io::Result<()>
where
    W: tokio::io::AsyncWrite + Unpin,
{
    let payload = response
        .encode()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_frame(writer, &payload).await
}

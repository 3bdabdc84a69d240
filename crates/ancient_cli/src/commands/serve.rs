//! Serve command implementation.

use ancient_server::{RpcListener, RpcServer, ServerConfig};
use ancient_store::{AncientEngine, AncientStore, CallContext, FileFreezer, MemoryFreezer};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Runs the serve command until interrupted.
///
/// Serves the freezer at `dir`, or an in-memory store if `dir` is `None`.
pub fn run(dir: Option<&Path>, config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let engine: Arc<dyn AncientEngine> = match dir {
        Some(dir) => Arc::new(FileFreezer::open(dir)?),
        None => {
            warn!("serving an in-memory store; data is lost on exit");
            Arc::new(MemoryFreezer::new())
        }
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let server = Arc::new(RpcServer::new(Arc::clone(&engine), &config));
    runtime.block_on(async {
        let listener = RpcListener::bind(server, &config).await?;
        println!("Listening on {}", listener.local_addr());

        let shutdown = listener.shutdown_token();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received");
            }
            shutdown.cancel();
        });
        listener.run().await
    })?;

    engine.close(&CallContext::background())?;
    Ok(())
}

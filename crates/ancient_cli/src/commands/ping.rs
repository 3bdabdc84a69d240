//! Ping command implementation.

use ancient_client::{ClientConfig, RemoteFreezer};
use std::time::Instant;

/// Runs the handshake against `endpoint` and prints the status.
pub fn run(endpoint: &str, config: ClientConfig) -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let freezer = RemoteFreezer::connect(endpoint, config)?;
    println!(
        "{endpoint}: {} ({} ms)",
        freezer.status(),
        started.elapsed().as_millis()
    );
    Ok(())
}

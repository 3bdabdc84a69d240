//! Truncate command implementation.

use ancient_client::{ClientConfig, RemoteFreezer};
use ancient_store::{AncientStore, CallContext};

/// Truncates the remote store to `target` items and flushes it.
pub fn run(
    endpoint: &str,
    config: ClientConfig,
    target: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let freezer = RemoteFreezer::connect(endpoint, config)?;
    let ctx = CallContext::background();
    let before = freezer.ancients(&ctx)?;
    freezer.truncate_ancients(&ctx, target)?;
    freezer.sync(&ctx)?;
    println!("Truncated {endpoint} from {before} to {target} items");
    Ok(())
}

//! Get command implementation.

use ancient_client::{ClientConfig, RemoteFreezer};
use ancient_protocol::envelope;
use ancient_store::{AncientStore, CallContext, Category};

/// Prints the blob of `category` at `number` as a hex envelope.
pub fn run(
    endpoint: &str,
    config: ClientConfig,
    category: &str,
    number: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let category: Category = category.parse()?;
    let freezer = RemoteFreezer::connect(endpoint, config)?;
    let blob = freezer.ancient(&CallContext::background(), category, number)?;
    println!("{}", envelope::encode(&blob));
    Ok(())
}

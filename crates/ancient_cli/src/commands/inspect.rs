//! Inspect command implementation.

use ancient_client::{ClientConfig, RemoteFreezer};
use ancient_store::{AncientResult, AncientStore, CallContext, Category, FileFreezer};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Endpoint or directory inspected.
    pub source: String,
    /// Frozen count.
    pub frozen: u64,
    /// Committed bytes per category.
    pub categories: Vec<CategoryStats>,
    /// Committed bytes across all categories.
    pub total_size: u64,
}

/// Statistics for a single category.
#[derive(Debug, Serialize)]
pub struct CategoryStats {
    /// Category wire name.
    pub name: &'static str,
    /// Committed size in bytes.
    pub size: u64,
}

/// Runs the inspect command against a local directory or a server.
pub fn run(
    endpoint: &str,
    dir: Option<&Path>,
    config: ClientConfig,
    format: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = CallContext::background();
    let result = match dir {
        Some(dir) => {
            let freezer = FileFreezer::open(dir)?;
            let result = collect(&freezer, &ctx, dir.display().to_string())?;
            freezer.close(&ctx)?;
            result
        }
        None => {
            let freezer = RemoteFreezer::connect(endpoint, config)?;
            collect(&freezer, &ctx, endpoint.to_string())?
        }
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn collect(store: &dyn AncientStore, ctx: &CallContext, source: String) -> AncientResult<InspectResult> {
    let frozen = store.ancients(ctx)?;
    let categories = Category::ALL
        .iter()
        .map(|&category| {
            Ok(CategoryStats {
                name: category.as_str(),
                size: store.ancient_size(ctx, category)?,
            })
        })
        .collect::<AncientResult<Vec<_>>>()?;
    let total_size = categories.iter().map(|c| c.size).sum();

    Ok(InspectResult {
        source,
        frozen,
        categories,
        total_size,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("Ancient Store Inspection");
    println!("========================");
    println!();
    println!("Source: {}", result.source);
    println!("Frozen: {}", result.frozen);
    println!();
    println!("Categories:");
    for category in &result.categories {
        println!("  {:<10} {}", category.name, format_size(category.size));
    }
    println!("  {:<10} {}", "total", format_size(result.total_size));
}

fn format_size(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

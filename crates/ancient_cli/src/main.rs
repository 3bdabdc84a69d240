//! Ancient store CLI
//!
//! Command-line tools for serving and inspecting ancient stores.
//!
//! # Commands
//!
//! - `serve` - Serve a freezer directory (or an in-memory store) over TCP
//! - `ping` - Run the handshake against a server
//! - `inspect` - Display frozen count and category sizes
//! - `get` - Print one blob as a hex envelope
//! - `truncate` - Discard every item at or above a target

mod commands;

use ancient_client::ClientConfig;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Remote ancient store tools.
#[derive(Parser)]
#[command(name = "ancient")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Server endpoint (host:port)
    #[arg(global = true, short, long, default_value = "127.0.0.1:8545")]
    endpoint: String,

    /// Method namespace
    #[arg(global = true, short, long, default_value = ancient_protocol::DEFAULT_NAMESPACE)]
    namespace: String,

    /// Per-call timeout in milliseconds
    #[arg(global = true, long, default_value = "30000")]
    timeout_ms: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve an ancient store over JSON-RPC
    Serve {
        /// Freezer directory (created if missing)
        #[arg(short, long, required_unless_present = "memory")]
        dir: Option<PathBuf>,

        /// Serve an ephemeral in-memory store instead
        #[arg(short, long, conflicts_with = "dir")]
        memory: bool,

        /// Address to listen on
        #[arg(short, long, default_value = "127.0.0.1:8545")]
        bind: SocketAddr,

        /// Maximum concurrent connections
        #[arg(long, default_value = "256")]
        max_connections: usize,
    },

    /// Run the handshake and print the server status
    Ping,

    /// Display frozen count and category sizes
    Inspect {
        /// Inspect a local freezer directory instead of a server
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Print one blob as a hex envelope
    Get {
        /// Category (hash, header, body, receipts, td)
        category: String,

        /// Sequence number
        number: u64,
    },

    /// Discard every item at or above TARGET
    Truncate {
        /// New frozen count
        target: u64,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbosity flag
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let client_config = ClientConfig::default()
        .with_namespace(cli.namespace.clone())
        .with_default_timeout(Duration::from_millis(cli.timeout_ms));

    match cli.command {
        Commands::Serve {
            dir,
            memory,
            bind,
            max_connections,
        } => {
            let config = ancient_server::ServerConfig::new(bind)
                .with_namespace(cli.namespace)
                .with_max_connections(max_connections)
                .with_request_timeout(Duration::from_millis(cli.timeout_ms));
            let dir = if memory { None } else { dir };
            commands::serve::run(dir.as_deref(), config)?;
        }
        Commands::Ping => {
            commands::ping::run(&cli.endpoint, client_config)?;
        }
        Commands::Inspect { dir, format } => {
            commands::inspect::run(&cli.endpoint, dir.as_deref(), client_config, &format)?;
        }
        Commands::Get { category, number } => {
            commands::get::run(&cli.endpoint, client_config, &category, number)?;
        }
        Commands::Truncate { target } => {
            commands::truncate::run(&cli.endpoint, client_config, target)?;
        }
    }

    Ok(())
}

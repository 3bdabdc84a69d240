//! # Ancient Server
//!
//! Serves an ancient store engine over newline-delimited JSON-RPC 2.0.
//!
//! This crate provides:
//! - [`FreezerRemoteApi`] - the facade that decodes envelopes, calls the
//!   engine and encodes results
//! - [`RpcServer`] - request validation and method dispatch
//! - [`RpcListener`] - a TCP accept loop with a connection limit
//!
//! # Architecture
//!
//! The server holds no ancient data itself. Every call is forwarded to an
//! [`AncientEngine`], which owns the archive and enforces ordering. The
//! engine is repaired once before the listener accepts traffic; repair is
//! not reachable over the wire.
//!
//! # Example
//!
//! ```rust
//! use ancient_server::{RpcServer, ServerConfig};
//! use ancient_store::MemoryFreezer;
//! use std::sync::Arc;
//!
//! let server = RpcServer::new(Arc::new(MemoryFreezer::new()), &ServerConfig::default());
//! let response = server.handle_line(br#"{"jsonrpc":"2.0","id":1,"method":"freezer_ancients"}"#);
//! assert_eq!(response.result, Some(serde_json::json!(0)));
//! ```
//!
//! [`AncientEngine`]: ancient_store::AncientEngine

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod api;
mod config;
mod error;
mod listener;
mod server;

pub use api::FreezerRemoteApi;
pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use listener::RpcListener;
pub use server::RpcServer;

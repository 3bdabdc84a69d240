//! # Ancient Protocol
//!
//! Wire protocol for the remote ancient store.
//!
//! This crate provides:
//! - The binary envelope codec (`0x`-prefixed hex strings)
//! - JSON-RPC 2.0 request/response messages
//! - The method table and its namespace-qualified names
//! - Mapping between [`AncientError`] and JSON-RPC error objects
//! - Newline-delimited framing over async byte streams
//!
//! Apart from framing, this is a pure protocol crate with no I/O.
//!
//! ## Wire Format
//!
//! One JSON object per line:
//!
//! ```text
//! {"jsonrpc":"2.0","id":7,"method":"freezer_ancient","params":["hash",0]}
//! {"jsonrpc":"2.0","id":7,"result":"0x01"}
//! ```
//!
//! [`AncientError`]: ancient_store::AncientError

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod envelope;
mod errors;
mod frame;
mod messages;
mod method;

pub use envelope::{EnvelopeError, EMPTY_ENVELOPE};
pub use errors::{codes, RpcErrorObject};
pub use frame::{read_frame, write_frame, DEFAULT_MAX_FRAME_SIZE};
pub use messages::{RpcRequest, RpcResponse, JSONRPC_VERSION};
pub use method::{Method, DEFAULT_NAMESPACE};

/// Version string reported by the handshake probe.
pub const PROTOCOL_VERSION: &str = "version 1";

/// Formats the diagnostic status recorded after a successful handshake.
#[must_use]
pub fn handshake_status(version: &str) -> String {
    format!("ok [version={version}]")
}

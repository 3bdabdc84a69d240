//! # Ancient Client
//!
//! Client side of the remote ancient store protocol.
//!
//! This crate provides:
//! - [`RemoteFreezer`] - an [`AncientStore`] backed by a remote engine
//! - [`RpcTransport`] - the transport abstraction
//! - [`TcpTransport`] - newline-delimited JSON-RPC over pooled TCP
//!   connections
//! - [`LoopbackTransport`] - an in-process transport for tests
//!
//! ## Contract
//!
//! A [`RemoteFreezer`] is interchangeable with an in-process engine:
//! the same operations, the same ordering rules and the same error
//! variants. On top of that it may fail with transport errors, and it
//! honors the deadline and cancellation of every [`CallContext`].
//!
//! [`AncientStore`]: ancient_store::AncientStore
//! [`CallContext`]: ancient_store::CallContext

#![deny(unsafe_code)]
#![warn(missing_docs)]
// Production code MUST NOT use panic!/unwrap()/expect()
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod client;
mod config;
mod tcp;
mod transport;

pub use client::RemoteFreezer;
pub use config::ClientConfig;
pub use tcp::TcpTransport;
pub use transport::{LoopbackServer, LoopbackTransport, RpcTransport};

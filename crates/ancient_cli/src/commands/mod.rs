//! CLI command implementations.

pub mod get;
pub mod inspect;
pub mod ping;
pub mod serve;
pub mod truncate;

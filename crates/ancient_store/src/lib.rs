//! # Ancient Store
//!
//! Capability set and reference engines for the append-only ancient store.
//!
//! Ancient data is immutable historical records (block hashes, headers,
//! bodies, receipts and total difficulty) addressed by a gapless sequence
//! number. Each record is split into [`Category`] blobs that are stored
//! independently but always committed together.
//!
//! ## Design Principles
//!
//! - Callers depend only on the [`AncientStore`] trait, never on a variant
//! - Appends are strictly ordered: `number` must equal the frozen count
//! - The frozen counter is published only after every category is written
//! - Readers never wait for the writer; they observe the frozen prefix
//! - Every call carries a [`CallContext`] with a deadline and cancellation
//!
//! ## Available Engines
//!
//! - [`MemoryFreezer`] - For testing and ephemeral archives
//! - [`FileFreezer`] - Persistent per-category data and index files
//!
//! The RPC client in `ancient_client` is a third implementation.
//!
//! ## Example
//!
//! ```rust
//! use ancient_store::{AncientRecord, AncientStore, CallContext, Category, MemoryFreezer};
//!
//! let freezer = MemoryFreezer::new();
//! let ctx = CallContext::background();
//! let record = AncientRecord::new(vec![1], vec![2], vec![3], vec![4], vec![5]);
//!
//! freezer.append_ancient(&ctx, 0, &record).unwrap();
//! assert_eq!(freezer.ancients(&ctx).unwrap(), 1);
//! assert_eq!(freezer.ancient(&ctx, Category::Hash, 0).unwrap(), vec![1]);
//! assert!(!freezer.has_ancient(&ctx, Category::Hash, 1).unwrap());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod category;
mod context;
mod error;
mod file;
mod memory;
mod store;
mod table;

pub use category::{Category, CATEGORY_COUNT};
pub use context::CallContext;
pub use error::{AncientError, AncientResult};
pub use file::FileFreezer;
pub use memory::MemoryFreezer;
pub use store::{AncientEngine, AncientRecord, AncientStore, RepairReport};

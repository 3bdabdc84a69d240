//! Ancient store capability set.

use crate::category::{Category, CATEGORY_COUNT};
use crate::context::CallContext;
use crate::error::AncientResult;
use std::sync::Arc;

/// All category blobs of one record, appended together.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AncientRecord {
    /// Block hash.
    pub hash: Vec<u8>,
    /// Encoded header.
    pub header: Vec<u8>,
    /// Encoded body.
    pub body: Vec<u8>,
    /// Encoded receipts.
    pub receipts: Vec<u8>,
    /// Total difficulty.
    pub td: Vec<u8>,
}

impl AncientRecord {
    /// Creates a record from its category blobs.
    pub fn new(
        hash: Vec<u8>,
        header: Vec<u8>,
        body: Vec<u8>,
        receipts: Vec<u8>,
        td: Vec<u8>,
    ) -> Self {
        Self {
            hash,
            header,
            body,
            receipts,
            td,
        }
    }

    /// Returns the blob stored under `category`.
    #[must_use]
    pub fn blob(&self, category: Category) -> &[u8] {
        match category {
            Category::Hash => &self.hash,
            Category::Header => &self.header,
            Category::Body => &self.body,
            Category::Receipts => &self.receipts,
            Category::Difficulty => &self.td,
        }
    }

    /// Returns the blobs in storage order.
    #[must_use]
    pub fn blobs(&self) -> [(Category, &[u8]); CATEGORY_COUNT] {
        Category::ALL.map(|category| (category, self.blob(category)))
    }
}

/// The ancient store capability set.
///
/// Implemented by in-process engines and by the remote client alike.
///
/// # Invariants
///
/// - A category's blob for `n` exists iff `n < ancients()`
/// - `append_ancient` accepts only `number == ancients()` and bumps the
///   count by exactly one
/// - Committed records never change; truncation removes a suffix
/// - All categories always agree on the frozen count
/// - Implementations must be `Send + Sync`; reads may run concurrently
///   with each other and with an in-flight append
pub trait AncientStore: Send + Sync {
    /// Returns whether `number` is committed in `category`.
    fn has_ancient(&self, ctx: &CallContext, category: Category, number: u64)
        -> AncientResult<bool>;

    /// Retrieves the blob committed at `number` in `category`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `number` is not below the frozen count.
    fn ancient(&self, ctx: &CallContext, category: Category, number: u64)
        -> AncientResult<Vec<u8>>;

    /// Returns the frozen count.
    fn ancients(&self, ctx: &CallContext) -> AncientResult<u64>;

    /// Returns the number of committed blob bytes in `category`.
    fn ancient_size(&self, ctx: &CallContext, category: Category) -> AncientResult<u64>;

    /// Appends the record at `number` to every category.
    ///
    /// # Errors
    ///
    /// Returns `OutOfOrderAppend` if `number` differs from the frozen count.
    fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        record: &AncientRecord,
    ) -> AncientResult<()>;

    /// Discards every record at or above `target`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTruncateTarget` if `target` exceeds the frozen count.
    fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()>;

    /// Flushes every category to durable storage.
    fn sync(&self, ctx: &CallContext) -> AncientResult<()>;

    /// Releases all resources. Calling it again is a no-op.
    fn close(&self, ctx: &CallContext) -> AncientResult<()>;
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    /// Item count found in each category before repair.
    pub lengths: Vec<(Category, u64)>,
    /// Frozen count after repair (the minimum length).
    pub frozen: u64,
}

impl RepairReport {
    /// Returns true if repair discarded at least one item.
    #[must_use]
    pub fn discarded(&self) -> bool {
        self.lengths.iter().any(|(_, len)| *len > self.frozen)
    }
}

/// An in-process engine that physically owns the archive.
///
/// Extends the capability set with crash recovery, which is run before a
/// store starts serving and is never exposed over the wire.
pub trait AncientEngine: AncientStore {
    /// Truncates every category to the shortest one and stores that length
    /// as the frozen count.
    fn repair(&self) -> AncientResult<RepairReport>;
}

impl<T: AncientStore + ?Sized> AncientStore for Arc<T> {
    fn has_ancient(
        &self,
        ctx: &CallContext,
        category: Category,
        number: u64,
    ) -> AncientResult<bool> {
        (**self).has_ancient(ctx, category, number)
    }

    fn ancient(&self, ctx: &CallContext, category: Category, number: u64) -> AncientResult<Vec<u8>> {
        (**self).ancient(ctx, category, number)
    }

    fn ancients(&self, ctx: &CallContext) -> AncientResult<u64> {
        (**self).ancients(ctx)
    }

    fn ancient_size(&self, ctx: &CallContext, category: Category) -> AncientResult<u64> {
        (**self).ancient_size(ctx, category)
    }

    fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        record: &AncientRecord,
    ) -> AncientResult<()> {
        (**self).append_ancient(ctx, number, record)
    }

    fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()> {
        (**self).truncate_ancients(ctx, target)
    }

    fn sync(&self, ctx: &CallContext) -> AncientResult<()> {
        (**self).sync(ctx)
    }

    fn close(&self, ctx: &CallContext) -> AncientResult<()> {
        (**self).close(ctx)
    }
}

impl<T: AncientEngine + ?Sized> AncientEngine for Arc<T> {
    fn repair(&self) -> AncientResult<RepairReport> {
        (**self).repair()
    }
}

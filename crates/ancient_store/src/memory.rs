//! In-memory freezer for tests and ephemeral archives.

use crate::category::{Category, CATEGORY_COUNT};
use crate::context::CallContext;
use crate::error::{AncientError, AncientResult};
use crate::store::{AncientEngine, AncientRecord, AncientStore, RepairReport};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Blobs of one category plus their cumulative end offsets.
#[derive(Debug, Default)]
struct MemoryTable {
    blobs: Vec<Vec<u8>>,
    ends: Vec<u64>,
}

impl MemoryTable {
    fn from_blobs(blobs: Vec<Vec<u8>>) -> Self {
        let mut table = Self::default();
        for blob in blobs {
            table.push(blob);
        }
        table
    }

    fn len(&self) -> u64 {
        self.blobs.len() as u64
    }

    fn push(&mut self, blob: Vec<u8>) {
        let end = self.ends.last().copied().unwrap_or(0) + blob.len() as u64;
        self.blobs.push(blob);
        self.ends.push(end);
    }

    fn truncate(&mut self, items: u64) {
        self.blobs.truncate(items as usize);
        self.ends.truncate(items as usize);
    }

    /// Bytes held by the first `items` blobs.
    fn size_at(&self, items: u64) -> u64 {
        let items = items.min(self.len()) as usize;
        if items == 0 {
            0
        } else {
            self.ends[items - 1]
        }
    }
}

/// An in-memory ancient store.
///
/// Suitable for unit tests, integration tests and servers that do not need
/// the archive to outlive the process.
///
/// # Thread Safety
///
/// Appends and truncations are serialized by a single writer lock. The
/// frozen counter is published with release ordering after every table has
/// been written, so readers only ever observe complete records.
///
/// # Example
///
/// ```rust
/// use ancient_store::{AncientRecord, AncientStore, CallContext, MemoryFreezer};
///
/// let freezer = MemoryFreezer::new();
/// let ctx = CallContext::background();
/// freezer.append_ancient(&ctx, 0, &AncientRecord::default()).unwrap();
/// assert_eq!(freezer.ancients(&ctx).unwrap(), 1);
/// ```
#[derive(Debug, Default)]
pub struct MemoryFreezer {
    tables: [RwLock<MemoryTable>; CATEGORY_COUNT],
    frozen: AtomicU64,
    writer: Mutex<()>,
    closed: AtomicBool,
}

impl MemoryFreezer {
    /// Creates a new empty freezer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a freezer from per-category blobs, as left behind by a crash.
    ///
    /// Tables may have diverging lengths. The frozen count starts at the
    /// shortest table; [`AncientEngine::repair`] discards the excess.
    #[must_use]
    pub fn from_tables(tables: [Vec<Vec<u8>>; CATEGORY_COUNT]) -> Self {
        let tables = tables.map(|blobs| RwLock::new(MemoryTable::from_blobs(blobs)));
        let frozen = tables.iter().map(|t| t.read().len()).min().unwrap_or(0);
        Self {
            tables,
            frozen: AtomicU64::new(frozen),
            writer: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Returns the number of blobs held by `category`, committed or not.
    #[must_use]
    pub fn table_len(&self, category: Category) -> u64 {
        self.tables[category.index()].read().len()
    }

    fn ensure_open(&self) -> AncientResult<()> {
        if self.closed.load(Ordering::Acquire) {
            Err(AncientError::Closed)
        } else {
            Ok(())
        }
    }

    fn frozen(&self) -> u64 {
        self.frozen.load(Ordering::Acquire)
    }
}

impl AncientStore for MemoryFreezer {
    fn has_ancient(
        &self,
        ctx: &CallContext,
        _category: Category,
        number: u64,
    ) -> AncientResult<bool> {
        ctx.check()?;
        self.ensure_open()?;
        Ok(number < self.frozen())
    }

    fn ancient(&self, ctx: &CallContext, category: Category, number: u64) -> AncientResult<Vec<u8>> {
        ctx.check()?;
        self.ensure_open()?;

        let frozen = self.frozen();
        let not_found = || AncientError::NotFound {
            category,
            number,
            frozen,
        };
        if number >= frozen {
            return Err(not_found());
        }

        // A concurrent truncate may cut the table after `frozen` was loaded.
        self.tables[category.index()]
            .read()
            .blobs
            .get(number as usize)
            .cloned()
            .ok_or_else(not_found)
    }

    fn ancients(&self, ctx: &CallContext) -> AncientResult<u64> {
        ctx.check()?;
        self.ensure_open()?;
        Ok(self.frozen())
    }

    fn ancient_size(&self, ctx: &CallContext, category: Category) -> AncientResult<u64> {
        ctx.check()?;
        self.ensure_open()?;
        let frozen = self.frozen();
        Ok(self.tables[category.index()].read().size_at(frozen))
    }

    fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        record: &AncientRecord,
    ) -> AncientResult<()> {
        let _writer = self.writer.lock();
        ctx.check()?;
        self.ensure_open()?;

        let frozen = self.frozen();
        if number != frozen {
            tracing::warn!(expected = frozen, got = number, "rejecting out-of-order append");
            return Err(AncientError::OutOfOrderAppend {
                expected: frozen,
                got: number,
            });
        }

        for (category, blob) in record.blobs() {
            let mut table = self.tables[category.index()].write();
            // Drop uncommitted leftovers so the blob lands at `number`.
            table.truncate(number);
            table.push(blob.to_vec());
        }

        self.frozen.store(number + 1, Ordering::Release);
        Ok(())
    }

    fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()> {
        let _writer = self.writer.lock();
        ctx.check()?;
        self.ensure_open()?;

        let frozen = self.frozen();
        if target > frozen {
            return Err(AncientError::InvalidTruncateTarget { target, frozen });
        }

        // Hide the suffix from readers before cutting the tables.
        self.frozen.store(target, Ordering::Release);
        for table in &self.tables {
            table.write().truncate(target);
        }
        Ok(())
    }

    fn sync(&self, ctx: &CallContext) -> AncientResult<()> {
        // Nothing is buffered in memory
        ctx.check()?;
        self.ensure_open()
    }

    fn close(&self, _ctx: &CallContext) -> AncientResult<()> {
        let _writer = self.writer.lock();
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        for table in &self.tables {
            let mut table = table.write();
            table.blobs = Vec::new();
            table.ends = Vec::new();
        }
        self.frozen.store(0, Ordering::Release);
        Ok(())
    }
}

impl AncientEngine for MemoryFreezer {
    fn repair(&self) -> AncientResult<RepairReport> {
        let _writer = self.writer.lock();
        self.ensure_open()?;

        let lengths: Vec<_> = Category::ALL
            .iter()
            .map(|&category| (category, self.table_len(category)))
            .collect();
        let min = lengths.iter().map(|(_, len)| *len).min().unwrap_or(0);

        for table in &self.tables {
            table.write().truncate(min);
        }
        self.frozen.store(min, Ordering::Release);

        let report = RepairReport {
            lengths,
            frozen: min,
        };
        if report.discarded() {
            tracing::warn!(frozen = min, lengths = ?report.lengths, "repaired diverged ancient tables");
        }
        Ok(report)
    }
}

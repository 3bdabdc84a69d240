//! File-backed freezer.
//!
//! ```text
//! <dir>/
//! ├─ LOCK                      # Advisory lock for single-process access
//! ├─ hash.dat / hash.idx
//! ├─ header.dat / header.idx
//! ├─ body.dat / body.idx
//! ├─ receipts.dat / receipts.idx
//! └─ td.dat / td.idx
//! ```

use crate::category::{Category, CATEGORY_COUNT};
use crate::context::CallContext;
use crate::error::{AncientError, AncientResult};
use crate::store::{AncientEngine, AncientRecord, AncientStore, RepairReport};
use crate::table::FreezerTable;
use fs2::FileExt;
use parking_lot::{Mutex, RwLock};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

const LOCK_FILE: &str = "LOCK";

/// Open tables plus the directory lock that guards them.
#[derive(Debug)]
struct OpenTables {
    tables: [FreezerTable; CATEGORY_COUNT],
    _lock_file: File,
}

/// A persistent ancient store keeping one data/index file pair per category.
///
/// # Durability
///
/// - Appended blobs reach the OS on every append
/// - `sync()` fsyncs every table
/// - Opening the store repairs tables left diverged by a crash
///
/// # Thread Safety
///
/// A single writer lock serializes appends, truncations and repair. The
/// frozen counter is the commit point: it is published only after every
/// table holds the new item, and lowered before any table is cut.
///
/// # Example
///
/// ```no_run
/// use ancient_store::{AncientRecord, AncientStore, CallContext, FileFreezer};
/// use std::path::Path;
///
/// let freezer = FileFreezer::open(Path::new("ancient")).unwrap();
/// let ctx = CallContext::background();
/// let next = freezer.ancients(&ctx).unwrap();
/// freezer.append_ancient(&ctx, next, &AncientRecord::default()).unwrap();
/// freezer.sync(&ctx).unwrap();
/// ```
#[derive(Debug)]
pub struct FileFreezer {
    path: PathBuf,
    inner: RwLock<Option<OpenTables>>,
    frozen: AtomicU64,
    writer: Mutex<()>,
}

impl FileFreezer {
    /// Opens or creates a freezer directory and repairs it.
    ///
    /// # Errors
    ///
    /// Returns `Locked` if another process holds the directory, or an
    /// I/O error if the tables cannot be opened.
    pub fn open(path: &Path) -> AncientResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(AncientError::Locked(path.display().to_string()));
        }

        let tables = [
            FreezerTable::open(path, Category::Hash)?,
            FreezerTable::open(path, Category::Header)?,
            FreezerTable::open(path, Category::Body)?,
            FreezerTable::open(path, Category::Receipts)?,
            FreezerTable::open(path, Category::Difficulty)?,
        ];

        let freezer = Self {
            path: path.to_path_buf(),
            inner: RwLock::new(Some(OpenTables {
                tables,
                _lock_file: lock_file,
            })),
            frozen: AtomicU64::new(0),
            writer: Mutex::new(()),
        };
        let report = freezer.repair()?;
        tracing::info!(path = %path.display(), frozen = report.frozen, "opened ancient store");
        Ok(freezer)
    }

    /// Returns the freezer directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn frozen(&self) -> u64 {
        self.frozen.load(Ordering::Acquire)
    }

    /// Runs `f` against the open tables.
    fn with_tables<T>(
        &self,
        f: impl FnOnce(&[FreezerTable; CATEGORY_COUNT]) -> AncientResult<T>,
    ) -> AncientResult<T> {
        let inner = self.inner.read();
        match inner.as_ref() {
            Some(open) => f(&open.tables),
            None => Err(AncientError::Closed),
        }
    }

    fn repair_locked(&self, tables: &[FreezerTable; CATEGORY_COUNT]) -> AncientResult<RepairReport> {
        let lengths: Vec<_> = Category::ALL
            .iter()
            .map(|&category| (category, tables[category.index()].items()))
            .collect();
        let min = lengths.iter().map(|(_, len)| *len).min().unwrap_or(0);

        self.frozen.store(min, Ordering::Release);
        for table in tables {
            table.truncate(min)?;
        }
        for table in tables {
            table.sync()?;
        }

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

impl AncientStore for FileFreezer {
    fn has_ancient(
        &self,
        ctx: &CallContext,
        _category: Category,
        number: u64,
    ) -> AncientResult<bool> {
        ctx.check()?;
        self.with_tables(|_| Ok(number < self.frozen()))
    }

    fn ancient(&self, ctx: &CallContext, category: Category, number: u64) -> AncientResult<Vec<u8>> {
        ctx.check()?;
        self.with_tables(|tables| {
            let frozen = self.frozen();
            let not_found = || AncientError::NotFound {
                category,
                number,
                frozen,
            };
            if number >= frozen {
                return Err(not_found());
            }
            tables[category.index()]
                .retrieve(number)?
                .ok_or_else(not_found)
        })
    }

    fn ancients(&self, ctx: &CallContext) -> AncientResult<u64> {
        ctx.check()?;
        self.with_tables(|_| Ok(self.frozen()))
    }

    fn ancient_size(&self, ctx: &CallContext, category: Category) -> AncientResult<u64> {
        ctx.check()?;
        self.with_tables(|tables| Ok(tables[category.index()].size_at(self.frozen())))
    }

    fn append_ancient(
        &self,
        ctx: &CallContext,
        number: u64,
        record: &AncientRecord,
    ) -> AncientResult<()> {
        let _writer = self.writer.lock();
        ctx.check()?;
        self.with_tables(|tables| {
            let frozen = self.frozen();
            if number != frozen {
                tracing::warn!(expected = frozen, got = number, "rejecting out-of-order append");
                return Err(AncientError::OutOfOrderAppend {
                    expected: frozen,
                    got: number,
                });
            }

            for (i, (category, blob)) in record.blobs().into_iter().enumerate() {
                if let Err(err) = tables[category.index()].append(number, blob) {
                    tracing::error!(category = %category, number, error = %err, "append failed, rolling back");
                    // Includes the failed table, which may hold a partial write.
                    for written in &tables[..=i] {
                        written.truncate(number)?;
                    }
                    return Err(err);
                }
            }

            self.frozen.store(number + 1, Ordering::Release);
            Ok(())
        })
    }

    fn truncate_ancients(&self, ctx: &CallContext, target: u64) -> AncientResult<()> {
        let _writer = self.writer.lock();
        ctx.check()?;
        self.with_tables(|tables| {
            let frozen = self.frozen();
            if target > frozen {
                return Err(AncientError::InvalidTruncateTarget { target, frozen });
            }

            // Hide the suffix first; a failure below is realigned by repair.
            self.frozen.store(target, Ordering::Release);
            for table in tables {
                table.truncate(target)?;
            }
            tracing::debug!(from = frozen, to = target, "truncated ancient store");
            Ok(())
        })
    }

    fn sync(&self, ctx: &CallContext) -> AncientResult<()> {
        ctx.check()?;
        self.with_tables(|tables| {
            for table in tables {
                table.sync()?;
            }
            Ok(())
        })
    }

    fn close(&self, _ctx: &CallContext) -> AncientResult<()> {
        let _writer = self.writer.lock();
        let mut inner = self.inner.write();
        let Some(open) = inner.take() else {
            return Ok(());
        };

        let mut result = Ok(());
        for table in &open.tables {
            if let Err(err) = table.sync() {
                result = Err(err);
            }
        }
        self.frozen.store(0, Ordering::Release);
        tracing::info!(path = %self.path.display(), "closed ancient store");
        result
    }
}

impl AncientEngine for FileFreezer {
    fn repair(&self) -> AncientResult<RepairReport> {
        let _writer = self.writer.lock();
        self.with_tables(|tables| self.repair_locked(tables))
    }
}

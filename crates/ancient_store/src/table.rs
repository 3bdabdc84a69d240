//! Append-only data/index file pair backing one category.
//!
//! ```text
//! <dir>/<category>.dat   # concatenated blobs
//! <dir>/<category>.idx   # u64 little-endian end offset per item
//! ```
//!
//! Item `n` occupies `[end(n - 1), end(n))` of the data file, with
//! `end(-1) == 0`. Data is written before its index entry, so a torn write
//! leaves at most unreferenced data bytes or a partial index entry, both of
//! which are dropped on open.

use crate::category::Category;
use crate::error::{AncientError, AncientResult};
use parking_lot::{Mutex, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

/// Size of one index entry.
const INDEX_ENTRY_SIZE: u64 = 8;

/// One category's files.
///
/// Writers are serialized by `write`. Readers only take `ends` briefly and
/// then read with positional I/O, so they never wait on a write or fsync.
#[derive(Debug)]
pub(crate) struct FreezerTable {
    category: Category,
    data: File,
    index: File,
    write: Mutex<()>,
    /// Cumulative end offsets, one per stored item.
    ends: RwLock<Vec<u64>>,
}

impl FreezerTable {
    /// Opens or creates the table files for `category` under `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the files cannot be opened or the index refers
    /// to data that is not there and cannot be recovered.
    pub(crate) fn open(dir: &Path, category: Category) -> AncientResult<Self> {
        let data_path = dir.join(format!("{}.dat", category.as_str()));
        let index_path = dir.join(format!("{}.idx", category.as_str()));

        let data = open_rw(&data_path)?;
        let mut index = open_rw(&index_path)?;

        let index_len = index.metadata()?.len();
        let whole_entries = index_len / INDEX_ENTRY_SIZE;
        let mut buf = vec![0u8; (whole_entries * INDEX_ENTRY_SIZE) as usize];
        index.seek(SeekFrom::Start(0))?;
        index.read_exact(&mut buf)?;

        let mut ends = Vec::with_capacity(whole_entries as usize);
        let mut previous = 0u64;
        for chunk in buf.chunks_exact(INDEX_ENTRY_SIZE as usize) {
            let mut raw = [0u8; INDEX_ENTRY_SIZE as usize];
            raw.copy_from_slice(chunk);
            let end = u64::from_le_bytes(raw);
            if end < previous {
                return Err(AncientError::Corrupted(format!(
                    "{} index goes backwards at item {}",
                    category,
                    ends.len()
                )));
            }
            ends.push(end);
            previous = end;
        }

        // Drop index entries pointing past the data that made it to disk.
        let data_len = data.metadata()?.len();
        while ends.last().is_some_and(|&end| end > data_len) {
            ends.pop();
        }

        let indexed_len = ends.len() as u64 * INDEX_ENTRY_SIZE;
        if indexed_len != index_len {
            tracing::warn!(
                category = %category,
                dropped_bytes = index_len - indexed_len,
                "dropping torn index tail"
            );
            index.set_len(indexed_len)?;
        }
        let data_end = ends.last().copied().unwrap_or(0);
        if data_end != data_len {
            tracing::warn!(
                category = %category,
                dropped_bytes = data_len - data_end,
                "dropping unindexed data tail"
            );
            data.set_len(data_end)?;
        }

        Ok(Self {
            category,
            data,
            index,
            write: Mutex::new(()),
            ends: RwLock::new(ends),
        })
    }

    /// Returns the number of stored items, committed or not.
    pub(crate) fn items(&self) -> u64 {
        self.ends.read().len() as u64
    }

    /// Bytes held by the first `items` items.
    pub(crate) fn size_at(&self, items: u64) -> u64 {
        let ends = self.ends.read();
        let items = items.min(ends.len() as u64) as usize;
        if items == 0 {
            0
        } else {
            ends[items - 1]
        }
    }

    /// Reads item `number`, or `None` if the table does not hold it.
    pub(crate) fn retrieve(&self, number: u64) -> AncientResult<Option<Vec<u8>>> {
        let (start, end) = {
            let ends = self.ends.read();
            let idx = number as usize;
            match ends.get(idx) {
                Some(&end) => {
                    let start = if idx == 0 { 0 } else { ends[idx - 1] };
                    (start, end)
                }
                None => return Ok(None),
            }
        };

        let mut buffer = vec![0u8; (end - start) as usize];
        if !buffer.is_empty() {
            read_exact_at(&self.data, &mut buffer, start)?;
        }
        Ok(Some(buffer))
    }

    /// Writes `blob` as item `number`, dropping any stored items at or
    /// above `number` first.
    ///
    /// Both files are cut back to the logical end of item `number - 1`
    /// before writing, so bytes left by an earlier failed write never end
    /// up inside an indexed item.
    pub(crate) fn append(&self, number: u64, blob: &[u8]) -> AncientResult<()> {
        let _write = self.write.lock();
        let start = {
            let mut ends = self.ends.write();
            if (ends.len() as u64) < number {
                return Err(AncientError::Corrupted(format!(
                    "{} table holds {} items, cannot write item {}",
                    self.category,
                    ends.len(),
                    number
                )));
            }
            ends.truncate(number as usize);
            ends.last().copied().unwrap_or(0)
        };

        let end = start + blob.len() as u64;
        let index_at = number * INDEX_ENTRY_SIZE;
        self.data.set_len(start)?;
        write_all_at(&self.data, blob, start)?;
        self.index.set_len(index_at)?;
        write_all_at(&self.index, &end.to_le_bytes(), index_at)?;

        self.ends.write().push(end);
        Ok(())
    }

    /// Cuts both files down to `items` items, including any unindexed
    /// tail. Does nothing if the table holds fewer items.
    pub(crate) fn truncate(&self, items: u64) -> AncientResult<()> {
        let _write = self.write.lock();
        let data_end = {
            let ends = self.ends.read();
            if items > ends.len() as u64 {
                return Ok(());
            }
            if items == 0 {
                0
            } else {
                ends[items as usize - 1]
            }
        };

        // Index first, so a crash in between leaves only unindexed data.
        self.index.set_len(items * INDEX_ENTRY_SIZE)?;
        self.data.set_len(data_end)?;
        self.ends.write().truncate(items as usize);
        Ok(())
    }

    /// Fsyncs both files.
    pub(crate) fn sync(&self) -> AncientResult<()> {
        self.data.sync_all()?;
        self.index.sync_all()?;
        Ok(())
    }
}

fn open_rw(path: &Path) -> AncientResult<File> {
    Ok(OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?)
}

#[cfg(unix)]
fn read_exact_at(file: &File, buf: &mut [u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.read_exact_at(buf, offset)
}

#[cfg(unix)]
fn write_all_at(file: &File, buf: &[u8], offset: u64) -> io::Result<()> {
    use std::os::unix::fs::FileExt;
    file.write_all_at(buf, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buf: &mut [u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_read(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buf = &mut buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(windows)]
fn write_all_at(file: &File, mut buf: &[u8], mut offset: u64) -> io::Result<()> {
    use std::os::windows::fs::FileExt;
    while !buf.is_empty() {
        match file.seek_write(buf, offset) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => {
                buf = &buf[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::tempdir;

    #[test]
    fn table_create_new() {
        let dir = tempdir().unwrap();
        let table = FreezerTable::open(dir.path(), Category::Header).unwrap();
        assert_eq!(table.items(), 0);
        assert_eq!(table.size_at(0), 0);
        assert!(dir.path().join("header.dat").exists());
        assert!(dir.path().join("header.idx").exists());
    }

    #[test]
    fn table_append_and_retrieve() {
        let dir = tempdir().unwrap();
        let table = FreezerTable::open(dir.path(), Category::Body).unwrap();

        table.append(0, b"hello").unwrap();
        table.append(1, b"").unwrap();
        table.append(2, b" world").unwrap();

        assert_eq!(table.items(), 3);
        assert_eq!(table.size_at(3), 11);
        assert_eq!(table.retrieve(0).unwrap().unwrap(), b"hello");
        assert!(table.retrieve(1).unwrap().unwrap().is_empty());
        assert_eq!(table.retrieve(2).unwrap().unwrap(), b" world");
        assert!(table.retrieve(3).unwrap().is_none());
    }

    #[test]
    fn table_persistence() {
        let dir = tempdir().unwrap();
        {
            let table = FreezerTable::open(dir.path(), Category::Hash).unwrap();
            table.append(0, b"persistent").unwrap();
            table.sync().unwrap();
        }

        let table = FreezerTable::open(dir.path(), Category::Hash).unwrap();
        assert_eq!(table.items(), 1);
        assert_eq!(table.retrieve(0).unwrap().unwrap(), b"persistent");
    }

    #[test]
    fn table_truncate_partial() {
        let dir = tempdir().unwrap();
        let table = FreezerTable::open(dir.path(), Category::Receipts).unwrap();
        table.append(0, b"aa").unwrap();
        table.append(1, b"bbb").unwrap();

        table.truncate(1).unwrap();
        assert_eq!(table.items(), 1);
        assert_eq!(table.size_at(1), 2);
        assert_eq!(std::fs::metadata(dir.path().join("receipts.dat")).unwrap().len(), 2);

        table.append(1, b"c").unwrap();
        assert_eq!(table.retrieve(1).unwrap().unwrap(), b"c");
    }

    #[test]
    fn table_drops_torn_index_entry() {
        let dir = tempdir().unwrap();
        {
            let table = FreezerTable::open(dir.path(), Category::Difficulty).unwrap();
            table.append(0, b"abc").unwrap();
            table.sync().unwrap();
        }

        // Half-written entry plus data that was never indexed.
        let mut index = OpenOptions::new()
            .append(true)
            .open(dir.path().join("td.idx"))
            .unwrap();
        index.write_all(&[7, 0, 0]).unwrap();
        let mut data = OpenOptions::new()
            .append(true)
            .open(dir.path().join("td.dat"))
            .unwrap();
        data.write_all(b"zz").unwrap();

        let table = FreezerTable::open(dir.path(), Category::Difficulty).unwrap();
        assert_eq!(table.items(), 1);
        assert_eq!(table.retrieve(0).unwrap().unwrap(), b"abc");
        assert_eq!(std::fs::metadata(dir.path().join("td.dat")).unwrap().len(), 3);
        assert_eq!(std::fs::metadata(dir.path().join("td.idx")).unwrap().len(), 8);
    }

    #[test]
    fn table_drops_entries_past_data() {
        let dir = tempdir().unwrap();
        {
            let table = FreezerTable::open(dir.path(), Category::Hash).unwrap();
            table.append(0, b"abc").unwrap();
            table.append(1, b"defg").unwrap();
            table.sync().unwrap();
        }
        let data = OpenOptions::new()
            .write(true)
            .open(dir.path().join("hash.dat"))
            .unwrap();
        data.set_len(5).unwrap();

        let table = FreezerTable::open(dir.path(), Category::Hash).unwrap();
        assert_eq!(table.items(), 1);
        assert_eq!(table.size_at(1), 3);
    }

    #[test]
    fn append_overwrites_unindexed_tail() {
        let dir = tempdir().unwrap();
        let table = FreezerTable::open(dir.path(), Category::Body).unwrap();
        table.append(0, b"abc").unwrap();

        // Bytes left behind by a write that failed before its index entry.
        let mut data = OpenOptions::new()
            .append(true)
            .open(dir.path().join("body.dat"))
            .unwrap();
        data.write_all(b"JUNK").unwrap();

        table.append(1, b"xy").unwrap();
        assert_eq!(table.retrieve(0).unwrap().unwrap(), b"abc");
        assert_eq!(table.retrieve(1).unwrap().unwrap(), b"xy");
        assert_eq!(std::fs::metadata(dir.path().join("body.dat")).unwrap().len(), 5);
    }

    #[test]
    fn truncate_at_length_drops_unindexed_tail() {
        let dir = tempdir().unwrap();
        let table = FreezerTable::open(dir.path(), Category::Header).unwrap();
        table.append(0, b"abc").unwrap();

        let mut data = OpenOptions::new()
            .append(true)
            .open(dir.path().join("header.dat"))
            .unwrap();
        data.write_all(b"zz").unwrap();

        table.truncate(1).unwrap();
        assert_eq!(table.items(), 1);
        assert_eq!(std::fs::metadata(dir.path().join("header.dat")).unwrap().len(), 3);
    }

    #[test]
    fn reads_do_not_wait_for_writers() {
        let dir = tempdir().unwrap();
        let table = Arc::new(FreezerTable::open(dir.path(), Category::Hash).unwrap());
        table.append(0, b"frozen").unwrap();

        // Hold the writer side as an in-flight append or sync would.
        let _write = table.write.lock();
        let (tx, rx) = mpsc::channel();
        let reader = Arc::clone(&table);
        std::thread::spawn(move || {
            tx.send(reader.retrieve(0).unwrap()).unwrap();
        });

        let read = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(read.unwrap(), b"frozen");
    }
}

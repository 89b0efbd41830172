//! The block-structured append-only log.
//!
//! The log is a single file of fixed-size blocks. Records pack contiguously
//! inside a block and never straddle a block boundary; the remainder of a
//! block is zero-filled, and four zero bytes where a header would be marks
//! the end of the block's records.
//!
//! Appends update an in-memory view and return an offset synchronously;
//! physical durability happens when the pending write batch is drained with
//! [`BlockLog::flush`]. One mutex guards all mutable state, so at most one
//! physical write+fsync is in flight at a time.

use crate::cache::BlockCache;
use crate::error::{StorageError, StorageResult};
use crate::record;
use crate::stats::{LogStats, StatsFile};
use parking_lot::{Condvar, Mutex};
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Default block size: 64 KiB.
pub const DEFAULT_BLOCK_SIZE: usize = 65536;

/// Default number of decoded blocks kept in the cache.
pub const DEFAULT_CACHE_BLOCKS: usize = 64;

/// Validity check applied to record payloads while healing the tail block.
pub type RecordCheck = Box<dyn Fn(&[u8]) -> bool + Send>;

/// Options for opening a [`BlockLog`].
pub struct LogOptions {
    /// Size of each block in bytes.
    pub block_size: usize,
    /// Maximum number of blocks held in the cache.
    pub cache_blocks: usize,
    /// Optional payload validity check used during tail recovery.
    pub validate: Option<RecordCheck>,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            validate: None,
        }
    }
}

impl LogOptions {
    /// Creates options with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the block size.
    #[must_use]
    pub fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the cache capacity in blocks.
    #[must_use]
    pub fn cache_blocks(mut self, blocks: usize) -> Self {
        self.cache_blocks = blocks;
        self
    }

    /// Sets the payload validity check used during tail recovery.
    #[must_use]
    pub fn validate(mut self, check: RecordCheck) -> Self {
        self.validate = Some(check);
        self
    }
}

impl std::fmt::Debug for LogOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogOptions")
            .field("block_size", &self.block_size)
            .field("cache_blocks", &self.cache_blocks)
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// One entry produced by [`BlockLog::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Global byte offset of the record.
    pub offset: u64,
    /// Record data, or `None` for a tombstone.
    pub data: Option<Vec<u8>>,
    /// Total slot size (header + data + padding).
    pub size: usize,
}

/// Progress snapshot emitted during compaction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompactionProgress {
    /// Fraction of the log processed, in `0.0..=1.0`.
    pub percent: f64,
    /// Whether compaction has finished.
    pub done: bool,
}

/// Final result of a compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompactionResult {
    /// Bytes reclaimed: old file size minus new file size.
    pub size_diff: u64,
    /// Number of tombstone slots removed.
    pub holes_found: usize,
}

struct LogInner {
    file: File,
    block_size: usize,
    /// Global offset where the next record will be placed.
    next_offset: u64,
    /// Offset of the most recently written record.
    since: Option<u64>,
    /// Unflushed blocks: the write queue. Never evicted until drained.
    dirty: BTreeMap<u64, Vec<u8>>,
    cache: BlockCache,
    deleted_bytes: u64,
    stats_dirty: bool,
    compacting: bool,
}

/// An append-only file of fixed-size blocks with in-place logical delete,
/// overwrite, crash recovery, and compaction.
pub struct BlockLog {
    path: PathBuf,
    stats: StatsFile,
    validate: Option<RecordCheck>,
    inner: Mutex<LogInner>,
    compact_done: Condvar,
}

impl BlockLog {
    /// Opens or creates a log at `path`.
    ///
    /// If the file already contains data, the final block is scanned and a
    /// corrupted tail (the residue of an unclean shutdown mid-write) is
    /// zero-filled and fsynced. Interior blocks are never healed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the repair write
    /// fails.
    pub fn open(path: &Path, options: LogOptions) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let block_size = options.block_size;
        let stats = StatsFile::beside(path);
        let deleted_bytes = stats.load().deleted_bytes;

        let (next_offset, since) =
            Self::recover_tail(&mut file, block_size, options.validate.as_deref())?;

        Ok(Self {
            path: path.to_path_buf(),
            stats,
            validate: options.validate,
            inner: Mutex::new(LogInner {
                file,
                block_size,
                next_offset,
                since,
                dirty: BTreeMap::new(),
                cache: BlockCache::new(options.cache_blocks),
                deleted_bytes,
                stats_dirty: false,
                compacting: false,
            }),
            compact_done: Condvar::new(),
        })
    }

    /// Scans the file's last block and heals a corrupted tail.
    ///
    /// Returns `(next_offset, since)`.
    fn recover_tail(
        file: &mut File,
        block_size: usize,
        validate: Option<&(dyn Fn(&[u8]) -> bool + Send)>,
    ) -> StorageResult<(u64, Option<u64>)> {
        let file_len = file.metadata()?.len();
        if file_len == 0 {
            return Ok((0, None));
        }

        let nblocks = file_len.div_ceil(block_size as u64);
        let last_index = nblocks - 1;
        let block_start = last_index * block_size as u64;

        let mut block = vec![0u8; block_size];
        file.seek(SeekFrom::Start(block_start))?;
        let available = (file_len - block_start) as usize;
        file.read_exact(&mut block[..available])?;

        let mut off = 0usize;
        let mut last_record: Option<usize> = None;
        let mut healed = false;

        while off + record::HEADER_SIZE <= block_size && !record::is_eob(&block, off) {
            let (data_len, empty_len) = record::lengths(&block, off);
            let end = off + record::HEADER_SIZE + data_len + empty_len;
            if end > block_size {
                healed = true;
                break;
            }
            if data_len > 0 {
                let rec = record::read(&block, off);
                if let Some(check) = validate {
                    if !check(rec.data) {
                        healed = true;
                        break;
                    }
                }
            }
            last_record = Some(off);
            off = end;
        }

        if healed {
            warn!(
                block = last_index,
                offset = off,
                "corrupted tail record, zero-filling to end of block"
            );
            block[off..].fill(0);
            file.seek(SeekFrom::Start(block_start))?;
            file.write_all(&block)?;
            file.sync_data()?;
        }

        let next_offset = block_start + off as u64;
        let mut since = last_record.map(|o| block_start + o as u64);
        if since.is_none() && last_index > 0 {
            // Healing can blank the whole tail block; the most recent
            // record then lives in an earlier block.
            for index in (0..last_index).rev() {
                let start = index * block_size as u64;
                file.seek(SeekFrom::Start(start))?;
                file.read_exact(&mut block)?;
                if let Some(o) = Self::last_record_in(&block, block_size) {
                    since = Some(start + o as u64);
                    break;
                }
            }
        }
        Ok((next_offset, since))
    }

    /// Returns the in-block offset of the last record in `block`, if any.
    fn last_record_in(block: &[u8], block_size: usize) -> Option<usize> {
        let mut off = 0usize;
        let mut last = None;
        while off + record::HEADER_SIZE <= block_size && !record::is_eob(block, off) {
            let (data_len, empty_len) = record::lengths(block, off);
            let end = off + record::HEADER_SIZE + data_len + empty_len;
            if end > block_size {
                break;
            }
            last = Some(off);
            off = end;
        }
        last
    }

    /// Appends a record and returns its global offset.
    ///
    /// The offset is assigned from the in-memory view immediately; the bytes
    /// become durable on the next [`flush`](Self::flush).
    ///
    /// # Errors
    ///
    /// - [`StorageError::EmptyRecord`] for zero-length data, which would be
    ///   indistinguishable from the end-of-block sentinel.
    /// - [`StorageError::RecordTooLarge`] if the record plus the end-of-block
    ///   marker exceeds the block size.
    /// - [`StorageError::CompactionInProgress`] while a compaction is running.
    pub fn append(&self, data: &[u8]) -> StorageResult<u64> {
        if data.is_empty() {
            return Err(StorageError::EmptyRecord);
        }
        let mut inner = self.inner.lock();
        if inner.compacting {
            return Err(StorageError::CompactionInProgress);
        }

        let size = record::encoded_size(data.len());
        if size + record::EOB_SIZE > inner.block_size {
            return Err(StorageError::RecordTooLarge {
                size: size + record::EOB_SIZE,
                max: inner.block_size,
            });
        }

        let block_size = inner.block_size as u64;
        let mut offset = inner.next_offset;
        let in_block = (offset % block_size) as usize;
        if in_block + size + record::EOB_SIZE > inner.block_size {
            // Current tail block lacks space; the rest stays zero-filled.
            offset = (offset / block_size + 1) * block_size;
        }

        let index = offset / block_size;
        let in_block = (offset % block_size) as usize;
        let block = inner.writable_block(index)?;
        record::write(block, in_block, data, 0);

        inner.next_offset = offset + size as u64;
        inner.since = Some(offset);
        Ok(offset)
    }

    /// Reads the record at `offset`.
    ///
    /// # Errors
    ///
    /// - [`StorageError::OffsetOutOfBounds`] if `offset` is at or past the
    ///   end of the log.
    /// - [`StorageError::InvalidOffset`] if `offset` does not point at a
    ///   record.
    /// - [`StorageError::DeletedRecord`] if the slot is a tombstone.
    pub fn get(&self, offset: u64) -> StorageResult<Vec<u8>> {
        let mut inner = self.inner.lock();
        let view = inner.record_at(offset)?;
        match view {
            SlotView::Live(data) => Ok(data),
            SlotView::Tombstone => Err(StorageError::DeletedRecord { offset }),
        }
    }

    /// Converts the record at `offset` into a tombstone in place.
    ///
    /// The content is zeroed and the slot size preserved; the freed bytes are
    /// counted toward `deleted_bytes` and reclaimed by the next compaction.
    ///
    /// # Errors
    ///
    /// - [`StorageError::CompactionInProgress`] while a compaction is running.
    /// - The same offset errors as [`get`](Self::get); deleting an already
    ///   deleted record reports [`StorageError::DeletedRecord`].
    pub fn del(&self, offset: u64) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        if inner.compacting {
            return Err(StorageError::CompactionInProgress);
        }
        match inner.record_at(offset)? {
            SlotView::Tombstone => Err(StorageError::DeletedRecord { offset }),
            SlotView::Live(_) => {
                let block_size = inner.block_size as u64;
                let index = offset / block_size;
                let in_block = (offset % block_size) as usize;
                let block = inner.writable_block(index)?;
                let slot = {
                    let rec = record::read(block, in_block);
                    rec.size
                };
                record::overwrite_as_empty(block, in_block);
                inner.deleted_bytes += slot as u64;
                inner.stats_dirty = true;
                Ok(())
            }
        }
    }

    /// Replaces the record's data in place, keeping the slot size fixed.
    ///
    /// # Errors
    ///
    /// - [`StorageError::EmptyRecord`] for zero-length data; tombstoning
    ///   goes through [`del`](Self::del) instead.
    /// - [`StorageError::OverwriteTooLarge`] if `data` does not fit within
    ///   the original `data_length + empty_length` capacity.
    /// - [`StorageError::CompactionInProgress`] while a compaction is running.
    /// - The same offset errors as [`get`](Self::get).
    pub fn overwrite(&self, offset: u64, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            return Err(StorageError::EmptyRecord);
        }
        let mut inner = self.inner.lock();
        if inner.compacting {
            return Err(StorageError::CompactionInProgress);
        }
        match inner.record_at(offset)? {
            SlotView::Tombstone => Err(StorageError::DeletedRecord { offset }),
            SlotView::Live(old) => {
                let block_size = inner.block_size as u64;
                let index = offset / block_size;
                let in_block = (offset % block_size) as usize;
                let block = inner.writable_block(index)?;
                let capacity = {
                    let rec = record::read(block, in_block);
                    rec.data_len + rec.empty_len
                };
                if data.len() > capacity {
                    return Err(StorageError::OverwriteTooLarge {
                        size: data.len(),
                        slot: capacity,
                    });
                }
                record::overwrite(block, in_block, data);
                inner.deleted_bytes += (old.len().saturating_sub(data.len())) as u64;
                inner.stats_dirty = true;
                Ok(())
            }
        }
    }

    /// Drains the pending write batch: every dirty block is written at its
    /// position and the file is fsynced once. The stats sidecar is rewritten
    /// if a delete or overwrite happened since the last drain.
    ///
    /// # Errors
    ///
    /// Write and fsync failures are fatal for the drain and are not retried.
    pub fn flush(&self) -> StorageResult<()> {
        let mut inner = self.inner.lock();
        inner.drain()?;
        if inner.stats_dirty {
            self.stats.save(LogStats {
                deleted_bytes: inner.deleted_bytes,
            })?;
            inner.stats_dirty = false;
        }
        Ok(())
    }

    /// Returns an ordered scan over every record slot in the log.
    ///
    /// Entries carry `data: None` for tombstones. The scanner loads one block
    /// at a time and holds the log lock for its lifetime.
    pub fn scan(&self) -> LogScanner<'_> {
        let inner = self.inner.lock();
        LogScanner {
            end: inner.next_offset,
            offset: 0,
            inner,
        }
    }

    /// Rewrites the log to contain only live records, contiguous, then
    /// atomically replaces the old file.
    ///
    /// Pending writes are drained first. A log with zero deleted bytes
    /// short-circuits as a no-op. If another compaction is already running,
    /// this call waits for it and coalesces onto its completion.
    ///
    /// Progress snapshots are delivered to `progress` at a bounded rate,
    /// ending with `percent == 1.0, done == true`.
    ///
    /// # Errors
    ///
    /// Returns an error if draining, writing the replacement file, or the
    /// atomic rename fails.
    pub fn compact(
        &self,
        mut progress: impl FnMut(CompactionProgress),
    ) -> StorageResult<CompactionResult> {
        let live = {
            let mut inner = self.inner.lock();
            while inner.compacting {
                self.compact_done.wait(&mut inner);
            }
            inner.drain()?;

            if inner.deleted_bytes == 0 {
                progress(CompactionProgress {
                    percent: 1.0,
                    done: true,
                });
                return Ok(CompactionResult {
                    size_diff: 0,
                    holes_found: 0,
                });
            }

            inner.compacting = true;
            inner.collect_live()
        };

        // The write queue is empty and `compacting` blocks mutations, so the
        // snapshot stays consistent while the lock is released for the
        // rewrite below.
        let outcome = self.rewrite(&live, &mut progress);

        let mut inner = self.inner.lock();
        let result = match outcome {
            Ok(state) => {
                inner.file = state.file;
                inner.next_offset = state.next_offset;
                inner.since = state.since;
                inner.cache.clear();
                inner.dirty.clear();
                let size_diff = state.old_size.saturating_sub(state.new_size);
                inner.deleted_bytes = 0;
                self.stats.save(LogStats { deleted_bytes: 0 })?;
                inner.stats_dirty = false;
                debug!(
                    size_diff,
                    holes = state.holes_found,
                    "compaction finished"
                );
                Ok(CompactionResult {
                    size_diff,
                    holes_found: state.holes_found,
                })
            }
            Err(e) => Err(e),
        };
        inner.compacting = false;
        drop(inner);
        self.compact_done.notify_all();

        if result.is_ok() {
            progress(CompactionProgress {
                percent: 1.0,
                done: true,
            });
        }
        result
    }

    fn rewrite(
        &self,
        live: &LiveSnapshot,
        progress: &mut impl FnMut(CompactionProgress),
    ) -> StorageResult<RewriteState> {
        let block_size = live.block_size;
        let tmp_path = self.path.with_extension("compact.tmp");
        let mut tmp = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut block = vec![0u8; block_size];
        let mut in_block = 0usize;
        let mut block_start = 0u64;
        let mut since = None;
        let mut written = 0u64;
        let total = live.records.len().max(1);
        let mut last_percent = 0.0f64;

        for (i, data) in live.records.iter().enumerate() {
            let size = record::encoded_size(data.len());
            if in_block + size + record::EOB_SIZE > block_size {
                tmp.write_all(&block)?;
                block.fill(0);
                block_start += block_size as u64;
                in_block = 0;
            }
            record::write(&mut block, in_block, data, 0);
            since = Some(block_start + in_block as u64);
            in_block += size;
            written = block_start + in_block as u64;

            let percent = (i + 1) as f64 / total as f64;
            if percent - last_percent >= 0.05 {
                last_percent = percent;
                progress(CompactionProgress {
                    percent,
                    done: false,
                });
            }
        }
        if in_block > 0 {
            tmp.write_all(&block)?;
        }
        tmp.sync_data()?;

        std::fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)?;
        file.sync_all()?;

        let new_size = file.metadata()?.len();
        Ok(RewriteState {
            file,
            next_offset: written,
            since,
            old_size: live.old_size,
            new_size,
            holes_found: live.holes_found,
        })
    }

    /// Returns the offset of the most recently written record.
    #[must_use]
    pub fn since(&self) -> Option<u64> {
        self.inner.lock().since
    }

    /// Returns the logical size of the log: the offset just past the last
    /// record.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.lock().next_offset
    }

    /// Returns the accumulated deleted-byte count.
    #[must_use]
    pub fn deleted_bytes(&self) -> u64 {
        self.inner.lock().deleted_bytes
    }

    /// Returns the path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the block size the log was opened with.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.inner.lock().block_size
    }

    /// Returns whether a payload validity check was injected at open.
    #[must_use]
    pub fn has_validity_check(&self) -> bool {
        self.validate.is_some()
    }
}

impl std::fmt::Debug for BlockLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockLog")
            .field("path", &self.path)
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// Live-record snapshot taken under the lock before a compaction rewrite.
struct LiveSnapshot {
    records: Vec<Vec<u8>>,
    holes_found: usize,
    old_size: u64,
    block_size: usize,
}

struct RewriteState {
    file: File,
    next_offset: u64,
    since: Option<u64>,
    old_size: u64,
    new_size: u64,
    holes_found: usize,
}

enum SlotView {
    Live(Vec<u8>),
    Tombstone,
}

impl LogInner {
    /// Loads a block for reading, preferring the write queue, then the
    /// cache, then disk.
    fn load_block(&mut self, index: u64) -> StorageResult<Vec<u8>> {
        if let Some(block) = self.dirty.get(&index) {
            return Ok(block.clone());
        }
        if let Some(block) = self.cache.get(index) {
            return Ok(block.clone());
        }
        let block = self.read_block_from_file(index)?;
        self.cache.put(index, block.clone());
        Ok(block)
    }

    fn read_block_from_file(&mut self, index: u64) -> StorageResult<Vec<u8>> {
        let mut block = vec![0u8; self.block_size];
        let start = index * self.block_size as u64;
        let file_len = self.file.metadata()?.len();
        if start < file_len {
            let available = ((file_len - start) as usize).min(self.block_size);
            self.file.seek(SeekFrom::Start(start))?;
            self.file.read_exact(&mut block[..available])?;
        }
        Ok(block)
    }

    /// Returns a mutable reference to a block in the write queue, pulling it
    /// from the cache or disk if it is not already dirty.
    fn writable_block(&mut self, index: u64) -> StorageResult<&mut Vec<u8>> {
        if !self.dirty.contains_key(&index) {
            let block = if let Some(cached) = self.cache.get(index) {
                cached.clone()
            } else {
                self.read_block_from_file(index)?
            };
            self.dirty.insert(index, block);
        }
        Ok(self.dirty.get_mut(&index).unwrap())
    }

    /// Decodes the slot at `offset`, with full offset validation.
    fn record_at(&mut self, offset: u64) -> StorageResult<SlotView> {
        if offset >= self.next_offset {
            return Err(StorageError::OffsetOutOfBounds {
                offset,
                size: self.next_offset,
            });
        }
        let block_size = self.block_size;
        let in_block = (offset % block_size as u64) as usize;
        if in_block + record::HEADER_SIZE > block_size {
            return Err(StorageError::InvalidOffset { offset });
        }
        let block = self.load_block(offset / block_size as u64)?;
        if record::is_eob(&block, in_block) {
            return Err(StorageError::InvalidOffset { offset });
        }
        let (data_len, empty_len) = record::lengths(&block, in_block);
        if in_block + record::HEADER_SIZE + data_len + empty_len > block_size {
            return Err(StorageError::InvalidOffset { offset });
        }
        let rec = record::read(&block, in_block);
        if rec.is_empty() {
            Ok(SlotView::Tombstone)
        } else {
            Ok(SlotView::Live(rec.data.to_vec()))
        }
    }

    /// Writes every dirty block at its position and fsyncs once.
    fn drain(&mut self) -> StorageResult<()> {
        if self.dirty.is_empty() {
            return Ok(());
        }
        let block_size = self.block_size as u64;
        let dirty = std::mem::take(&mut self.dirty);
        for (index, block) in dirty {
            self.file.seek(SeekFrom::Start(index * block_size))?;
            self.file.write_all(&block)?;
            self.cache.put(index, block);
        }
        self.file.sync_data()?;
        debug!("write batch drained");
        Ok(())
    }

    /// Collects every live record in offset order, for compaction.
    fn collect_live(&mut self) -> LiveSnapshot {
        let mut records = Vec::new();
        let mut holes = 0usize;
        let block_size = self.block_size;
        let end = self.next_offset;

        let mut offset = 0u64;
        while offset < end {
            let index = offset / block_size as u64;
            let in_block = (offset % block_size as u64) as usize;
            let block = match self.load_block(index) {
                Ok(b) => b,
                Err(_) => break,
            };
            if in_block + record::HEADER_SIZE > block_size
                || record::is_eob(&block, in_block)
            {
                offset = (index + 1) * block_size as u64;
                continue;
            }
            let rec = record::read(&block, in_block);
            if rec.is_empty() {
                holes += 1;
            } else {
                records.push(rec.data.to_vec());
            }
            offset += rec.size as u64;
        }

        let old_size = end.div_ceil(block_size as u64) * block_size as u64;
        LiveSnapshot {
            records,
            holes_found: holes,
            old_size,
            block_size,
        }
    }
}

/// Streaming, ordered scanner over all record slots in the log.
///
/// Produced by [`BlockLog::scan`]; loads one block at a time. The scanner
/// holds the log lock, so drop it before mutating the log.
pub struct LogScanner<'a> {
    inner: parking_lot::MutexGuard<'a, LogInner>,
    end: u64,
    offset: u64,
}

impl Iterator for LogScanner<'_> {
    type Item = StorageResult<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.offset >= self.end {
                return None;
            }
            let block_size = self.inner.block_size;
            let index = self.offset / block_size as u64;
            let in_block = (self.offset % block_size as u64) as usize;

            let block = match self.inner.load_block(index) {
                Ok(b) => b,
                Err(e) => {
                    self.offset = self.end;
                    return Some(Err(e));
                }
            };

            if in_block + record::HEADER_SIZE > block_size || record::is_eob(&block, in_block) {
                // Zero gap at the block tail; continue in the next block.
                self.offset = (index + 1) * block_size as u64;
                continue;
            }

            let rec = record::read(&block, in_block);
            let entry = ScanEntry {
                offset: self.offset,
                data: if rec.is_empty() {
                    None
                } else {
                    Some(rec.data.to_vec())
                },
                size: rec.size,
            };
            self.offset += rec.size as u64;
            return Some(Ok(entry));
        }
    }
}

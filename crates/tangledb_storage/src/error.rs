//! Error types for log storage operations.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur while operating on the block log.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The offset does not point at the start of a record.
    #[error("invalid offset: {offset}")]
    InvalidOffset {
        /// The offending offset.
        offset: u64,
    },

    /// The offset lies beyond the end of the log.
    #[error("offset out of bounds: offset {offset}, log size {size}")]
    OffsetOutOfBounds {
        /// The requested offset.
        offset: u64,
        /// The current log size.
        size: u64,
    },

    /// The record at this offset has been deleted.
    #[error("record at offset {offset} has been deleted")]
    DeletedRecord {
        /// Offset of the tombstone.
        offset: u64,
    },

    /// Zero-length records are indistinguishable from block sentinels.
    #[error("record data should not be empty")]
    EmptyRecord,

    /// The record does not fit in a single block.
    #[error("record too large: {size} bytes, max {max}")]
    RecordTooLarge {
        /// Encoded record size including the end-of-block marker.
        size: usize,
        /// The block size limit.
        max: usize,
    },

    /// Overwrite data exceeds the existing record slot.
    #[error("overwrite should not be larger than existing data: {size} bytes into a {slot} byte slot")]
    OverwriteTooLarge {
        /// Size of the replacement data.
        size: usize,
        /// Capacity of the existing slot.
        slot: usize,
    },

    /// The operation cannot run while a compaction is in progress.
    #[error("compaction in progress")]
    CompactionInProgress,

    /// The log file is corrupted.
    #[error("log corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }
}

//! # TangleDB Storage
//!
//! Block-structured append-only record log for TangleDB.
//!
//! This crate is an opaque byte store: it persists records into a file of
//! fixed-size blocks and knows nothing about messages, tangles, or
//! signatures. TangleDB core owns all format interpretation above the
//! record level.
//!
//! ## Design
//!
//! - Records pack contiguously inside a block and never straddle blocks
//! - Logical delete and overwrite happen in place, preserving slot sizes
//! - Appends are batched in memory and drained with an explicit [`BlockLog::flush`]
//! - A corrupted tail block self-heals on open; interior corruption does not
//! - Compaction rewrites live records contiguously and atomically swaps files
//!
//! ## Example
//!
//! ```no_run
//! use tangledb_storage::{BlockLog, LogOptions};
//! use std::path::Path;
//!
//! let log = BlockLog::open(Path::new("data.log"), LogOptions::default()).unwrap();
//! let offset = log.append(b"hello world").unwrap();
//! assert_eq!(log.get(offset).unwrap(), b"hello world");
//! log.flush().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod error;
mod log;
pub mod record;
mod stats;

pub use cache::BlockCache;
pub use error::{StorageError, StorageResult};
pub use log::{
    BlockLog, CompactionProgress, CompactionResult, LogOptions, LogScanner, RecordCheck,
    ScanEntry, DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS,
};
pub use stats::{LogStats, StatsFile};

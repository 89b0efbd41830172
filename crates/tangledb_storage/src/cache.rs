//! Bounded least-recently-used cache of decoded blocks.

use std::collections::{HashMap, VecDeque};

/// An LRU cache mapping block indexes to block buffers.
///
/// Entries are refreshed on every access and write; the least recently used
/// entry is evicted once the cache exceeds its capacity. The cache is owned
/// by the log's write lock and needs no internal synchronization.
#[derive(Debug)]
pub struct BlockCache {
    capacity: usize,
    blocks: HashMap<u64, Vec<u8>>,
    recency: VecDeque<u64>,
}

impl BlockCache {
    /// Creates a cache holding at most `capacity` blocks.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            blocks: HashMap::new(),
            recency: VecDeque::new(),
        }
    }

    /// Returns the cached block, refreshing its recency.
    pub fn get(&mut self, index: u64) -> Option<&Vec<u8>> {
        if self.blocks.contains_key(&index) {
            self.touch(index);
        }
        self.blocks.get(&index)
    }

    /// Returns a mutable reference to the cached block, refreshing its recency.
    pub fn get_mut(&mut self, index: u64) -> Option<&mut Vec<u8>> {
        if self.blocks.contains_key(&index) {
            self.touch(index);
        }
        self.blocks.get_mut(&index)
    }

    /// Inserts or replaces a block, evicting the least recently used entry
    /// if the cache is full.
    pub fn put(&mut self, index: u64, block: Vec<u8>) {
        if self.blocks.insert(index, block).is_some() {
            self.touch(index);
        } else {
            self.recency.push_back(index);
            while self.blocks.len() > self.capacity {
                if let Some(evicted) = self.recency.pop_front() {
                    self.blocks.remove(&evicted);
                }
            }
        }
    }

    /// Removes every cached block.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.recency.clear();
    }

    /// Returns the number of cached blocks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Returns whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn touch(&mut self, index: u64) {
        if let Some(pos) = self.recency.iter().position(|&i| i == index) {
            self.recency.remove(pos);
        }
        self.recency.push_back(index);
    }
}

//! Database configuration.

use crate::protocol::{ProtocolSpec, PROTOCOL_V4};
use tangledb_storage::{DEFAULT_BLOCK_SIZE, DEFAULT_CACHE_BLOCKS};

/// Configuration for opening a database.
#[derive(Debug, Clone)]
pub struct Config {
    /// Protocol version the database speaks.
    pub protocol: ProtocolSpec,

    /// Block size of the backing log, in bytes.
    pub block_size: usize,

    /// Number of decoded blocks the log keeps cached.
    pub cache_blocks: usize,

    /// Whether opening a path with no existing log file creates one.
    pub create_if_missing: bool,

    /// Whether to run each decoded record through message parsing during
    /// tail recovery at open time.
    pub validate_on_open: bool,

    /// How many depths below a tangle's frontier ghost ids are retained.
    pub ghost_span: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_V4,
            block_size: DEFAULT_BLOCK_SIZE,
            cache_blocks: DEFAULT_CACHE_BLOCKS,
            create_if_missing: true,
            validate_on_open: true,
            ghost_span: 32,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the protocol version.
    #[must_use]
    pub const fn protocol(mut self, spec: ProtocolSpec) -> Self {
        self.protocol = spec;
        self
    }

    /// Sets the log block size.
    #[must_use]
    pub const fn block_size(mut self, size: usize) -> Self {
        self.block_size = size;
        self
    }

    /// Sets the block cache capacity.
    #[must_use]
    pub const fn cache_blocks(mut self, blocks: usize) -> Self {
        self.cache_blocks = blocks;
        self
    }

    /// Sets whether a missing log file is created on open.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether records are parse-checked during tail recovery.
    #[must_use]
    pub const fn validate_on_open(mut self, value: bool) -> Self {
        self.validate_on_open = value;
        self
    }

    /// Sets the ghost retention span.
    #[must_use]
    pub const fn ghost_span(mut self, span: u64) -> Self {
        self.ghost_span = span;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::PROTOCOL_V3;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.protocol.version, 4);
        assert_eq!(config.block_size, DEFAULT_BLOCK_SIZE);
        assert!(config.validate_on_open);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .protocol(PROTOCOL_V3)
            .block_size(4096)
            .cache_blocks(8)
            .create_if_missing(false)
            .validate_on_open(false);

        assert_eq!(config.protocol.version, 3);
        assert_eq!(config.block_size, 4096);
        assert_eq!(config.cache_blocks, 8);
        assert!(!config.create_if_missing);
        assert!(!config.validate_on_open);
    }
}

//! Deleted-byte accounting persisted beside the log file.
//!
//! The sidecar keeps `deleted_bytes` across restarts so compaction decisions
//! do not require a full log scan on open. It is rewritten after every flush
//! that followed a delete or overwrite, and after every compaction.

use crate::error::StorageResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk shape of the stats sidecar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogStats {
    /// Total bytes occupied by deleted or shrunk record content.
    #[serde(rename = "deletedBytes")]
    pub deleted_bytes: u64,
}

/// Persists [`LogStats`] to a JSON companion file.
#[derive(Debug)]
pub struct StatsFile {
    path: PathBuf,
}

impl StatsFile {
    /// Creates a stats file handle for the log at `log_path`.
    ///
    /// The sidecar lives next to the log with a `.stats` extension appended.
    #[must_use]
    pub fn beside(log_path: &Path) -> Self {
        let mut name = log_path.as_os_str().to_os_string();
        name.push(".stats");
        Self { path: name.into() }
    }

    /// Loads stats from disk, defaulting to zero when the sidecar is missing
    /// or unreadable. A damaged sidecar only costs accounting accuracy, so it
    /// is not a fatal condition.
    #[must_use]
    pub fn load(&self) -> LogStats {
        match fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(_) => LogStats::default(),
        }
    }

    /// Writes stats to disk via a temp file and atomic rename.
    pub fn save(&self, stats: LogStats) -> StorageResult<()> {
        let bytes = serde_json::to_vec(&stats).map_err(std::io::Error::other)?;
        let tmp = self.path.with_extension("stats.tmp");
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Removes the sidecar file if present.
    pub fn remove(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the sidecar path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatsFile::beside(&dir.path().join("log.bin"));

        stats.save(LogStats { deleted_bytes: 42 }).unwrap();
        assert_eq!(stats.load().deleted_bytes, 42);
    }

    #[test]
    fn missing_sidecar_defaults_to_zero() {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatsFile::beside(&dir.path().join("log.bin"));
        assert_eq!(stats.load(), LogStats::default());
    }

    #[test]
    fn sidecar_is_json_with_stable_key() {
        let dir = tempfile::tempdir().unwrap();
        let stats = StatsFile::beside(&dir.path().join("log.bin"));
        stats.save(LogStats { deleted_bytes: 7 }).unwrap();

        let raw = std::fs::read_to_string(stats.path()).unwrap();
        assert_eq!(raw, r#"{"deletedBytes":7}"#);
    }
}

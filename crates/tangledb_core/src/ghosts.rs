//! Ghost tracking for deleted messages.
//!
//! When a message is physically deleted, its id lingers as a "ghost" so a
//! replication layer can recognize the id without re-fetching the content.
//! Ghosts are kept per tangle root and pruned once they fall more than a
//! configured span behind the tangle's frontier.

use crate::error::CoreResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Persists and recalls ghost ids per tangle root.
pub trait GhostStore: Send + Sync {
    /// Records `id` at `depth` as a ghost of tangle `root`, pruning ghosts
    /// deeper than `span` below `max_depth`.
    ///
    /// # Errors
    ///
    /// Fails on I/O or codec errors from the backing store.
    fn save(&self, root: &str, id: &str, depth: u64, max_depth: u64, span: u64) -> CoreResult<()>;

    /// Returns the ghost ids recorded for tangle `root`, sorted ascending.
    ///
    /// # Errors
    ///
    /// Fails on I/O or codec errors from the backing store.
    fn read(&self, root: &str) -> CoreResult<Vec<String>>;
}

/// File-backed ghost store: one JSON object per tangle root mapping
/// ghost id to depth.
#[derive(Debug)]
pub struct GhostFile {
    dir: PathBuf,
}

impl GhostFile {
    /// Creates a store rooted at `dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Fails if the directory cannot be created.
    pub fn open(dir: impl AsRef<Path>) -> CoreResult<Self> {
        fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    fn path_for(&self, root: &str) -> PathBuf {
        self.dir.join(format!("{root}.json"))
    }

    fn load(&self, root: &str) -> CoreResult<BTreeMap<String, u64>> {
        let path = self.path_for(root);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let bytes = fs::read(&path)?;
        let value: Value = serde_json::from_slice(&bytes)?;
        let mut map = BTreeMap::new();
        if let Value::Object(entries) = value {
            for (id, depth) in entries {
                if let Some(depth) = depth.as_u64() {
                    map.insert(id, depth);
                }
            }
        }
        Ok(map)
    }

    fn store(&self, root: &str, map: &BTreeMap<String, u64>) -> CoreResult<()> {
        let path = self.path_for(root);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec(map)?)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

impl GhostStore for GhostFile {
    fn save(&self, root: &str, id: &str, depth: u64, max_depth: u64, span: u64) -> CoreResult<()> {
        let mut map = self.load(root)?;
        map.insert(id.to_string(), depth);
        let horizon = max_depth.saturating_sub(span);
        map.retain(|_, d| *d >= horizon);
        self.store(root, &map)
    }

    fn read(&self, root: &str) -> CoreResult<Vec<String>> {
        Ok(self.load(root)?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn save_and_read_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = GhostFile::open(dir.path().join("ghosts")).unwrap();

        store.save("rootA", "m1", 3, 10, 20).unwrap();
        store.save("rootA", "m2", 5, 10, 20).unwrap();
        store.save("rootB", "m9", 1, 1, 20).unwrap();

        assert_eq!(store.read("rootA").unwrap(), vec!["m1", "m2"]);
        assert_eq!(store.read("rootB").unwrap(), vec!["m9"]);
        assert!(store.read("rootC").unwrap().is_empty());
    }

    #[test]
    fn ghosts_behind_the_horizon_are_pruned() {
        let dir = TempDir::new().unwrap();
        let store = GhostFile::open(dir.path().join("ghosts")).unwrap();

        store.save("root", "old", 2, 10, 5).unwrap();
        // old is at depth 2, horizon moves to 100-5=95 on the next save
        store.save("root", "recent", 99, 100, 5).unwrap();

        assert_eq!(store.read("root").unwrap(), vec!["recent"]);
    }

    #[test]
    fn reload_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ghosts");
        GhostFile::open(&path)
            .unwrap()
            .save("root", "m1", 1, 1, 10)
            .unwrap();

        let reopened = GhostFile::open(&path).unwrap();
        assert_eq!(reopened.read("root").unwrap(), vec!["m1"]);
    }
}

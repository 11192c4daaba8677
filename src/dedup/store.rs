//! Optional on-disk fingerprint store.
//!
//! Best-effort: the store only helps when the tracker cannot be asked for an
//! issue's existing tags. Remote tags always win when they are available.

use crate::error::Result;
use crate::util::write_atomic;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

const STORE_VERSION: u32 = 1;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    version: Option<u32>,
    #[serde(default)]
    hashes: Vec<String>,
}

/// Set of full fingerprints persisted as `{"version":1,"hashes":[...]}`.
#[derive(Debug, Clone)]
pub struct FingerprintStore {
    path: PathBuf,
    hashes: BTreeSet<String>,
    dirty: bool,
}

impl FingerprintStore {
    /// Load the store, degrading to an empty one on any read or parse error.
    #[must_use]
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let hashes = match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) => {
                    if file.version.is_none() {
                        tracing::debug!(path = %path.display(), "Reading unversioned fingerprint store");
                    }
                    file.hashes.into_iter().collect()
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable fingerprint store");
                    BTreeSet::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeSet::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable fingerprint store");
                BTreeSet::new()
            }
        };

        Self {
            path,
            hashes,
            dirty: false,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &str) -> bool {
        self.hashes.contains(fingerprint)
    }

    pub fn insert(&mut self, fingerprint: impl Into<String>) -> bool {
        let added = self.hashes.insert(fingerprint.into());
        self.dirty |= added;
        added
    }

    pub fn remove(&mut self, fingerprint: &str) -> bool {
        let removed = self.hashes.remove(fingerprint);
        self.dirty |= removed;
        removed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.hashes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hashes.is_empty()
    }

    /// Drop every fingerprint. Returns how many were removed.
    pub fn clear(&mut self) -> usize {
        let count = self.hashes.len();
        self.hashes.clear();
        self.dirty |= count > 0;
        count
    }

    /// Write the store if it changed since load.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let file = StoreFile {
            version: Some(STORE_VERSION),
            hashes: self.hashes.iter().cloned().collect(),
        };
        let json = serde_json::to_vec_pretty(&file)?;
        write_atomic(&self.path, &json)?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), count = self.hashes.len(), "Saved fingerprint store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = FingerprintStore::load(temp.path().join("none.json"));
        assert!(store.is_empty());
    }

    #[test]
    fn save_and_reload() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hashes.json");

        let mut store = FingerprintStore::load(&path);
        assert!(store.insert("aaa"));
        assert!(!store.insert("aaa"));
        store.insert("bbb");
        store.save().unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
        assert_eq!(raw["hashes"], serde_json::json!(["aaa", "bbb"]));

        let mut reloaded = FingerprintStore::load(&path);
        assert!(reloaded.contains("aaa"));
        assert!(reloaded.remove("aaa"));
        assert_eq!(reloaded.len(), 1);
    }

    #[test]
    fn legacy_shape_is_accepted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hashes.json");
        fs::write(&path, r#"{"hashes": ["abc"]}"#).unwrap();
        assert!(FingerprintStore::load(&path).contains("abc"));
    }

    #[test]
    fn corrupt_file_degrades_to_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("hashes.json");
        fs::write(&path, "{not json").unwrap();
        assert!(FingerprintStore::load(&path).is_empty());
    }

    #[test]
    fn clear_counts_removed() {
        let temp = TempDir::new().unwrap();
        let mut store = FingerprintStore::load(temp.path().join("h.json"));
        store.insert("a");
        store.insert("b");
        assert_eq!(store.clear(), 2);
        assert!(store.is_empty());
    }
}

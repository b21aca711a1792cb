//! Durable key-value slots — the per-tab session slot and the per-browser
//! visitor marker both live behind [`KeyValueStore`].
//!
//! Writes are plain read-then-write with last writer wins; two processes
//! sharing a [`FileStore`] directory can overwrite each other.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::error::{ShowcaseError, ShowcaseResult};

/// String-keyed slot storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> ShowcaseResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> ShowcaseResult<()>;
    fn remove(&self, key: &str) -> ShowcaseResult<()>;
}

/// Process-lifetime storage, the analogue of a per-tab slot.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> ShowcaseResult<Option<String>> {
        Ok(self.slots.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> ShowcaseResult<()> {
        self.slots.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> ShowcaseResult<()> {
        self.slots.lock().remove(key);
        Ok(())
    }
}

/// One file per key under a directory; survives restarts.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> ShowcaseResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "file store opened");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> ShowcaseResult<PathBuf> {
        if key.is_empty() {
            return Err(ShowcaseError::Storage("empty storage key".into()));
        }
        Ok(self.dir.join(format!("{}.slot", encode_key(key))))
    }
}

/// Map a key to a file stem one-to-one: ASCII alphanumerics and `-` pass
/// through, every other byte (including `_`) becomes `_XX` hex.
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            out.push(char::from(byte));
        } else {
            // Writing to a String cannot fail.
            let _ = write!(out, "_{byte:02X}");
        }
    }
    out
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> ShowcaseResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> ShowcaseResult<()> {
        let path = self.path_for(key)?;
        std::fs::write(path, value)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> ShowcaseResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Convenience: shared in-memory store.
pub fn memory_store() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").unwrap().as_deref(), Some("v2"));
        assert_eq!(store.len(), 1);
        store.remove("k").unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = FileStore::open(dir.path()).unwrap();
            store.set("showcase_session", "{\"a\":1}").unwrap();
        }
        let store = FileStore::open(dir.path()).unwrap();
        assert_eq!(
            store.get("showcase_session").unwrap().as_deref(),
            Some("{\"a\":1}")
        );
        store.remove("showcase_session").unwrap();
        assert!(store.get("showcase_session").unwrap().is_none());
        // Removing a missing key is not an error.
        store.remove("showcase_session").unwrap();
    }

    #[test]
    fn test_file_store_sanitizes_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("../escape", "x").unwrap();
        assert!(dir.path().join("_2E_2E_2Fescape.slot").exists());
        assert!(store.set("", "x").is_err());
    }

    #[test]
    fn test_file_store_distinct_keys_distinct_slots() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).unwrap();
        store.set("a.b", "first").unwrap();
        assert!(store.get("a_b").unwrap().is_none());

        store.set("a_b", "second").unwrap();
        store.set("a_5Fb", "third").unwrap();
        assert_eq!(store.get("a.b").unwrap().as_deref(), Some("first"));
        assert_eq!(store.get("a_b").unwrap().as_deref(), Some("second"));
        assert_eq!(store.get("a_5Fb").unwrap().as_deref(), Some("third"));
    }

    #[test]
    fn test_encode_key() {
        assert_eq!(encode_key("showcase-session1"), "showcase-session1");
        assert_eq!(encode_key("a_b"), "a_5Fb");
        assert_eq!(encode_key("a.b"), "a_2Eb");
        assert_eq!(encode_key("é"), "_C3_A9");
    }
}

//! # Queue Storage
//!
//! Durable key-value storage seam for the sync queue.
//!
//! ## Why a Trait?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storage Seam                                     │
//! │                                                                         │
//! │   SyncQueue ──► dyn KeyValueStore ──┬──► JsonFileStore  (production)   │
//! │                                     └──► MemoryStore    (tests)        │
//! │                                                                         │
//! │  The queue persists its full item list as one JSON document after      │
//! │  every mutation. Whatever survives a process kill is the queue; the    │
//! │  host app picks the backing store, the queue only sees get/set.        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

// =============================================================================
// Key-Value Store Trait
// =============================================================================

/// Minimal durable string store.
///
/// Implementations must be safe to call from multiple tasks; the queue
/// serializes its own writes, but stats readers may race a drain.
pub trait KeyValueStore: Send + Sync {
    /// Reads the value stored under `key`, if any.
    fn get(&self, key: &str) -> SyncResult<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> SyncResult<()>;

    /// Removes `key` if present.
    fn remove(&self, key: &str) -> SyncResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Persistence("memory store poisoned".into()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Persistence("memory store poisoned".into()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| SyncError::Persistence("memory store poisoned".into()))?;
        entries.remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

/// File-backed store: one file per key under a base directory.
///
/// ## Crash Safety
/// Writes go to a `.tmp` sibling first, then rename over the target.
/// Rename is atomic on the filesystems we run on, so a power cut leaves
/// either the old value or the new one, never a torn file.
#[derive(Debug)]
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Creates a store rooted at `base_dir`, creating it if needed.
    pub fn new(base_dir: impl Into<PathBuf>) -> SyncResult<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(JsonFileStore { base_dir })
    }

    /// Default store location under the platform data directory.
    pub fn default_location() -> SyncResult<Self> {
        let dirs = directories::ProjectDirs::from("com", "cedar", "pos")
            .ok_or_else(|| SyncError::Persistence("No data directory available".into()))?;
        Self::new(dirs.data_dir().join("queue"))
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are internal constants, not user input; a simple sanitize
        // keeps path traversal out regardless.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.json"))
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> SyncResult<Option<String>> {
        let path = self.path_for(key);
        match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> SyncResult<()> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> SyncResult<()> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("queue").unwrap(), None);

        store.set("queue", r#"{"items":[]}"#).unwrap();
        assert_eq!(store.get("queue").unwrap().unwrap(), r#"{"items":[]}"#);

        store.remove("queue").unwrap();
        assert_eq!(store.get("queue").unwrap(), None);
    }

    #[test]
    fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();

        assert_eq!(store.get("queue").unwrap(), None);
        store.set("queue", "payload").unwrap();
        assert_eq!(store.get("queue").unwrap().unwrap(), "payload");

        // Overwrite replaces, no append
        store.set("queue", "payload-2").unwrap();
        assert_eq!(store.get("queue").unwrap().unwrap(), "payload-2");

        // Removing a missing key is fine
        store.remove("queue").unwrap();
        store.remove("queue").unwrap();
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::new(dir.path()).unwrap();
            store.set("queue", "persisted").unwrap();
        }
        let reopened = JsonFileStore::new(dir.path()).unwrap();
        assert_eq!(reopened.get("queue").unwrap().unwrap(), "persisted");
    }

    #[test]
    fn test_key_sanitization() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path()).unwrap();
        store.set("../escape", "x").unwrap();
        // The file landed inside the base dir, not above it
        assert!(store.get("../escape").unwrap().is_some());
        assert!(!dir.path().parent().unwrap().join("escape.json").exists());
    }
}

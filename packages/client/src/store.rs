// ABOUTME: Durable key-value storage for session, meal history and endpoint override
// ABOUTME: File-backed store with atomic per-key writes plus an in-memory variant for tests

use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::types::UserId;

/// Typed storage keys
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Current authenticated user
    Session,
    /// Meal history snapshot for one user
    MealHistory(UserId),
    /// Most recent analysis result
    LastAnalysis,
    /// User-chosen backend URL
    EndpointOverride,
}

impl StoreKey {
    /// File name backing this key. User ids are hex-encoded so they can never
    /// form a path separator or a relative component.
    pub fn file_name(&self) -> String {
        match self {
            StoreKey::Session => "session.json".to_string(),
            StoreKey::MealHistory(user_id) => {
                format!("meals-{}.json", hex::encode(user_id.as_str()))
            }
            StoreKey::LastAnalysis => "last-analysis.json".to_string(),
            StoreKey::EndpointOverride => "endpoint.json".to_string(),
        }
    }
}

/// Process-wide persisted state
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`
    fn read(&self, key: &StoreKey) -> ClientResult<Option<String>>;

    /// Replace the value stored under `key`. Either the old or the new value
    /// survives a crash, never a partial write.
    fn write(&self, key: &StoreKey, value: &str) -> ClientResult<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &StoreKey) -> ClientResult<()>;
}

/// Read and decode a JSON value. Malformed data yields `CorruptPersistedState`.
pub fn read_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &StoreKey,
) -> ClientResult<Option<T>> {
    match store.read(key)? {
        Some(raw) => serde_json::from_str(&raw).map(Some).map_err(|e| {
            ClientError::CorruptPersistedState(format!("{}: {}", key.file_name(), e))
        }),
        None => Ok(None),
    }
}

/// Encode and write a JSON value
pub fn write_json<T: Serialize>(
    store: &dyn KeyValueStore,
    key: &StoreKey,
    value: &T,
) -> ClientResult<()> {
    let raw = serde_json::to_string(value)
        .map_err(|e| ClientError::Storage(format!("Failed to serialize {}: {}", key.file_name(), e)))?;
    store.write(key, &raw)
}

/// Store that keeps one JSON file per key inside a directory
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    temp_seq: AtomicU64,
}

impl FileStore {
    /// Open (and create if needed) a store rooted at `root`
    pub fn open(root: impl Into<PathBuf>) -> ClientResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            ClientError::Storage(format!(
                "Failed to create data dir {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root,
            temp_seq: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &StoreKey) -> PathBuf {
        self.root.join(key.file_name())
    }

    /// Unique per write so concurrent writers to one key never share a file
    fn temp_path_for(&self, key: &StoreKey) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.root.join(format!(
            ".{}.{}.{}.tmp",
            key.file_name(),
            std::process::id(),
            seq
        ))
    }
}

impl KeyValueStore for FileStore {
    fn read(&self, key: &StoreKey) -> ClientResult<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            // Invalid UTF-8 is corrupt data, not an I/O failure
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => Err(
                ClientError::CorruptPersistedState(format!("{}: {}", key.file_name(), e)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &StoreKey, value: &str) -> ClientResult<()> {
        let path = self.path_for(key);
        let temp_path = self.temp_path_for(key);

        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &path)?;

        debug!("Persisted {} ({} bytes)", key.file_name(), value.len());
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> ClientResult<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Non-durable store for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &StoreKey) -> ClientResult<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &StoreKey, value: &str) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.clone(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &StoreKey) -> ClientResult<()> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_history_key_is_path_safe() {
        let key = StoreKey::MealHistory(UserId::new("../../etc/passwd"));
        let name = key.file_name();
        assert!(!name.contains('/'));
        assert!(!name.contains(".."));
        assert!(name.starts_with("meals-"));
    }

    #[test]
    fn test_history_keys_are_distinct_per_user() {
        let a = StoreKey::MealHistory(UserId::new("a"));
        let b = StoreKey::MealHistory(UserId::new("b"));
        assert_ne!(a.file_name(), b.file_name());
    }

    #[test]
    fn test_file_store_round_trip_and_remove() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path().join("data")).unwrap();

        assert_eq!(store.read(&StoreKey::Session).unwrap(), None);

        store.write(&StoreKey::Session, "{\"a\":1}").unwrap();
        assert_eq!(
            store.read(&StoreKey::Session).unwrap().as_deref(),
            Some("{\"a\":1}")
        );

        store.write(&StoreKey::Session, "{\"a\":2}").unwrap();
        assert_eq!(
            store.read(&StoreKey::Session).unwrap().as_deref(),
            Some("{\"a\":2}")
        );

        store.remove(&StoreKey::Session).unwrap();
        assert_eq!(store.read(&StoreKey::Session).unwrap(), None);

        // Removing again is fine
        store.remove(&StoreKey::Session).unwrap();
    }

    #[test]
    fn test_file_store_leaves_no_temp_files() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileStore::open(temp_dir.path()).unwrap();
        store.write(&StoreKey::LastAnalysis, "{}").unwrap();

        let names: Vec<String> = fs::read_dir(temp_dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["last-analysis.json".to_string()]);
    }

    #[test]
    fn test_read_json_reports_corruption() {
        let store = MemoryStore::new();
        store.write(&StoreKey::Session, "not json").unwrap();

        let result: ClientResult<Option<serde_json::Value>> =
            read_json(&store, &StoreKey::Session);
        assert!(matches!(result, Err(ClientError::CorruptPersistedState(_))));
    }

    #[test]
    fn test_json_helpers_round_trip() {
        let store = MemoryStore::new();
        write_json(&store, &StoreKey::EndpointOverride, &"https://api.example.com").unwrap();
        let value: Option<String> = read_json(&store, &StoreKey::EndpointOverride).unwrap();
        assert_eq!(value.as_deref(), Some("https://api.example.com"));
    }
}

//! Key-value stores backing the cache.
//!
//! The cache shares its store with unrelated state, so stores know nothing
//! about prefixes or expiry. They hold opaque strings.
//!
//! # File format
//!
//! [`JsonFileStore`] keeps every entry in one JSON file:
//!
//! ```json
//! {
//!   "version": "1",
//!   "entries": {
//!     "OrgAudit.apex-classes": "zstd:KLUv/QBY..."
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;

/// Store file format version. Increment when the layout changes.
const STORE_VERSION: &str = "1";

/// String-keyed persistent state shared by the cache and other owners.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: String) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
    /// Remove every key, including ones the cache does not own.
    fn clear(&self) -> Result<(), StoreError>;
    fn keys(&self) -> Result<Vec<String>, StoreError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Recovering from poisoned store mutex");
            poisoned.into_inner()
        }
    }
}

fn used_bytes(entries: &BTreeMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// Reject a write that would push the store past `capacity` bytes.
fn check_capacity(
    entries: &BTreeMap<String, String>,
    capacity: Option<usize>,
    key: &str,
    value: &str,
) -> Result<(), StoreError> {
    let Some(capacity) = capacity else {
        return Ok(());
    };
    let previous = entries.get(key).map_or(0, |v| key.len() + v.len());
    let required = used_bytes(entries) - previous + key.len() + value.len();
    if required > capacity {
        return Err(StoreError::CapacityExceeded { required, capacity });
    }
    Ok(())
}

/// In-process store, optionally bounded in bytes (keys plus values).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    capacity: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::default(),
            capacity: Some(capacity),
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        check_capacity(&entries, self.capacity, key, &value)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        lock(&self.entries).clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.entries).keys().cloned().collect())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoreFile {
    version: String,
    entries: BTreeMap<String, String>,
}

impl Default for StoreFile {
    fn default() -> Self {
        Self {
            version: STORE_VERSION.to_string(),
            entries: BTreeMap::new(),
        }
    }
}

/// Store persisted as a single JSON file, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    file: Mutex<StoreFile>,
    capacity: Option<usize>,
}

impl JsonFileStore {
    /// Open the store at `path`.
    ///
    /// A missing, unreadable or incompatible file yields an empty store; the
    /// file is only created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file = Self::load(&path);
        Self {
            path,
            file: Mutex::new(file),
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> StoreFile {
        if !path.exists() {
            tracing::debug!("No cache store found at {:?}", path);
            return StoreFile::default();
        }

        match fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) if file.version == STORE_VERSION => {
                    tracing::debug!("Loaded cache store with {} entries", file.entries.len());
                    file
                }
                Ok(file) => {
                    tracing::info!(
                        "Cache store version mismatch (found {}, expected {}), starting fresh",
                        file.version,
                        STORE_VERSION
                    );
                    StoreFile::default()
                }
                Err(e) => {
                    tracing::warn!("Failed to parse cache store: {}", e);
                    StoreFile::default()
                }
            },
            Err(e) => {
                tracing::warn!("Failed to read cache store: {}", e);
                StoreFile::default()
            }
        }
    }

    fn save(&self, file: &StoreFile) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(file)?;
        fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.file).entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let mut file = lock(&self.file);
        check_capacity(&file.entries, self.capacity, key, &value)?;
        let previous = file.entries.insert(key.to_string(), value);
        if let Err(e) = self.save(&file) {
            // Keep memory and disk in step.
            match previous {
                Some(previous) => file.entries.insert(key.to_string(), previous),
                None => file.entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let mut file = lock(&self.file);
        if file.entries.remove(key).is_some() {
            self.save(&file)?;
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut file = lock(&self.file);
        file.entries.clear();
        self.save(&file)
    }

    fn keys(&self) -> Result<Vec<String>, StoreError> {
        Ok(lock(&self.file).entries.keys().cloned().collect())
    }
}

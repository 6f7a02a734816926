//! Expiring, best-effort cache over an injected key-value store.
//!
//! Entries older than the TTL are treated as absent on read but stay in the
//! store until they are removed explicitly. Write failures never reach the
//! caller: the value is simply not cached.

mod clock;
mod compress;
mod entry;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use compress::{Compressor, NoCompression, ZstdCompressor};
pub use entry::{CacheValue, BACK_REFERENCE_SUFFIX};
pub use store::{JsonFileStore, KeyValueStore, MemoryStore};

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::CacheError;
use entry::StoredEntry;

/// Namespace for keys owned by the cache.
pub const CACHE_KEY_PREFIX: &str = "OrgAudit.";

/// Lifetime of a cache entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Administrative view of one stored entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntryInfo {
    /// Key without the namespace prefix.
    pub name: String,
    /// Expired or unreadable.
    pub is_empty: bool,
    pub is_map: bool,
    pub length: Option<usize>,
    /// Write time, epoch milliseconds.
    pub created: Option<i64>,
}

/// Expiring key-value cache.
pub struct CacheManager {
    store: Arc<dyn KeyValueStore>,
    compressor: Arc<dyn Compressor>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    prefix: String,
}

impl CacheManager {
    pub fn new(store: Arc<dyn KeyValueStore>, compressor: Arc<dyn Compressor>) -> Self {
        Self {
            store,
            compressor,
            clock: Arc::new(SystemClock),
            ttl: DEFAULT_TTL,
            prefix: CACHE_KEY_PREFIX.to_string(),
        }
    }

    /// Uncompressed cache over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(NoCompression))
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// True when a live entry exists for `key`.
    pub fn has(&self, key: &str) -> bool {
        self.read_live(key).is_some()
    }

    /// The live value under `key`, if any.
    pub fn get(&self, key: &str) -> Option<CacheValue> {
        let entry = self.read_live(key)?;
        let value = entry.into_value();
        if value.is_none() {
            warn!(key, "Discarding malformed cache entry");
        }
        value
    }

    /// Store `value` under `key`. A `Null` scalar removes the key instead.
    pub fn set(&self, key: &str, value: CacheValue) {
        if value.is_null() {
            self.remove(key);
            return;
        }
        match self.write(key, &value) {
            Ok(()) => debug!(key, "Cached value"),
            Err(e) => warn!(key, error = %e, "Failed to write cache entry"),
        }
    }

    pub fn remove(&self, key: &str) {
        if let Err(e) = self.store.remove(&self.prefixed(key)) {
            warn!(key, error = %e, "Failed to remove cache entry");
        }
    }

    /// Remove every entry owned by the cache. Other keys in the store stay.
    pub fn clear(&self) {
        for key in self.owned_keys() {
            if let Err(e) = self.store.remove(&key) {
                warn!(key = %key, error = %e, "Failed to remove cache entry");
            }
        }
    }

    /// One record per stored key, expired ones included.
    pub fn details(&self) -> Vec<CacheEntryInfo> {
        let now = self.clock.now_millis();
        self.owned_keys()
            .into_iter()
            .map(|key| {
                let name = key[self.prefix.len()..].to_string();
                match self.read(&key) {
                    Ok(Some(entry)) => CacheEntryInfo {
                        name,
                        is_empty: self.is_expired(&entry, now),
                        is_map: entry.is_map(),
                        length: entry.length,
                        created: Some(entry.created),
                    },
                    Ok(None) | Err(_) => CacheEntryInfo {
                        name,
                        is_empty: true,
                        is_map: false,
                        length: None,
                        created: None,
                    },
                }
            })
            .collect()
    }

    fn prefixed(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn owned_keys(&self) -> Vec<String> {
        match self.store.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&self.prefix))
                .collect(),
            Err(e) => {
                warn!(error = %e, "Failed to list cache keys");
                Vec::new()
            }
        }
    }

    fn write(&self, key: &str, value: &CacheValue) -> Result<(), CacheError> {
        let entry = StoredEntry::new(value, self.clock.now_millis());
        let serialized = serde_json::to_string(&entry)?;
        let compressed = self.compressor.compress(&serialized)?;
        self.store.set(&self.prefixed(key), compressed)?;
        Ok(())
    }

    /// Read and decode the raw entry stored under an already prefixed key.
    fn read(&self, full_key: &str) -> Result<Option<StoredEntry>, CacheError> {
        let Some(raw) = self.store.get(full_key)? else {
            return Ok(None);
        };
        let serialized = self.compressor.decompress(&raw)?;
        Ok(Some(serde_json::from_str(&serialized)?))
    }

    fn read_live(&self, key: &str) -> Option<StoredEntry> {
        match self.read(&self.prefixed(key)) {
            Ok(Some(entry)) if self.is_expired(&entry, self.clock.now_millis()) => {
                debug!(key, "Cache entry expired");
                None
            }
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    fn is_expired(&self, entry: &StoredEntry, now: i64) -> bool {
        now - entry.created > self.ttl.as_millis() as i64
    }
}

impl std::fmt::Debug for CacheManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheManager")
            .field("ttl", &self.ttl)
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const DAY_MS: i64 = 24 * 60 * 60 * 1000;

    fn manager_with_clock() -> (CacheManager, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = CacheManager::new(store.clone(), Arc::new(ZstdCompressor::new()))
            .with_clock(clock.clone());
        (cache, store, clock)
    }

    #[test]
    fn test_missing_key() {
        let cache = CacheManager::in_memory();
        assert!(!cache.has("nope"));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn test_round_trip_each_kind() {
        let cache = CacheManager::in_memory();
        let values = [
            CacheValue::Scalar(json!(42)),
            CacheValue::Scalar(json!("text")),
            CacheValue::Scalar(json!({"x": 1, "nested": {"y": [1, 2]}})),
            CacheValue::Sequence(vec![json!(1), json!("two"), json!({"three": 3})]),
            CacheValue::Map(json!({"b": {"n": 1}, "a": {"n": 2}}).as_object().cloned().unwrap()),
        ];
        for (i, value) in values.into_iter().enumerate() {
            let key = format!("k{}", i);
            cache.set(&key, value.clone());
            assert!(cache.has(&key));
            assert_eq!(cache.get(&key), Some(value));
        }
    }

    #[test]
    fn test_set_null_removes() {
        let cache = CacheManager::in_memory();
        cache.set("k", CacheValue::Scalar(json!(1)));
        cache.set("k", CacheValue::Scalar(Value::Null));
        assert!(!cache.has("k"));
        assert!(cache.details().is_empty());
    }

    #[test]
    fn test_keys_are_prefixed_and_clear_spares_foreign_keys() {
        let (cache, store, _) = manager_with_clock();
        store.set("unrelated", "keep me".to_string()).unwrap();
        cache.set("apex-classes", CacheValue::Scalar(json!(1)));

        assert!(store.get("OrgAudit.apex-classes").unwrap().is_some());
        cache.clear();
        assert!(cache.details().is_empty());
        assert_eq!(store.get("unrelated").unwrap(), Some("keep me".to_string()));
    }

    #[test]
    fn test_expired_entries_are_absent_but_listed() {
        let (cache, _, clock) = manager_with_clock();
        cache.set("k", CacheValue::Sequence(vec![json!(1), json!(2)]));

        clock.advance(DAY_MS);
        assert!(cache.has("k"), "exactly at the TTL is still live");

        clock.advance(1);
        assert!(!cache.has("k"));
        assert_eq!(cache.get("k"), None);

        let details = cache.details();
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].name, "k");
        assert!(details[0].is_empty);
        assert_eq!(details[0].length, Some(2));

        cache.remove("k");
        assert!(cache.details().is_empty());
    }

    #[test]
    fn test_details_counts_distinct_keys() {
        let (cache, _, clock) = manager_with_clock();
        let map = json!({"a": 1}).as_object().cloned().unwrap();
        cache.set("one", CacheValue::Map(map.clone()));
        cache.set("two", CacheValue::Scalar(json!(true)));
        cache.set("one", CacheValue::Map(map));
        cache.set("three", CacheValue::Scalar(json!(3)));
        cache.remove("three");

        let details = cache.details();
        assert_eq!(details.len(), 2);
        let one = details.iter().find(|d| d.name == "one").unwrap();
        assert!(one.is_map);
        assert!(!one.is_empty);
        assert_eq!(one.length, Some(1));
        assert_eq!(one.created, Some(clock.now_millis()));
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let store = Arc::new(MemoryStore::with_capacity(16));
        let cache = CacheManager::new(store.clone(), Arc::new(NoCompression));
        cache.set("big", CacheValue::Scalar(json!("x".repeat(100))));
        assert!(!cache.has("big"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_unreadable_entry_is_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("OrgAudit.bad", "{not json".to_string()).unwrap();
        let cache = CacheManager::new(store, Arc::new(NoCompression));
        assert!(!cache.has("bad"));
        let details = cache.details();
        assert_eq!(details.len(), 1);
        assert!(details[0].is_empty);
    }

    #[test]
    fn test_custom_ttl_and_prefix() {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(0));
        let cache = CacheManager::new(store.clone(), Arc::new(NoCompression))
            .with_clock(clock.clone())
            .with_ttl(Duration::from_secs(1))
            .with_prefix("Test.");
        cache.set("k", CacheValue::Scalar(json!(1)));
        assert!(store.get("Test.k").unwrap().is_some());
        clock.advance(1_001);
        assert!(!cache.has("k"));
        assert_eq!(cache.ttl(), Duration::from_secs(1));
    }
}

//! Concurrent dataset orchestration.
//!
//! [`DatasetManager::run`] resolves every request concurrently:
//!
//! 1. A live cache entry under the request's cache key is returned as-is.
//! 2. Otherwise the request joins the fetch already in flight for that key,
//!    or starts one. One key is never fetched twice at the same time.
//! 3. A successful fetch is written to the cache before its in-flight entry
//!    is dropped; a failed one is not cached.
//!
//! The aggregate waits for every request. When one fails it returns the
//! first failure in request order, but successful siblings stay cached, so a
//! retry only fetches what failed.

use chrono::{DateTime, TimeZone, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, error, info, warn};

use crate::cache::CacheManager;
use crate::dataset::{
    Dataset, DatasetContext, DatasetParameters, DatasetResultSet, DatasetRunRequest, DatasetValue,
};
use crate::error::{DatasetError, Result};

type SharedFetch = Shared<BoxFuture<'static, Result<Arc<DatasetValue>>>>;
type InFlight = Arc<Mutex<HashMap<String, SharedFetch>>>;

/// Cache state of one dataset, for administration screens.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetCacheInfo {
    /// Cache key.
    pub name: String,
    /// Expired or unreadable.
    pub is_empty: bool,
    pub is_map: bool,
    pub length: Option<usize>,
    pub created: Option<DateTime<Utc>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            warn!("Recovering from poisoned in-flight mutex");
            poisoned.into_inner()
        }
    }
}

/// Registry of datasets plus the cache in front of them.
pub struct DatasetManager {
    registry: RwLock<HashMap<String, Arc<dyn Dataset>>>,
    cache: Arc<CacheManager>,
    context: DatasetContext,
    inflight: InFlight,
}

impl DatasetManager {
    pub fn new(cache: Arc<CacheManager>, context: DatasetContext) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            cache,
            context,
            inflight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Bind `dataset` to `alias`.
    ///
    /// Registering an alias twice replaces the earlier dataset and logs a
    /// warning.
    pub fn register(&self, alias: impl Into<String>, dataset: Arc<dyn Dataset>) -> Result<()> {
        let alias = alias.into();
        if alias.trim().is_empty() {
            return Err(DatasetError::EmptyAlias);
        }

        let mut registry = match self.registry.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("Recovering from poisoned registry lock");
                poisoned.into_inner()
            }
        };
        if registry.insert(alias.clone(), dataset).is_some() {
            warn!(alias = %alias, "Dataset registered twice; replacing the earlier one");
        }
        Ok(())
    }

    pub fn is_registered(&self, alias: &str) -> bool {
        self.lookup(alias).is_some()
    }

    /// Registered aliases, sorted.
    pub fn aliases(&self) -> Vec<String> {
        let mut aliases: Vec<String> = match self.registry.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        aliases.sort();
        aliases
    }

    pub fn cache(&self) -> &Arc<CacheManager> {
        &self.cache
    }

    /// Resolve every request, from cache where possible.
    ///
    /// Fails without fetching anything if an alias is not registered.
    /// Results are keyed by alias; two requests sharing an alias keep the
    /// later one.
    pub async fn run(&self, requests: Vec<DatasetRunRequest>) -> Result<DatasetResultSet> {
        let mut resolved = Vec::with_capacity(requests.len());
        for request in requests {
            let dataset = self
                .lookup(&request.alias)
                .ok_or_else(|| DatasetError::NotRegistered(request.alias.clone()))?;
            resolved.push((request, dataset));
        }

        let outcomes = join_all(
            resolved
                .iter()
                .map(|(request, dataset)| self.fetch(request, dataset.clone())),
        )
        .await;

        let mut results = DatasetResultSet::with_capacity(resolved.len());
        let mut first_error = None;
        for ((request, _), outcome) in resolved.into_iter().zip(outcomes) {
            match outcome {
                Ok(value) => {
                    results.insert(request.alias, value);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(results),
        }
    }

    /// One row per cached dataset, expired ones included.
    pub fn cache_information(&self) -> Vec<DatasetCacheInfo> {
        self.cache
            .details()
            .into_iter()
            .map(|entry| DatasetCacheInfo {
                name: entry.name,
                is_empty: entry.is_empty,
                is_map: entry.is_map,
                length: entry.length,
                created: entry
                    .created
                    .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            })
            .collect()
    }

    pub fn remove_cache(&self, name: &str) {
        self.cache.remove(name);
    }

    pub fn remove_all_cache(&self) {
        self.cache.clear();
    }

    fn lookup(&self, alias: &str) -> Option<Arc<dyn Dataset>> {
        match self.registry.read() {
            Ok(guard) => guard.get(alias).cloned(),
            Err(poisoned) => poisoned.into_inner().get(alias).cloned(),
        }
    }

    async fn fetch(
        &self,
        request: &DatasetRunRequest,
        dataset: Arc<dyn Dataset>,
    ) -> Result<Arc<DatasetValue>> {
        let key = request.cache_key.as_str();
        if let Some(value) = self.cache.get(key) {
            debug!(key, alias = %request.alias, "Cache hit");
            return Ok(Arc::new(value));
        }

        let shared = {
            let mut inflight = lock(&self.inflight);
            match inflight.get(key) {
                Some(existing) => {
                    debug!(key, "Joining in-flight fetch");
                    existing.clone()
                }
                None => {
                    // A fetch may have completed between the first lookup and the lock.
                    if let Some(value) = self.cache.get(key) {
                        debug!(key, "Cache hit after in-flight fetch");
                        return Ok(Arc::new(value));
                    }
                    debug!(key, alias = %request.alias, "Cache miss, fetching");
                    let fetch = self.start_fetch(request, dataset);
                    inflight.insert(key.to_string(), fetch.clone());
                    fetch
                }
            }
        };

        shared.await
    }

    fn start_fetch(&self, request: &DatasetRunRequest, dataset: Arc<dyn Dataset>) -> SharedFetch {
        let alias = request.alias.clone();
        let key = request.cache_key.clone();
        let parameters: DatasetParameters = request.parameters.clone();
        let context = self.context.clone();
        let cache = self.cache.clone();
        let inflight = self.inflight.clone();

        async move {
            context
                .logger
                .section_starts(&alias, &format!("Retrieving dataset '{}'", alias));

            let outcome = match dataset.run(&context, &parameters).await {
                Ok(value) => {
                    cache.set(&key, value.clone());
                    let message = match value.len() {
                        Some(n) => format!("{} entries", n),
                        None => "done".to_string(),
                    };
                    info!(alias = %alias, key = %key, "Dataset retrieved: {}", message);
                    context.logger.section_ended(&alias, &message);
                    Ok(Arc::new(value))
                }
                Err(e) => {
                    error!(alias = %alias, key = %key, error = %e, "Dataset failed");
                    context.logger.section_failed(&alias, &e.to_string());
                    Err(e)
                }
            };

            lock(&inflight).remove(&key);
            outcome
        }
        .boxed()
        .shared()
    }
}

impl std::fmt::Debug for DatasetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetManager")
            .field("aliases", &self.aliases())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::FixtureQueryInterface;
    use async_trait::async_trait;
    use serde_json::json;

    struct Constant(i64);

    #[async_trait]
    impl Dataset for Constant {
        async fn run(&self, _ctx: &DatasetContext, _params: &DatasetParameters) -> Result<DatasetValue> {
            Ok(DatasetValue::Scalar(json!(self.0)))
        }
    }

    fn manager() -> DatasetManager {
        DatasetManager::new(
            Arc::new(CacheManager::in_memory()),
            DatasetContext::new(Arc::new(FixtureQueryInterface::new())),
        )
    }

    #[test]
    fn test_register_rejects_empty_alias() {
        let manager = manager();
        assert_eq!(
            manager.register("  ", Arc::new(Constant(1))),
            Err(DatasetError::EmptyAlias)
        );
        assert!(manager.aliases().is_empty());
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let manager = manager();
        manager.register("n", Arc::new(Constant(1))).unwrap();
        manager.register("n", Arc::new(Constant(2))).unwrap();
        assert_eq!(manager.aliases(), vec!["n"]);
        assert!(manager.is_registered("n"));
        assert!(!manager.is_registered("m"));

        let results = manager.run(vec![DatasetRunRequest::new("n")]).await.unwrap();
        assert_eq!(*results["n"], DatasetValue::Scalar(json!(2)));
    }

    #[tokio::test]
    async fn test_cache_information_reshapes_details() {
        let manager = manager();
        manager.register("n", Arc::new(Constant(7))).unwrap();
        manager.run(vec![DatasetRunRequest::new("n")]).await.unwrap();

        let info = manager.cache_information();
        assert_eq!(info.len(), 1);
        assert_eq!(info[0].name, "n");
        assert!(!info[0].is_empty);
        assert!(info[0].created.is_some());

        manager.remove_cache("n");
        assert!(manager.cache_information().is_empty());
    }
}

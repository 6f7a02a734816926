//! OrgAudit engine - dataset retrieval, expiring cache and derivation.
//!
//! This library provides:
//! - [`DatasetManager`]: runs named datasets concurrently, at most one remote
//!   fetch per cache key at a time, with per-dataset failure isolation
//! - [`CacheManager`]: best-effort expiring cache over an injected store and
//!   compressor
//! - [`Dataset`] implementations turning query rows into typed entities
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use orgaudit_engine::{
//!     register_defaults, CacheManager, DatasetContext, DatasetManager, DatasetRunRequest,
//!     FixtureQueryInterface,
//! };
//!
//! # tokio_test::block_on(async {
//! let query = Arc::new(FixtureQueryInterface::new());
//! let manager = DatasetManager::new(
//!     Arc::new(CacheManager::in_memory()),
//!     DatasetContext::new(query),
//! );
//! register_defaults(&manager).unwrap();
//!
//! let results = manager
//!     .run(vec![DatasetRunRequest::new("apex-classes")])
//!     .await
//!     .unwrap();
//! assert_eq!(results["apex-classes"].len(), Some(0));
//! # });
//! ```

pub mod cache;
pub mod dataset;
pub mod error;
pub mod logger;
pub mod manager;
pub mod query;

pub use cache::{
    CacheEntryInfo, CacheManager, CacheValue, Clock, Compressor, JsonFileStore, KeyValueStore,
    ManualClock, MemoryStore, NoCompression, SystemClock, ZstdCompressor,
};
pub use dataset::{
    register_defaults, Dataset, DatasetContext, DatasetParameters, DatasetResultSet,
    DatasetRunRequest, DatasetValue,
};
pub use error::{CacheError, CompressionError, DatasetError, QueryError, StoreError};
pub use logger::{RecordingLogger, SectionEvent, SectionLogger, TracingLogger};
pub use manager::{DatasetCacheInfo, DatasetManager};
pub use query::{FixtureQueryInterface, Query, QueryInterface, QueryResult, RawRow, RowExt};

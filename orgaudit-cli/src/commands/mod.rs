//! Command implementations for the OrgAudit CLI
//!
//! Each command module provides a `run` function that executes the command logic.

pub mod cache;
pub mod deps;
pub mod run;
pub mod scan;

use orgaudit_engine::{
    register_defaults, CacheManager, Compressor, DatasetContext, DatasetManager, JsonFileStore,
    NoCompression, QueryInterface, ZstdCompressor,
};
use std::path::Path;
use std::sync::Arc;

use crate::config::{CompressionSetting, OrgAuditConfig};

/// Cache described by the configuration, rooted at `root`.
pub fn open_cache(config: &OrgAuditConfig, root: &Path) -> CacheManager {
    if !config.cache_enabled() {
        tracing::debug!("Cache disabled, using an in-memory cache");
        return CacheManager::in_memory();
    }

    let mut store = JsonFileStore::open(config.cache_store_path(root));
    if let Some(capacity) = config.cache_capacity_bytes() {
        store = store.with_capacity(capacity);
    }
    let compressor: Arc<dyn Compressor> = match config.cache.compression {
        CompressionSetting::Zstd => Arc::new(ZstdCompressor::new()),
        CompressionSetting::None => Arc::new(NoCompression),
    };
    CacheManager::new(Arc::new(store), compressor)
}

/// Dataset manager with every built-in dataset registered.
pub fn open_manager(
    config: &OrgAuditConfig,
    root: &Path,
    query: Arc<dyn QueryInterface>,
) -> anyhow::Result<DatasetManager> {
    let manager = DatasetManager::new(
        Arc::new(open_cache(config, root)),
        DatasetContext::new(query),
    );
    register_defaults(&manager)?;
    Ok(manager)
}

//! Error types for orgaudit-engine.

use thiserror::Error;

/// Result type alias for dataset operations.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// A batch of remote queries was rejected.
///
/// The whole batch fails together; there is no per-query partial result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("remote query failed: {message}")]
pub struct QueryError {
    /// Description returned by the remote interface.
    pub message: String,
}

impl QueryError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors surfaced by [`DatasetManager::run`](crate::DatasetManager::run) and
/// by dataset implementations.
///
/// `Clone` because one failed fetch is shared by every caller attached to it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    /// No dataset was registered under this alias.
    #[error("dataset '{0}' is not registered")]
    NotRegistered(String),

    /// Registration with an empty alias.
    #[error("dataset alias must not be empty")]
    EmptyAlias,

    /// The batch of queries behind this dataset was rejected.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// The remote interface answered with an unexpected shape.
    #[error("unexpected result for {source_name}: {message}")]
    Transform {
        /// Object or query the rows came from.
        source_name: String,
        /// What was wrong with them.
        message: String,
    },

    /// A run parameter is missing or unusable.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why it was rejected.
        message: String,
    },

    /// Failure reported by the dataset itself.
    #[error("{0}")]
    Failed(String),
}

impl DatasetError {
    pub fn failed(message: impl Into<String>) -> Self {
        DatasetError::Failed(message.into())
    }

    pub fn transform(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        DatasetError::Transform {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        DatasetError::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Errors from the key-value store behind the cache.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Writing would exceed the configured capacity.
    #[error("store capacity exceeded: {required} bytes needed, {capacity} available")]
    CapacityExceeded {
        /// Bytes the store would hold after the write.
        required: usize,
        /// Configured capacity in bytes.
        capacity: usize,
    },

    /// IO error on a file-backed store.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The persisted store file could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from a [`Compressor`](crate::cache::Compressor).
#[derive(Error, Debug)]
pub enum CompressionError {
    #[error("compression failed: {0}")]
    Codec(#[from] std::io::Error),

    #[error("invalid base64 payload: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Reasons a cache entry could not be written or read.
///
/// Never returned to cache callers: writes degrade to "not cached" and
/// reads degrade to "absent", with the cause logged.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Compression(#[from] CompressionError),

    #[error("cache entry is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

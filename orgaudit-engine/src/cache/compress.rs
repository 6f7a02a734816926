//! Payload compression for cache entries.
//!
//! Compressed payloads are zstd frames encoded as base64 so they can live in
//! string-valued stores. Short payloads are kept as-is unless they could be
//! mistaken for a compressed one.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};

use crate::error::CompressionError;

/// Only compress payloads at least this large.
const COMPRESSION_THRESHOLD: usize = 1024;

/// Zstd compression level
const COMPRESSION_LEVEL: i32 = 3;

/// Marks a base64-encoded zstd payload.
const COMPRESSION_PREFIX: &str = "zstd:";

/// String-to-string codec applied to every serialized cache entry.
///
/// `decompress(compress(x))` must return `x` for every string.
pub trait Compressor: Send + Sync {
    fn compress(&self, data: &str) -> Result<String, CompressionError>;
    fn decompress(&self, data: &str) -> Result<String, CompressionError>;
}

/// zstd + base64, skipped for payloads below a size threshold.
#[derive(Debug, Clone)]
pub struct ZstdCompressor {
    threshold: usize,
    level: i32,
}

impl Default for ZstdCompressor {
    fn default() -> Self {
        Self {
            threshold: COMPRESSION_THRESHOLD,
            level: COMPRESSION_LEVEL,
        }
    }
}

impl ZstdCompressor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compress every payload whose length is at least `threshold` bytes.
    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }
}

impl Compressor for ZstdCompressor {
    fn compress(&self, data: &str) -> Result<String, CompressionError> {
        // A raw payload that already carries the prefix would be decoded on the
        // way back, so it is always compressed.
        if data.len() < self.threshold && !data.starts_with(COMPRESSION_PREFIX) {
            return Ok(data.to_string());
        }

        let compressed = zstd::encode_all(data.as_bytes(), self.level)?;
        Ok(format!("{}{}", COMPRESSION_PREFIX, BASE64.encode(compressed)))
    }

    fn decompress(&self, data: &str) -> Result<String, CompressionError> {
        match data.strip_prefix(COMPRESSION_PREFIX) {
            Some(encoded) => {
                let compressed = BASE64.decode(encoded)?;
                let decompressed = zstd::decode_all(&compressed[..])?;
                Ok(String::from_utf8(decompressed)?)
            }
            None => Ok(data.to_string()),
        }
    }
}

/// Identity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, data: &str) -> Result<String, CompressionError> {
        Ok(data.to_string())
    }

    fn decompress(&self, data: &str) -> Result<String, CompressionError> {
        Ok(data.to_string())
    }
}

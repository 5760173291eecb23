//! Content-addressed sample cache using moka
//!
//! Normalizing the same upload twice (a re-upload, or the report and the
//! training-data step reading one file) should not redo the work. Entries are
//! keyed by the BLAKE3 hash of the content plus the format it was read as.

use crate::format::DatasetFormat;
use crate::parsers::normalize;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Cache key: content hash and format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SampleKey {
    hash: [u8; 32],
    format: DatasetFormat,
}

impl SampleKey {
    /// Compute key for content read as `format`
    #[must_use]
    pub fn new(content: &str, format: DatasetFormat) -> Self {
        Self {
            hash: *blake3::hash(content.as_bytes()).as_bytes(),
            format,
        }
    }

    /// Content hash as hex
    #[must_use]
    pub fn hash_hex(&self) -> String {
        blake3::Hash::from(self.hash).to_hex().to_string()
    }

    /// Format part of the key
    #[inline]
    #[must_use]
    pub fn format(&self) -> DatasetFormat {
        self.format
    }
}

/// Content-addressed cache of normalized samples
#[derive(Debug, Clone)]
pub struct SampleCache {
    inner: Cache<SampleKey, Arc<Vec<String>>>,
}

impl SampleCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Normalize content, reusing a cached result for identical input
    pub async fn get_or_normalize(&self, content: &str, format: DatasetFormat) -> Arc<Vec<String>> {
        let key = SampleKey::new(content, format);
        self.inner
            .get_with(key, async {
                tracing::trace!(hash = %key.hash_hex(), %format, "sample cache miss");
                Arc::new(normalize(content, format))
            })
            .await
    }

    /// Get cached samples without computing
    #[inline]
    pub async fn get(&self, key: &SampleKey) -> Option<Arc<Vec<String>>> {
        self.inner.get(key).await
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Flush pending maintenance so counts are exact
    pub async fn sync(&self) {
        self.inner.run_pending_tasks().await;
    }
}

impl Default for SampleCache {
    /// Create cache with default capacity (1,000 entries)
    fn default() -> Self {
        Self::new(1_000)
    }
}

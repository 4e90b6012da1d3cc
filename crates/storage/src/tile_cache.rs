//! In-memory LRU cache for rendered tile PNGs.
//!
//! Entries are keyed by [`TileKey`], which includes the asset version:
//! publishing a new asset changes the version, so stale tiles are simply
//! never requested again and age out through normal LRU pressure. No TTL
//! is needed.
//!
//! Eviction is memory-based rather than entry-count-based. When an insert
//! would exceed the byte limit, ~5% of the limit is freed in one batch so
//! bursts do not evict one entry at a time.

use bytes::Bytes;
use lru::LruCache;
use raster_common::TileKey;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

// The LruCache needs an entry bound but eviction is driven by bytes; this
// is far more entries than any realistic byte limit will hold.
const LRU_CAPACITY: usize = 1_000_000;

/// Byte-bounded LRU cache of encoded tiles.
pub struct TileCache {
    cache: Arc<RwLock<LruCache<TileKey, Bytes>>>,
    max_bytes: u64,
    stats: Arc<TileCacheStats>,
}

/// Cache counters, atomic for lock-free reads.
#[derive(Default)]
pub struct TileCacheStats {
    pub hits: AtomicU64,
    pub misses: AtomicU64,
    pub evictions: AtomicU64,
    pub eviction_runs: AtomicU64,
    pub size_bytes: AtomicU64,
    pub entry_count: AtomicU64,
}

impl TileCacheStats {
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64 * 100.0
        }
    }
}

impl TileCache {
    /// Create a cache bounded to `max_size_mb` megabytes of tile bytes.
    pub fn new(max_size_mb: usize) -> Self {
        let capacity = NonZeroUsize::new(LRU_CAPACITY).unwrap();
        Self {
            cache: Arc::new(RwLock::new(LruCache::new(capacity))),
            max_bytes: max_size_mb as u64 * 1024 * 1024,
            stats: Arc::new(TileCacheStats::default()),
        }
    }

    pub async fn get(&self, key: &TileKey) -> Option<Bytes> {
        let mut cache = self.cache.write().await;
        match cache.get(key) {
            Some(data) => {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                Some(data.clone())
            }
            None => {
                self.stats.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub async fn put(&self, key: TileKey, data: Bytes) {
        let size = data.len() as u64;
        let mut cache = self.cache.write().await;

        if self.stats.size_bytes.load(Ordering::Relaxed) + size > self.max_bytes {
            self.evict_batch(&mut cache);
        }

        if let Some(existing) = cache.peek(&key) {
            self.stats
                .size_bytes
                .fetch_sub(existing.len() as u64, Ordering::Relaxed);
        } else {
            self.stats.entry_count.fetch_add(1, Ordering::Relaxed);
        }

        cache.put(key, data);
        self.stats.size_bytes.fetch_add(size, Ordering::Relaxed);
    }

    /// Free ~5% of the byte limit in LRU order. Must run under the write
    /// lock so the size check and the eviction cannot race.
    fn evict_batch(&self, cache: &mut LruCache<TileKey, Bytes>) {
        let target = self.max_bytes / 20;
        let mut freed = 0u64;
        let mut evicted = 0u64;

        while freed < target {
            match cache.pop_lru() {
                Some((_, data)) => {
                    freed += data.len() as u64;
                    evicted += 1;
                }
                None => break,
            }
        }

        self.stats.size_bytes.fetch_sub(freed, Ordering::Relaxed);
        self.stats.entry_count.fetch_sub(evicted, Ordering::Relaxed);
        self.stats.evictions.fetch_add(evicted, Ordering::Relaxed);
        self.stats.eviction_runs.fetch_add(1, Ordering::Relaxed);

        info!(
            evicted,
            freed_kb = freed / 1024,
            "tile cache batch eviction"
        );
    }

    pub fn stats(&self) -> &TileCacheStats {
        &self.stats
    }

    pub fn size_bytes(&self) -> u64 {
        self.stats.size_bytes.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use raster_common::TileCoord;

    fn key(version: u64, z: u32, x: u32, y: u32) -> TileKey {
        TileKey::new(version, TileCoord::new(z, x, y).unwrap())
    }

    #[tokio::test]
    async fn test_hit_and_miss_counting() {
        let cache = TileCache::new(16);
        let k = key(1, 3, 4, 5);

        assert!(cache.get(&k).await.is_none());
        cache.put(k, Bytes::from_static(b"png bytes")).await;
        assert_eq!(cache.get(&k).await.unwrap(), Bytes::from_static(b"png bytes"));

        assert_eq!(cache.stats().hits.load(Ordering::Relaxed), 1);
        assert_eq!(cache.stats().misses.load(Ordering::Relaxed), 1);
        assert!((cache.stats().hit_rate() - 50.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_version_in_key_separates_assets() {
        let cache = TileCache::new(16);
        cache.put(key(1, 0, 0, 0), Bytes::from_static(b"old")).await;
        cache.put(key(2, 0, 0, 0), Bytes::from_static(b"new")).await;

        assert_eq!(cache.get(&key(1, 0, 0, 0)).await.unwrap(), "old");
        assert_eq!(cache.get(&key(2, 0, 0, 0)).await.unwrap(), "new");
        assert_eq!(cache.len().await, 2);
    }

    #[tokio::test]
    async fn test_byte_bounded_eviction() {
        // 1 MB limit, 100 KB tiles: inserting 15 must trigger eviction and
        // keep the cache under the limit.
        let cache = TileCache::new(1);
        let tile = Bytes::from(vec![0u8; 100 * 1024]);
        for i in 0..15 {
            cache.put(key(1, 10, i, 0), tile.clone()).await;
        }

        assert!(cache.stats().evictions.load(Ordering::Relaxed) > 0);
        assert!(cache.stats().eviction_runs.load(Ordering::Relaxed) > 0);
        assert!(cache.size_bytes() <= 1024 * 1024);
    }

    #[tokio::test]
    async fn test_replacement_keeps_size_consistent() {
        let cache = TileCache::new(16);
        let k = key(1, 1, 0, 0);
        cache.put(k, Bytes::from_static(b"12345")).await;
        assert_eq!(cache.size_bytes(), 5);

        cache.put(k, Bytes::from_static(b"1234567890")).await;
        assert_eq!(cache.size_bytes(), 10);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_lru_order_evicts_oldest_first() {
        let cache = TileCache::new(1);
        let big = Bytes::from(vec![0u8; 300 * 1024]);

        cache.put(key(1, 5, 0, 0), big.clone()).await;
        cache.put(key(1, 5, 1, 0), big.clone()).await;
        cache.put(key(1, 5, 2, 0), big.clone()).await;
        // Touch the first so the second is now least recently used.
        cache.get(&key(1, 5, 0, 0)).await;

        cache.put(key(1, 5, 3, 0), big.clone()).await;
        assert!(cache.get(&key(1, 5, 1, 0)).await.is_none());
    }
}

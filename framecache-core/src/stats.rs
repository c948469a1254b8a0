use std::sync::atomic::{AtomicU64, Ordering};

/// Hit/miss counters shared by both cache kinds.
///
/// A `TimedLruCache` records exactly one hit or one miss per call. A `FileCache`
/// records a hit when it serves the stored object and a miss when it runs the
/// producer. Epoch expirations are counted separately.
///
/// # Examples
///
/// ```
/// use framecache_core::CacheStats;
///
/// let stats = CacheStats::new();
/// stats.record_hit();
/// stats.record_miss();
/// stats.record_miss();
///
/// assert_eq!(stats.hits(), 1);
/// assert_eq!(stats.misses(), 2);
/// assert!((stats.hit_rate() - 0.3333).abs() < 0.001);
/// ```
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
    expirations: AtomicU64,
}

impl CacheStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one whole-cache expiration.
    #[inline]
    pub fn record_expiration(&self) {
        self.expirations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn expirations(&self) -> u64 {
        self.expirations.load(Ordering::Relaxed)
    }

    pub fn total_accesses(&self) -> u64 {
        self.hits() + self.misses()
    }

    /// Fraction of calls served from the cache; `0.0` before any call.
    pub fn hit_rate(&self) -> f64 {
        match self.total_accesses() {
            0 => 0.0,
            total => self.hits() as f64 / total as f64,
        }
    }

    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits()),
            misses: AtomicU64::new(self.misses()),
            expirations: AtomicU64::new(self.expirations()),
        }
    }
}

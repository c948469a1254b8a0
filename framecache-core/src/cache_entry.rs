use std::time::{Duration, SystemTime};

/// A value held by a [`TimedLruCache`](crate::TimedLruCache).
///
/// Entries do not expire on their own; the whole cache expires at once. The
/// insertion time and hit count are kept for logging and introspection.
///
/// # Examples
///
/// ```
/// use framecache_core::CacheEntry;
/// use std::time::{Duration, UNIX_EPOCH};
///
/// let mut entry = CacheEntry::new("frame", UNIX_EPOCH);
/// entry.record_hit();
///
/// assert_eq!(entry.hits, 1);
/// assert_eq!(entry.age(UNIX_EPOCH + Duration::from_secs(5)), Duration::from_secs(5));
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<R> {
    pub value: R,
    pub inserted_at: SystemTime,
    pub hits: u64,
}

impl<R> CacheEntry<R> {
    pub fn new(value: R, inserted_at: SystemTime) -> Self {
        Self {
            value,
            inserted_at,
            hits: 0,
        }
    }

    /// Time since insertion; zero if `now` is earlier than the insertion.
    pub fn age(&self, now: SystemTime) -> Duration {
        now.duration_since(self.inserted_at).unwrap_or(Duration::ZERO)
    }

    pub fn record_hit(&mut self) {
        self.hits = self.hits.saturating_add(1);
    }
}

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};

use crate::clock::{system_clock, Clock};
use crate::epoch::CacheEpoch;
use crate::keys::{CacheKey, KeyArgs};
use crate::utils::{move_key_to_end, pop_least_recent};
use crate::CacheEntry;

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Settings for a [`TimedLruCache`].
///
/// `lifetime` bounds freshness for the whole cache, `maxsize` bounds the entry
/// count, and `typed` decides whether `f(1)` and `f(1.0)` are separate entries.
/// Leaving both bounds unset gives plain memoization.
///
/// # Examples
///
/// ```
/// use framecache_core::TimedCacheConfig;
/// use std::time::Duration;
///
/// let config = TimedCacheConfig::new().seconds(300).maxsize(128).typed(false);
/// assert_eq!(config.lifetime, Some(Duration::from_secs(300)));
/// assert_eq!(config.maxsize, Some(128));
/// assert!(!config.typed);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimedCacheConfig {
    pub lifetime: Option<Duration>,
    pub maxsize: Option<usize>,
    pub typed: bool,
}

impl TimedCacheConfig {
    /// Unbounded, never expiring, typed.
    pub fn new() -> Self {
        Self {
            lifetime: None,
            maxsize: None,
            typed: true,
        }
    }

    pub fn lifetime(mut self, lifetime: Duration) -> Self {
        self.lifetime = Some(lifetime);
        self
    }

    pub fn seconds(self, seconds: u64) -> Self {
        self.lifetime(Duration::from_secs(seconds))
    }

    pub fn maxsize(mut self, maxsize: usize) -> Self {
        self.maxsize = Some(maxsize);
        self
    }

    pub fn typed(mut self, typed: bool) -> Self {
        self.typed = typed;
        self
    }
}

impl Default for TimedCacheConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot returned by [`TimedLruCache::cache_info`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheInfo {
    pub hits: u64,
    pub misses: u64,
    pub maxsize: Option<usize>,
    pub currsize: usize,
}

struct State<R> {
    map: HashMap<CacheKey, CacheEntry<R>>,
    // Only maintained when `maxsize` is set.
    order: VecDeque<CacheKey>,
    epoch: CacheEpoch,
}

struct Shared<R> {
    config: TimedCacheConfig,
    state: Mutex<State<R>>,
    in_flight: DashMap<CacheKey, Arc<Mutex<()>>>,
    clock: Arc<dyn Clock>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

/// In-memory memoization bounded by entry count and by one shared lifetime.
///
/// Entries live in a least-recently-used map. When `maxsize` is set, inserting a
/// new key into a full map evicts the least recently used entry; a hit makes an
/// entry the most recently used. When `lifetime` is set, the whole map shares one
/// expiration instant: the first call at or after it clears every entry and
/// starts a new epoch ending `lifetime` later. Entries never expire one by one.
///
/// # Thread Safety
///
/// Map, recency queue and epoch sit behind one `parking_lot::Mutex`, so the
/// expire-then-clear step and every lookup or insert are single critical
/// sections. The producer runs outside that lock. Concurrent misses on the same
/// key are funnelled through a per-key gate: one caller produces, the others wait
/// and then read its result. A failed producer call stores nothing.
///
/// Handles are cheap to clone and share the same cache.
///
/// # Examples
///
/// ```
/// use framecache_core::{TimedCacheConfig, TimedLruCache};
/// use std::sync::atomic::{AtomicUsize, Ordering};
///
/// let calls = AtomicUsize::new(0);
/// let cache = TimedLruCache::new(TimedCacheConfig::new().maxsize(2));
/// let square = cache.wrap(|(n,): (u64,)| {
///     calls.fetch_add(1, Ordering::SeqCst);
///     n * n
/// });
///
/// assert_eq!(square((4,)), 16);
/// assert_eq!(square((4,)), 16);
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
/// assert_eq!(cache.cache_info().currsize, 1);
/// ```
pub struct TimedLruCache<R> {
    shared: Arc<Shared<R>>,
}

impl<R> Clone for TimedLruCache<R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<R> fmt::Debug for TimedLruCache<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimedLruCache")
            .field("config", &self.shared.config)
            .field("len", &self.shared.state.lock().map.len())
            .finish()
    }
}

impl<R: Clone> TimedLruCache<R> {
    /// Creates a cache on the system clock. The first epoch starts now.
    pub fn new(config: TimedCacheConfig) -> Self {
        Self::from_parts(config, system_clock())
    }

    /// Creates a cache that reads time from `clock`.
    pub fn with_clock<C: Clock + 'static>(config: TimedCacheConfig, clock: C) -> Self {
        Self::from_parts(config, Arc::new(clock))
    }

    fn from_parts(config: TimedCacheConfig, clock: Arc<dyn Clock>) -> Self {
        let epoch = CacheEpoch::new(config.lifetime, clock.now());
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(State {
                    map: HashMap::new(),
                    order: VecDeque::new(),
                    epoch,
                }),
                in_flight: DashMap::new(),
                clock,
                #[cfg(feature = "stats")]
                stats: CacheStats::new(),
            }),
        }
    }

    pub fn config(&self) -> &TimedCacheConfig {
        &self.shared.config
    }

    /// Wraps an infallible producer.
    ///
    /// The returned closure keys each call on its argument tuple and only runs
    /// `producer` on a miss.
    pub fn wrap<A, F>(&self, producer: F) -> impl Fn(A) -> R
    where
        A: KeyArgs,
        F: Fn(A) -> R,
    {
        let cache = self.clone();
        move |args: A| {
            let key = args.to_key(cache.shared.config.typed);
            cache.get_or_insert_with(key, || producer(args))
        }
    }

    /// Wraps a fallible producer. Errors are returned as-is and never cached.
    pub fn try_wrap<A, E, F>(&self, producer: F) -> impl Fn(A) -> Result<R, E>
    where
        A: KeyArgs,
        F: Fn(A) -> Result<R, E>,
    {
        let cache = self.clone();
        move |args: A| {
            let key = args.to_key(cache.shared.config.typed);
            cache.get_or_try_insert_with(key, || producer(args))
        }
    }

    /// Returns the value cached under `key`, producing and storing it on a miss.
    pub fn get_or_insert_with<F>(&self, key: CacheKey, producer: F) -> R
    where
        F: FnOnce() -> R,
    {
        match self.get_or_try_insert_with(key, || Ok::<R, Infallible>(producer())) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Fallible form of [`get_or_insert_with`](Self::get_or_insert_with).
    ///
    /// If `producer` fails nothing is stored and the error is returned unchanged.
    pub fn get_or_try_insert_with<E, F>(&self, key: CacheKey, producer: F) -> Result<R, E>
    where
        F: FnOnce() -> Result<R, E>,
    {
        if let Some(value) = self.fetch(&key) {
            self.record_hit();
            return Ok(value);
        }

        loop {
            let gate = self
                .shared
                .in_flight
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            let _permit = gate.lock();

            // Another caller may have stored the value while this one waited.
            if let Some(value) = self.fetch(&key) {
                self.record_hit();
                return Ok(value);
            }

            // A previous owner failed and retired this gate; queue on the new one.
            if !self.owns_gate(&key, &gate) {
                continue;
            }

            self.record_miss();
            trace!(arity = key.arity(), "cache miss, running producer");
            let result = producer();
            match &result {
                Ok(value) => self.store(key.clone(), value.clone()),
                Err(_) => debug!("producer failed, nothing cached"),
            }
            self.shared
                .in_flight
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &gate));
            return result;
        }
    }

    /// Looks up `key` after the epoch check and promotes it on a hit.
    fn fetch(&self, key: &CacheKey) -> Option<R> {
        let now = self.shared.clock.now();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        self.expire_if_due(state, now);

        let entry = state.map.get_mut(key)?;
        entry.record_hit();
        let value = entry.value.clone();
        if self.tracks_recency() {
            move_key_to_end(&mut state.order, key);
        }
        Some(value)
    }

    fn store(&self, key: CacheKey, value: R) {
        let maxsize = self.shared.config.maxsize;
        if maxsize == Some(0) {
            return;
        }

        let now = self.shared.clock.now();
        let mut guard = self.shared.state.lock();
        let state = &mut *guard;
        // Checked again so a value produced across an epoch boundary lands in
        // the new epoch instead of being wiped by the next call.
        self.expire_if_due(state, now);

        if let Some(entry) = state.map.get_mut(&key) {
            entry.value = value;
            if self.tracks_recency() {
                move_key_to_end(&mut state.order, &key);
            }
            return;
        }

        let Some(maxsize) = maxsize else {
            state.map.insert(key, CacheEntry::new(value, now));
            return;
        };
        while state.map.len() >= maxsize {
            match pop_least_recent(&mut state.map, &mut state.order) {
                Some((_, evicted)) => debug!(
                    hits = evicted.hits,
                    age_ms = evicted.age(now).as_millis() as u64,
                    "evicted least recently used entry"
                ),
                None => break,
            }
        }
        state.map.insert(key.clone(), CacheEntry::new(value, now));
        state.order.push_back(key);
    }

    fn tracks_recency(&self) -> bool {
        self.shared.config.maxsize.is_some()
    }

    fn owns_gate(&self, key: &CacheKey, gate: &Arc<Mutex<()>>) -> bool {
        self.shared
            .in_flight
            .get(key)
            .map_or(false, |current| Arc::ptr_eq(current.value(), gate))
    }

    fn expire_if_due(&self, state: &mut State<R>, now: std::time::SystemTime) {
        if state.epoch.roll(now) {
            let dropped = state.map.len();
            state.map.clear();
            state.order.clear();
            #[cfg(feature = "stats")]
            self.shared.stats.record_expiration();
            info!(dropped, "cache lifetime elapsed, cleared all entries");
        }
    }

    fn record_hit(&self) {
        #[cfg(feature = "stats")]
        self.shared.stats.record_hit();
    }

    fn record_miss(&self) {
        #[cfg(feature = "stats")]
        self.shared.stats.record_miss();
    }

    /// Drops every entry and starts a new epoch.
    pub fn cache_clear(&self) {
        let now = self.shared.clock.now();
        let mut state = self.shared.state.lock();
        state.map.clear();
        state.order.clear();
        state.epoch.restart(now);
        #[cfg(feature = "stats")]
        self.shared.stats.reset();
        debug!("cache cleared");
    }

    /// Hit/miss counters and current size. Counters are zero without the
    /// `stats` feature.
    pub fn cache_info(&self) -> CacheInfo {
        let currsize = self.len();
        #[cfg(feature = "stats")]
        let (hits, misses) = (self.shared.stats.hits(), self.shared.stats.misses());
        #[cfg(not(feature = "stats"))]
        let (hits, misses) = (0, 0);
        CacheInfo {
            hits,
            misses,
            maxsize: self.shared.config.maxsize,
            currsize,
        }
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }

    /// Number of live entries. An ended epoch counts as empty.
    pub fn len(&self) -> usize {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        if state.epoch.is_expired(now) {
            0
        } else {
            state.map.len()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is cached, without touching its recency.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        !state.epoch.is_expired(now) && state.map.contains_key(key)
    }

    /// Keys from least to most recently used.
    ///
    /// Without `maxsize` recency is not tracked and the order is unspecified.
    pub fn keys(&self) -> Vec<CacheKey> {
        let now = self.shared.clock.now();
        let state = self.shared.state.lock();
        if state.epoch.is_expired(now) {
            Vec::new()
        } else if self.tracks_recency() {
            state.order.iter().cloned().collect()
        } else {
            state.map.keys().cloned().collect()
        }
    }
}

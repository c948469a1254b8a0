//! # Framecache
//!
//! Memoization for expensive, deterministic functions that produce data.
//!
//! Two attributes cover two lifetimes of a result:
//!
//! - `#[cache_to_file]` writes the result to one file and reuses it across
//!   process restarts until the file is older than `refresh_time`.
//! - `#[timed_lru_cache]` keeps results in memory keyed by the call arguments,
//!   evicting the least recently used entry when full and dropping everything
//!   once the cache's lifetime runs out.
//!
//! Both are built on types from `framecache_core` ([`FileCache`],
//! [`TimedLruCache`]) that can also be used directly.
//!
//! ## In-memory caching
//!
//! ```rust
//! use framecache::timed_lru_cache;
//!
//! #[timed_lru_cache(seconds = 60, maxsize = 32)]
//! fn moving_average(window: usize) -> f64 {
//!     let prices = [10.0, 11.0, 12.0, 13.0];
//!     prices[..window].iter().sum::<f64>() / window as f64
//! }
//!
//! assert_eq!(moving_average(2), 10.5);
//! assert_eq!(moving_average(2), 10.5);
//!
//! let info = framecache::cache_info("moving_average").unwrap();
//! assert_eq!((info.hits, info.misses, info.currsize), (1, 1, 1));
//! ```
//!
//! ## File caching
//!
//! Storage failures are reported through the function's own error type, which
//! must implement `From<StorageError>`:
//!
//! ```rust
//! use framecache::{cache_to_file, StorageError};
//!
//! #[derive(Debug)]
//! enum AppError {
//!     Storage(StorageError),
//! }
//!
//! impl From<StorageError> for AppError {
//!     fn from(err: StorageError) -> Self {
//!         AppError::Storage(err)
//!     }
//! }
//!
//! #[cache_to_file(path = std::env::temp_dir().join("framecache-doc/levels.json"), codec = "json", refresh_time = 0)]
//! fn levels() -> Result<Vec<u32>, AppError> {
//!     Ok(vec![1, 2, 3])
//! }
//!
//! assert_eq!(levels().unwrap(), vec![1, 2, 3]);
//! ```
//!
//! ## Composition
//!
//! The wrappers return ordinary closures, so an in-memory cache can sit in
//! front of a file cache:
//!
//! ```rust
//! use framecache::{FileCache, FileCacheConfig, JsonCodec, TimedCacheConfig, TimedLruCache};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let file = FileCache::new(FileCacheConfig::new(dir.path().join("ids.json")), JsonCodec::new());
//! let from_disk = file.wrap(|(): ()| Ok::<_, std::io::Error>(vec![7u64, 8, 9]));
//!
//! let memory: TimedLruCache<Vec<u64>> = TimedLruCache::new(TimedCacheConfig::new().seconds(30));
//! let ids = memory.try_wrap(move |(): ()| from_disk(()));
//!
//! assert_eq!(ids(()).unwrap(), vec![7, 8, 9]);
//! assert_eq!(memory.cache_info().currsize, 1);
//! ```

pub use framecache_core::*;
pub use framecache_macros::{cache_to_file, timed_lru_cache};

/// Clears the registered cache called `name`.
///
/// Macro-generated caches register under their function name, or under the
/// `name` attribute when given. Returns `false` if no such cache exists yet;
/// a function's cache is created on its first call.
pub fn cache_clear(name: &str) -> bool {
    CacheRegistry::global().clear(name)
}

/// Hit/miss counters and size of the registered cache called `name`.
pub fn cache_info(name: &str) -> Option<CacheInfo> {
    CacheRegistry::global().info(name)
}

/// Clears every registered cache and returns how many were cleared.
pub fn cache_clear_all() -> usize {
    CacheRegistry::global().clear_all()
}

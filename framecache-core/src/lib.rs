//! # Framecache Core
//!
//! Building blocks for the framecache memoization library.
//!
//! Two independent caches live here:
//!
//! - [`FileCache`] persists a producer's result to one file and serves it until
//!   the file's modification time is older than a refresh interval.
//! - [`TimedLruCache`] keeps results in memory, keyed by call arguments, bounded
//!   by an LRU entry count and by one expiration instant shared by all entries.
//!
//! They compose: an in-memory cache can sit in front of a file cache, and each
//! keeps its own policy.
//!
//! ## Module Organization
//!
//! - [`keys`] - canonical argument keys, typed or untyped
//! - [`codec`] - how a file cache stores values, with a JSON codec
//! - [`frame`] - a small tabular type and its CSV codec
//! - [`file_cache`] - the stale-file cache
//! - [`timed_cache`] - the epoch-bounded LRU cache
//! - [`registry`] - named caches reachable from anywhere in the process
//! - [`clock`] - injectable time source

pub mod clock;
pub mod codec;
pub mod file_cache;
pub mod frame;
pub mod keys;
pub mod registry;
pub mod timed_cache;
pub mod utils;

mod cache_entry;
mod epoch;
mod error;

#[cfg(feature = "stats")]
mod stats;

pub use cache_entry::CacheEntry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use codec::{Codec, JsonCodec};
pub use epoch::CacheEpoch;
pub use error::{CacheError, CacheMiss, CodecError, StorageError};
pub use file_cache::{FileCache, FileCacheConfig, Lookup};
pub use frame::{Column, CsvCodec, DType, Frame, FrameError, Value};
pub use keys::{ArgValue, CacheKey, CacheableArg, KeyArgs, KeyBuilder};
pub use registry::{CacheRegistry, ManagedCache};
pub use timed_cache::{CacheInfo, TimedCacheConfig, TimedLruCache};

#[cfg(feature = "stats")]
pub use stats::CacheStats;

/// Items used by code generated in `framecache-macros`. Not public API.
#[doc(hidden)]
pub mod __private {
    pub use once_cell::sync::Lazy;
}

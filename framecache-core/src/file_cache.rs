use std::fmt;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::clock::{system_clock, Clock};
use crate::codec::Codec;
use crate::error::{CacheError, CacheMiss, StorageError};

#[cfg(feature = "stats")]
use crate::CacheStats;

/// Settings for a [`FileCache`].
///
/// # Examples
///
/// ```
/// use framecache_core::FileCacheConfig;
/// use std::time::Duration;
///
/// let config = FileCacheConfig::new("cache/prices.csv").refresh_secs(3600);
/// assert_eq!(config.refresh_time, Some(Duration::from_secs(3600)));
/// assert!(config.create_dirs);
/// assert!(config.atomic_write);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileCacheConfig {
    /// Location of the cached object.
    pub path: PathBuf,
    /// Maximum age before the object is regenerated. `None` means never.
    pub refresh_time: Option<Duration>,
    /// Create missing parent directories before writing.
    pub create_dirs: bool,
    /// Write to a temporary sibling file and rename it over the target.
    pub atomic_write: bool,
}

impl FileCacheConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            refresh_time: None,
            create_dirs: true,
            atomic_write: true,
        }
    }

    pub fn refresh_time(mut self, refresh_time: Duration) -> Self {
        self.refresh_time = Some(refresh_time);
        self
    }

    pub fn refresh_secs(self, seconds: u64) -> Self {
        self.refresh_time(Duration::from_secs(seconds))
    }

    pub fn create_dirs(mut self, create_dirs: bool) -> Self {
        self.create_dirs = create_dirs;
        self
    }

    pub fn atomic_write(mut self, atomic_write: bool) -> Self {
        self.atomic_write = atomic_write;
        self
    }
}

/// Outcome of checking the stored object without producing anything.
#[derive(Clone, Debug, PartialEq)]
pub enum Lookup<T> {
    /// The object exists, is fresh, and decoded cleanly.
    Fresh(T),
    /// The producer has to run.
    Miss(CacheMiss),
}

struct FileShared<C> {
    config: FileCacheConfig,
    codec: C,
    clock: Arc<dyn Clock>,
    #[cfg(feature = "stats")]
    stats: CacheStats,
}

/// Memoizes a producer's result in one file, reused until it goes stale.
///
/// Every call first checks the file. If it exists and its modification time is
/// less than `refresh_time` ago (or `refresh_time` is `None`), it is decoded and
/// returned without running the producer. Otherwise parent directories are
/// created if configured, the producer runs, and its result overwrites the file.
///
/// A file that exists but cannot be read or decoded is an error, not a miss.
///
/// There is no locking across processes or threads: concurrent misses may each
/// run the producer, and the last write wins. With `atomic_write` (the default)
/// readers never see a half-written file.
///
/// # Examples
///
/// ```
/// use framecache_core::{CacheError, FileCache, FileCacheConfig, JsonCodec};
///
/// let dir = tempfile::tempdir().unwrap();
/// let cache = FileCache::new(FileCacheConfig::new(dir.path().join("squares.json")), JsonCodec::new());
///
/// let squares = cache.wrap(|(n,): (u32,)| Ok::<_, std::io::Error>((0..n).map(|i| i * i).collect::<Vec<_>>()));
///
/// assert_eq!(squares((4,)).unwrap(), vec![0, 1, 4, 9]);
/// // Served from disk: the argument no longer matters.
/// assert_eq!(squares((2,)).unwrap(), vec![0, 1, 4, 9]);
/// ```
pub struct FileCache<C> {
    shared: Arc<FileShared<C>>,
}

impl<C> Clone for FileCache<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C> fmt::Debug for FileCache<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileCache")
            .field("config", &self.shared.config)
            .finish()
    }
}

impl<C> FileCache<C> {
    pub fn new(config: FileCacheConfig, codec: C) -> Self {
        Self::from_parts(config, codec, system_clock())
    }

    pub fn with_clock<K: Clock + 'static>(config: FileCacheConfig, codec: C, clock: K) -> Self {
        Self::from_parts(config, codec, Arc::new(clock))
    }

    fn from_parts(config: FileCacheConfig, codec: C, clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(FileShared {
                config,
                codec,
                clock,
                #[cfg(feature = "stats")]
                stats: CacheStats::new(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.shared.config.path
    }

    pub fn config(&self) -> &FileCacheConfig {
        &self.shared.config
    }

    pub fn codec(&self) -> &C {
        &self.shared.codec
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.shared.stats
    }

    /// Decides from file metadata alone whether the stored object can be used.
    ///
    /// `Ok(None)` means present and fresh.
    pub fn check(&self) -> Result<Option<CacheMiss>, StorageError> {
        let path = self.path();
        let metadata = match fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(source) if source.kind() == io::ErrorKind::NotFound => {
                return Ok(Some(CacheMiss::Absent))
            }
            Err(source) => {
                return Err(StorageError::Metadata {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        if !metadata.is_file() {
            return Err(StorageError::NotAFile {
                path: path.to_path_buf(),
            });
        }

        let Some(refresh_time) = self.shared.config.refresh_time else {
            return Ok(None);
        };
        let modified = metadata
            .modified()
            .map_err(|source| StorageError::Metadata {
                path: path.to_path_buf(),
                source,
            })?;
        // A modification time ahead of the clock counts as brand new.
        let age = self
            .shared
            .clock
            .now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= refresh_time {
            Ok(Some(CacheMiss::Stale { age, refresh_time }))
        } else {
            Ok(None)
        }
    }

    /// Checks and, if usable, decodes the stored object.
    pub fn lookup<T>(&self) -> Result<Lookup<T>, StorageError>
    where
        C: Codec<T>,
    {
        if let Some(miss) = self.check()? {
            return Ok(Lookup::Miss(miss));
        }
        match self.shared.codec.read(self.path()) {
            Ok(value) => Ok(Lookup::Fresh(value)),
            // Removed between the metadata check and the read.
            Err(err) if err.is_not_found() => Ok(Lookup::Miss(CacheMiss::Absent)),
            Err(err) => Err(err),
        }
    }

    /// Returns the stored object, or runs `producer` and stores its result.
    pub fn get_or_refresh<T, E, F>(&self, producer: F) -> Result<T, CacheError<E>>
    where
        C: Codec<T>,
        F: FnOnce() -> Result<T, E>,
    {
        match self.lookup()? {
            Lookup::Fresh(value) => {
                #[cfg(feature = "stats")]
                self.shared.stats.record_hit();
                debug!(path = %self.path().display(), "serving cached object");
                Ok(value)
            }
            Lookup::Miss(miss) => {
                #[cfg(feature = "stats")]
                self.shared.stats.record_miss();
                match miss {
                    CacheMiss::Absent => {
                        debug!(path = %self.path().display(), "no cached object, generating")
                    }
                    CacheMiss::Stale { age, refresh_time } => info!(
                        path = %self.path().display(),
                        age_secs = age.as_secs(),
                        refresh_secs = refresh_time.as_secs(),
                        "cached object is too old, regenerating"
                    ),
                }
                self.refresh(producer)
            }
        }
    }

    /// Runs `producer` and overwrites the stored object, ignoring freshness.
    pub fn refresh<T, E, F>(&self, producer: F) -> Result<T, CacheError<E>>
    where
        C: Codec<T>,
        F: FnOnce() -> Result<T, E>,
    {
        self.prepare_dirs()?;
        let value = producer().map_err(CacheError::Producer)?;
        if let Err(err) = self.persist(&value) {
            warn!(path = %self.path().display(), error = %err, "failed to store cached object");
            return Err(err.into());
        }
        Ok(value)
    }

    /// Wraps a producer so each call goes through [`get_or_refresh`](Self::get_or_refresh).
    ///
    /// The arguments are handed to the producer on a miss; they do not take part
    /// in the decision, which depends on the file alone.
    pub fn wrap<A, T, E, F>(&self, producer: F) -> impl Fn(A) -> Result<T, CacheError<E>>
    where
        C: Codec<T>,
        F: Fn(A) -> Result<T, E>,
    {
        let cache = self.clone();
        move |args: A| cache.get_or_refresh(|| producer(args))
    }

    fn prepare_dirs(&self) -> Result<(), StorageError> {
        if !self.shared.config.create_dirs {
            return Ok(());
        }
        match self.path().parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|source| StorageError::CreateDirs {
                    path: self.path().to_path_buf(),
                    source,
                })
            }
            _ => Ok(()),
        }
    }

    fn persist<T>(&self, value: &T) -> Result<(), StorageError>
    where
        C: Codec<T>,
    {
        let path = self.path();
        let codec = &self.shared.codec;
        if !self.shared.config.atomic_write {
            return codec.write(path, value);
        }

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let write_err = |source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_err)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            codec
                .encode(&mut writer, value)
                .map_err(|source| StorageError::Encode {
                    path: path.to_path_buf(),
                    source,
                })?;
            writer.flush().map_err(write_err)?;
        }
        tmp.persist(path).map_err(|err| StorageError::Persist {
            path: path.to_path_buf(),
            source: err.error,
        })?;
        Ok(())
    }
}

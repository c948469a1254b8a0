use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Boxed error produced by a [`Codec`](crate::Codec) while decoding or encoding.
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

/// Why a file cache could not serve its stored object.
///
/// Both variants lead to the same action: run the producer and overwrite the
/// object. They are kept apart only so callers and logs can tell them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMiss {
    /// Nothing is stored at the path yet.
    Absent,
    /// An object exists but is older than the refresh time.
    Stale { age: Duration, refresh_time: Duration },
}

/// Filesystem and codec failures other than plain absence.
///
/// These are never retried or masked; they reach the caller as
/// [`CacheError::Storage`].
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("no cached object at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("cache path {} is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error("failed to inspect {}", path.display())]
    Metadata {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directories for {}", path.display())]
    CreateDirs {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cached object at {} is malformed", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("failed to encode value for {}", path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: CodecError,
    },

    #[error("failed to move temporary file into place at {}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StorageError {
    /// Returns `true` for the "nothing stored" case, which callers treat as a miss.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound { .. })
    }
}

/// Error returned by a wrapped producer call.
///
/// `Producer` carries the producer's own error untouched. `Storage` means the
/// cache itself failed.
#[derive(Debug, Error)]
pub enum CacheError<E> {
    #[error("{0}")]
    Producer(E),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl<E> CacheError<E> {
    /// Folds a storage failure into the producer's error type.
    ///
    /// Used by `#[cache_to_file]`, whose functions keep their declared
    /// `Result<T, E>` signature.
    pub fn into_inner(self) -> E
    where
        E: From<StorageError>,
    {
        match self {
            CacheError::Producer(err) => err,
            CacheError::Storage(err) => E::from(err),
        }
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, CacheError::Storage(_))
    }

    /// Returns the producer error, if this is one.
    pub fn producer(&self) -> Option<&E> {
        match self {
            CacheError::Producer(err) => Some(err),
            CacheError::Storage(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        let err = StorageError::NotFound {
            path: PathBuf::from("missing.csv"),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "no cached object at missing.csv");
    }

    #[test]
    fn test_into_inner_keeps_producer_error() {
        #[derive(Debug, PartialEq)]
        enum AppError {
            Upstream(&'static str),
            Cache(String),
        }

        impl From<StorageError> for AppError {
            fn from(err: StorageError) -> Self {
                AppError::Cache(err.to_string())
            }
        }

        let producer: CacheError<AppError> = CacheError::Producer(AppError::Upstream("down"));
        assert!(!producer.is_storage());
        assert_eq!(producer.into_inner(), AppError::Upstream("down"));

        let storage: CacheError<AppError> = StorageError::NotAFile {
            path: PathBuf::from("dir"),
        }
        .into();
        assert!(storage.is_storage());
        assert_eq!(
            storage.into_inner(),
            AppError::Cache("cache path dir is not a regular file".to_string())
        );
    }
}

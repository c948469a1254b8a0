//! Storage codecs used by [`FileCache`](crate::FileCache).
//!
//! A codec turns a value into bytes and back. [`Codec::read`] must report a
//! missing file as [`StorageError::NotFound`] so the cache can tell absence from
//! real failures.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::error::{CodecError, StorageError};

/// Reads and writes values of type `T` to a storage location.
pub trait Codec<T>: Send + Sync {
    /// Decodes a value from `reader`.
    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError>;

    /// Encodes `value` into `writer`.
    fn encode(&self, writer: &mut dyn Write, value: &T) -> Result<(), CodecError>;

    /// Reads the object stored at `path`.
    fn read(&self, path: &Path) -> Result<T, StorageError> {
        let file = File::open(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                StorageError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                StorageError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let mut reader = BufReader::new(file);
        self.decode(&mut reader)
            .map_err(|source| StorageError::Decode {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Overwrites the object at `path` with `value`.
    fn write(&self, path: &Path, value: &T) -> Result<(), StorageError> {
        let file = File::create(path).map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        let mut writer = BufWriter::new(file);
        self.encode(&mut writer, value)
            .map_err(|source| StorageError::Encode {
                path: path.to_path_buf(),
                source,
            })?;
        writer.flush().map_err(|source| StorageError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// JSON codec for any serde value.
///
/// # Examples
///
/// ```
/// use framecache_core::{Codec, JsonCodec};
///
/// let codec = JsonCodec::new();
/// let mut buf = Vec::new();
/// codec.encode(&mut buf, &vec![1, 2, 3]).unwrap();
///
/// let back: Vec<i32> = codec.decode(&mut buf.as_slice()).unwrap();
/// assert_eq!(back, vec![1, 2, 3]);
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec {
    pretty: bool,
}

impl JsonCodec {
    pub fn new() -> Self {
        Self { pretty: false }
    }

    /// Writes indented JSON.
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl<T> Codec<T> for JsonCodec
where
    T: Serialize + DeserializeOwned,
{
    fn decode(&self, reader: &mut dyn Read) -> Result<T, CodecError> {
        Ok(serde_json::from_reader(reader)?)
    }

    fn encode(&self, writer: &mut dyn Write, value: &T) -> Result<(), CodecError> {
        if self.pretty {
            serde_json::to_writer_pretty(writer, value)?;
        } else {
            serde_json::to_writer(writer, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Quote {
        symbol: String,
        prices: Vec<f64>,
        meta: BTreeMap<String, i64>,
    }

    fn sample() -> Quote {
        Quote {
            symbol: "ACME".into(),
            prices: vec![1.5, 2.25, 3.0],
            meta: BTreeMap::from([("volume".into(), 1200), ("trades".into(), 17)]),
        }
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quote.json");
        let codec = JsonCodec::pretty();

        codec.write(&path, &sample()).unwrap();
        let back: Quote = codec.read(&path).unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn test_read_missing_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Quote, _> = JsonCodec::new().read(&dir.path().join("nope.json"));
        assert!(result.unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_garbage_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quote.json");
        std::fs::write(&path, "{ not json").unwrap();

        let result: Result<Quote, _> = JsonCodec::new().read(&path);
        assert!(matches!(result, Err(StorageError::Decode { .. })));
    }
}

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O failed for {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage file is corrupt: {0}")]
    Corrupt(String),

    #[error("Invalid value stored under '{key}': {source}")]
    InvalidValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Storage is read-only")]
    ReadOnly,

    #[error("Storage lock poisoned")]
    Poisoned,
}

//! Local key-value storage.
//!
//! This module provides the `KeyValueStore` trait, a flat string-to-string
//! space with browser local-storage semantics, and two backends:
//! - `JsonFileStore`: every key in one JSON object on disk
//! - `MemoryStore`: in-process map, used by tests and ephemeral sessions
//!
//! Writers are read-modify-write without transactional isolation; all callers
//! are expected to run on one logical UI context.

pub mod error;
pub mod file;
pub mod memory;

use serde::{de::DeserializeOwned, Serialize};

pub use error::StorageError;
pub use file::JsonFileStore;
pub use memory::MemoryStore;

pub type StorageResult<T> = std::result::Result<T, StorageError>;

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    fn remove(&self, key: &str) -> StorageResult<()>;
}

/// Read a key and parse its value as JSON.
///
/// A missing key is `Ok(None)`; a present but unparsable value is
/// `StorageError::InvalidValue`.
pub fn get_json<T: DeserializeOwned>(
    store: &dyn KeyValueStore,
    key: &str,
) -> StorageResult<Option<T>> {
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StorageError::InvalidValue {
                key: key.to_string(),
                source,
            }),
        None => Ok(None),
    }
}

/// Serialize a value as JSON text and store it under `key`.
pub fn set_json<T: Serialize + ?Sized>(
    store: &dyn KeyValueStore,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|source| StorageError::InvalidValue {
        key: key.to_string(),
        source,
    })?;
    store.set(key, &raw)
}

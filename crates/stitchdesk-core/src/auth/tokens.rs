use std::sync::Arc;

use tracing::debug;

use crate::config::StorageKeys;
use crate::storage::{KeyValueStore, StorageResult};

/// Access and refresh tokens persisted in the key-value store.
///
/// Tokens are stored as raw strings under the configured keys, not as JSON.
/// Clone is cheap; clones share the same backing store.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn KeyValueStore>,
    access_key: String,
    refresh_key: String,
}

impl TokenStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, keys: &StorageKeys) -> Self {
        Self {
            storage,
            access_key: keys.access_token.clone(),
            refresh_key: keys.refresh_token.clone(),
        }
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(&self.access_key)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(&self.refresh_key)
    }

    /// Store a fresh login. A missing refresh token removes any stale one.
    pub fn set_tokens(&self, access: &str, refresh: Option<&str>) -> StorageResult<()> {
        self.storage.set(&self.access_key, access)?;
        match refresh {
            Some(refresh) => self.storage.set(&self.refresh_key, refresh)?,
            None => self.storage.remove(&self.refresh_key)?,
        }
        debug!(has_refresh = refresh.is_some(), "Stored session tokens");
        Ok(())
    }

    /// Replace only the access token, after a refresh.
    pub fn set_access_token(&self, access: &str) -> StorageResult<()> {
        self.storage.set(&self.access_key, access)
    }

    /// Remove both tokens. Both removals are attempted before any error is returned.
    pub fn clear(&self) -> StorageResult<()> {
        let access = self.storage.remove(&self.access_key);
        let refresh = self.storage.remove(&self.refresh_key);
        debug!("Cleared session tokens");
        access.and(refresh)
    }
}

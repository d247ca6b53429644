use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::ApiClient;
use crate::session::{AuthSession, SessionSnapshot};

use super::TokenStore;

/// Session backed by the locally stored tokens.
///
/// Authenticated means an access token is present; whether it is still
/// valid is the monitor's call.
pub struct LocalSession {
    tokens: TokenStore,
    api: Option<ApiClient>,
}

impl LocalSession {
    /// `api` is used for server-side logout; pass `None` to only clear locally.
    pub fn new(tokens: TokenStore, api: Option<ApiClient>) -> Self {
        Self { tokens, api }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }
}

#[async_trait]
impl AuthSession for LocalSession {
    fn snapshot(&self) -> SessionSnapshot {
        match self.tokens.access_token() {
            Ok(token) => SessionSnapshot {
                is_authenticated: token.is_some(),
                token,
            },
            Err(e) => {
                warn!(error = %e, "Failed to read access token");
                SessionSnapshot::default()
            }
        }
    }

    async fn logout(&self) -> Result<()> {
        let remote = match &self.api {
            Some(api) => api.logout().await,
            None => Ok(()),
        };
        // Local tokens go regardless of what the server said
        self.tokens
            .clear()
            .context("Failed to clear stored tokens")?;
        remote.context("Server-side logout failed")?;
        info!("Logged out");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::config::{Config, StorageKeys};
    use crate::session::TokenExpiredSignal;
    use crate::storage::MemoryStore;
    use crate::token::tests::token_expiring_at;

    fn tokens() -> TokenStore {
        TokenStore::new(Arc::new(MemoryStore::new()), &StorageKeys::default())
    }

    #[test]
    fn test_snapshot_reflects_stored_token() {
        let tokens = tokens();
        let session = LocalSession::new(tokens.clone(), None);
        assert_eq!(session.snapshot(), SessionSnapshot::default());

        tokens.set_tokens("abc", None).unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.is_authenticated);
        assert_eq!(snapshot.token.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_local_logout_clears_tokens() {
        let tokens = tokens();
        tokens.set_tokens("abc", Some("def")).unwrap();
        let session = LocalSession::new(tokens.clone(), None);

        session.logout().await.unwrap();
        assert!(!session.snapshot().is_authenticated);
        assert_eq!(tokens.refresh_token().unwrap(), None);
    }

    #[tokio::test]
    async fn test_failed_server_logout_still_clears_tokens() {
        let config = Config {
            // Nothing listens on the discard port
            api_base_url: "http://127.0.0.1:9/api".to_string(),
            request_timeout_secs: 1,
            ..Config::default()
        };
        let tokens = tokens();
        tokens
            .set_tokens(&token_expiring_at(Utc::now().timestamp() + 3600), Some("r"))
            .unwrap();
        let api = ApiClient::new(&config, tokens.clone(), TokenExpiredSignal::new()).unwrap();
        let session = LocalSession::new(tokens.clone(), Some(api));

        assert!(session.logout().await.is_err());
        assert_eq!(tokens.access_token().unwrap(), None);
    }
}

//! API client for the tailoring dashboard backend.
//!
//! Every authenticated request passes through [`ApiClient::authorize`], which
//! refuses to send a token the [`TokenInspector`] already considers expired.
//! A 401 from the server gets exactly one refresh attempt before the session
//! is given up.

use std::time::Duration;

use reqwest::{header, Client, RequestBuilder, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::TokenStore;
use crate::config::Config;
use crate::session::TokenExpiredSignal;
use crate::token::TokenInspector;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Token refresh endpoint, relative to the API base URL.
const REFRESH_PATH: &str = "auth/refresh/";

/// Server-side logout endpoint, relative to the API base URL.
const LOGOUT_PATH: &str = "auth/logout/";

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access: String,
}

/// API client for the dashboard backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
    inspector: TokenInspector,
    signal: TokenExpiredSignal,
}

impl ApiClient {
    pub fn new(
        config: &Config,
        tokens: TokenStore,
        signal: TokenExpiredSignal,
    ) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens,
            inspector: TokenInspector::from_config(config),
            signal,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    // ========================================================================
    // Request gate
    // ========================================================================

    /// Decide which bearer token, if any, an outgoing request carries.
    ///
    /// No stored token means the request goes out anonymously. A stored token
    /// that is expired (or inside the expiry buffer) is never sent: the tokens
    /// are cleared, the expiry signal is raised and the request is rejected.
    pub fn authorize(&self) -> Result<Option<String>, ApiError> {
        match self.tokens.access_token()? {
            None => Ok(None),
            Some(token) if self.inspector.is_expired(Some(&token)) => {
                info!("Stored token expired, rejecting request");
                self.expire_session();
                Err(ApiError::TokenExpired)
            }
            Some(token) => Ok(Some(token)),
        }
    }

    /// Drop the local session and tell listeners it is gone.
    fn expire_session(&self) {
        if let Err(e) = self.tokens.clear() {
            warn!(error = %e, "Failed to clear tokens for expired session");
        }
        self.signal.notify();
    }

    fn with_bearer(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    // ========================================================================
    // Requests
    // ========================================================================

    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Send a request built by `build`, backing off on 429.
    async fn send_with_backoff<F>(
        &self,
        build: &F,
        token: Option<&str>,
    ) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = Self::with_bearer(build(&self.client), token)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            if response.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(response);
            }
            retries += 1;
            if retries > MAX_RATE_LIMIT_RETRIES {
                return Err(ApiError::RateLimited);
            }
            warn!(retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
            tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
            backoff_ms *= 2;
        }
    }

    /// Run a request through the gate, refreshing once on 401.
    async fn execute<F>(&self, build: F) -> Result<reqwest::Response, ApiError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.authorize()?;
        let response = self.send_with_backoff(&build, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Self::check_response(response).await;
        }

        debug!("Request unauthorized, attempting token refresh");
        match self.refresh_access_token().await {
            Ok(access) => {
                let retry = self.send_with_backoff(&build, Some(&access)).await?;
                if retry.status() == StatusCode::UNAUTHORIZED {
                    warn!("Request still unauthorized after refresh");
                    self.expire_session();
                    return Err(ApiError::Unauthorized);
                }
                Self::check_response(retry).await
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.expire_session();
                Err(ApiError::Unauthorized)
            }
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.execute(|client| client.get(&url)).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        let response = self.execute(|client| client.post(&url).json(body)).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)))
    }

    // ========================================================================
    // Session endpoints
    // ========================================================================

    /// Exchange the stored refresh token for a new access token and store it.
    ///
    /// Sent without a bearer token so it never goes through the request gate.
    pub async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let refresh = self.tokens.refresh_token()?.ok_or(ApiError::Unauthorized)?;
        let url = self.url(REFRESH_PATH);

        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&RefreshRequest { refresh: &refresh })
            .send()
            .await?;
        let response = Self::check_response(response).await?;

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("refresh response: {}", e)))?;
        self.tokens.set_access_token(&refreshed.access)?;
        info!("Access token refreshed");
        Ok(refreshed.access)
    }

    /// Revoke the session on the server.
    ///
    /// Bypasses the gate: an expired token is not sent and the call is
    /// skipped, since the server would reject it anyway. Local tokens are
    /// left to the caller.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let token = match self.tokens.access_token()? {
            Some(token) if !self.inspector.is_expired(Some(&token)) => token,
            _ => {
                debug!("No usable token, skipping server-side logout");
                return Ok(());
            }
        };
        let refresh = self.tokens.refresh_token()?;
        let body = serde_json::json!({ "refresh": refresh });

        let response = self
            .client
            .post(self.url(LOGOUT_PATH))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        Self::check_response(response).await?;
        debug!("Server-side logout complete");
        Ok(())
    }
}

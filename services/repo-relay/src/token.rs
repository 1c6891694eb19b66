//! Installation Token Exchange
//!
//! Trades a signed app assertion for a short-lived installation access token,
//! with an optional cache that reuses the token until shortly before it expires.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::RelayError;

/// GitHub REST API version header value
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Media type for GitHub REST and GraphQL requests
pub const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Cached tokens are refreshed this long before GitHub expires them
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// Response from GitHub installation token endpoint
#[derive(Clone, Deserialize)]
pub struct InstallationToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl InstallationToken {
    /// Whether the token is still usable at `now`, leaving `margin` to spare
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        self.expires_at - margin > now
    }
}

impl fmt::Debug for InstallationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstallationToken")
            .field("token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Client for the `app/installations/{id}/access_tokens` endpoint
#[derive(Debug, Clone)]
pub struct TokenExchanger {
    client: Client,
    api_url: String,
}

impl TokenExchanger {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Exchange JWT for an installation access token using the GitHub REST API
    ///
    /// One attempt only; any failure is returned as [`RelayError::AuthExchange`].
    pub async fn exchange(
        &self,
        assertion: &str,
        installation_id: u64,
    ) -> Result<InstallationToken, RelayError> {
        let url = format!(
            "{}/app/installations/{}/access_tokens",
            self.api_url, installation_id
        );

        debug!(installation_id, "Requesting installation token");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", assertion))
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await
            .map_err(RelayError::exchange_transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(installation_id, status = %status, "Installation token exchange rejected");
            return Err(RelayError::AuthExchange {
                status: Some(status.as_u16()),
                body,
            });
        }

        let token = response
            .json::<InstallationToken>()
            .await
            .map_err(|e| RelayError::AuthExchange {
                status: Some(status.as_u16()),
                body: format!("Failed to parse installation token response: {}", e),
            })?;

        info!(
            installation_id,
            expires_at = %token.expires_at,
            "Installation token issued"
        );

        Ok(token)
    }
}

/// Installation tokens keyed by installation ID
#[derive(Debug)]
pub struct TokenCache {
    margin: Duration,
    tokens: Mutex<HashMap<u64, InstallationToken>>,
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(Duration::seconds(REFRESH_MARGIN_SECS))
    }
}

impl TokenCache {
    pub fn new(margin: Duration) -> Self {
        Self {
            margin,
            tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached token for `installation_id`, or run `fetch` and cache its result
    ///
    /// The lock is held across `fetch`, so concurrent callers wait for a single refresh.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        installation_id: u64,
        now: DateTime<Utc>,
        fetch: F,
    ) -> Result<InstallationToken, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<InstallationToken, RelayError>>,
    {
        let mut tokens = self.tokens.lock().await;

        if let Some(token) = tokens.get(&installation_id) {
            if token.is_fresh(now, self.margin) {
                debug!(installation_id, "Reusing cached installation token");
                return Ok(token.clone());
            }
        }

        let token = fetch().await?;
        tokens.insert(installation_id, token.clone());
        Ok(token)
    }

    /// Drop any cached token for `installation_id`
    pub async fn invalidate(&self, installation_id: u64) {
        self.tokens.lock().await.remove(&installation_id);
    }
}

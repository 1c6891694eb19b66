//! Relay Pipeline
//!
//! Sign an app assertion, exchange it for an installation token, then run the
//! repository query. Each stage is awaited in order; nothing is retried.

use chrono::Utc;
use reqwest::Client;
use tracing::{info, instrument};

use crate::auth::{sign_app_assertion, unix_now};
use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::repository::{RepoRef, RepositoryClient, RepositoryView};
use crate::token::{InstallationToken, TokenCache, TokenExchanger};

const USER_AGENT: &str = concat!("repo-relay/", env!("CARGO_PKG_VERSION"));

/// Request pipeline shared by all handlers
#[derive(Debug)]
pub struct RepoRelay {
    config: RelayConfig,
    exchanger: TokenExchanger,
    repositories: RepositoryClient,
    cache: Option<TokenCache>,
}

impl RepoRelay {
    /// Build the relay and its HTTP client from startup configuration
    pub fn new(config: RelayConfig) -> Result<Self, RelayError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        let cache = config.token_cache.then(TokenCache::default);

        Ok(Self {
            exchanger: TokenExchanger::new(client.clone(), config.api_url.clone()),
            repositories: RepositoryClient::new(client, config.api_url.clone()),
            cache,
            config,
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// Mint a new installation token: sign, then exchange
    async fn issue_token(&self) -> Result<InstallationToken, RelayError> {
        let credential = &self.config.credential;
        let assertion = sign_app_assertion(credential, unix_now())?;
        self.exchanger
            .exchange(&assertion, credential.installation_id)
            .await
    }

    /// Installation token for this request, from the cache when enabled
    pub async fn installation_token(&self) -> Result<InstallationToken, RelayError> {
        match &self.cache {
            Some(cache) => {
                cache
                    .get_or_fetch(self.config.credential.installation_id, Utc::now(), || {
                        self.issue_token()
                    })
                    .await
            }
            None => self.issue_token().await,
        }
    }

    /// Fetch and flatten repository metadata for `repo`
    #[instrument(skip(self, repo), fields(owner = %repo.owner, name = %repo.name))]
    pub async fn fetch_repository(&self, repo: &RepoRef) -> Result<RepositoryView, RelayError> {
        let token = self.installation_token().await?;

        let result = self.repositories.fetch(&token.token, repo).await;

        if let (Err(RelayError::TokenRejected(_)), Some(cache)) = (&result, &self.cache) {
            cache
                .invalidate(self.config.credential.installation_id)
                .await;
        }

        let view = result?;
        info!(
            stars = view.stargazer_count,
            has_release = view.latest_release.is_some(),
            "Repository data fetched"
        );
        Ok(view)
    }
}

//! Relay Configuration
//!
//! Credentials and server settings, read once at startup from command line
//! flags or environment variables and then shared immutably.

use clap::Parser;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::RelayError;

/// Default GitHub API base URL
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// GitHub App repository relay
#[derive(Parser, Debug, Clone)]
#[command(name = "repo-relay")]
#[command(about = "Serve GitHub repository metadata using GitHub App credentials")]
#[command(version)]
pub struct Args {
    /// GitHub App ID
    #[arg(long, env = "GITHUB_APP_ID")]
    pub app_id: Option<u64>,

    /// GitHub App Installation ID
    #[arg(long, env = "GITHUB_INSTALLATION_ID")]
    pub installation_id: Option<u64>,

    /// Private key PEM text (literal `\n` escapes are accepted)
    #[arg(long, env = "GITHUB_PRIVATE_KEY", hide_env_values = true)]
    pub private_key: Option<String>,

    /// Path to the private key PEM file
    #[arg(long, env = "GITHUB_PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,

    /// Address to listen on
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 4000)]
    pub port: u16,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Timeout for each outbound GitHub request, in seconds
    #[arg(long, env = "GITHUB_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Reuse installation tokens until shortly before they expire
    #[arg(
        long,
        env = "TOKEN_CACHE",
        value_parser = clap::builder::BoolishValueParser::new()
    )]
    pub token_cache: bool,
}

/// Where the GitHub App private key comes from
#[derive(Clone, PartialEq, Eq)]
pub enum PrivateKeySource {
    /// PEM text supplied directly
    Inline(String),
    /// Path to a PEM file
    File(PathBuf),
}

impl fmt::Debug for PrivateKeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrivateKeySource::Inline(_) => f.write_str("Inline(<redacted>)"),
            PrivateKeySource::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

impl PrivateKeySource {
    /// Pick the key source from the two optional inputs; exactly one must be set
    pub fn from_options(
        inline: Option<String>,
        path: Option<PathBuf>,
    ) -> Result<Self, RelayError> {
        match (inline, path) {
            (Some(pem), None) => Ok(PrivateKeySource::Inline(pem)),
            (None, Some(path)) => Ok(PrivateKeySource::File(path)),
            (Some(_), Some(_)) => Err(RelayError::Config(
                "Set only one of GITHUB_PRIVATE_KEY or GITHUB_PRIVATE_KEY_PATH".to_string(),
            )),
            (None, None) => Err(RelayError::Config(
                "GITHUB_PRIVATE_KEY or GITHUB_PRIVATE_KEY_PATH must be set".to_string(),
            )),
        }
    }

    /// Read the PEM bytes
    pub fn load(&self) -> Result<Vec<u8>, RelayError> {
        let pem = match self {
            // Single-line env values commonly carry escaped newlines
            PrivateKeySource::Inline(text) => text.replace("\\n", "\n").into_bytes(),
            PrivateKeySource::File(path) => fs::read(path).map_err(|e| {
                RelayError::Config(format!(
                    "Failed to read private key {}: {}",
                    path.display(),
                    e
                ))
            })?,
        };

        if pem.iter().all(u8::is_ascii_whitespace) {
            return Err(RelayError::Config("Private key is empty".to_string()));
        }

        Ok(pem)
    }
}

/// GitHub App identity used to mint installation tokens
#[derive(Clone)]
pub struct AppCredential {
    pub app_id: u64,
    pub installation_id: u64,
    private_key: Vec<u8>,
}

impl AppCredential {
    pub fn new(app_id: u64, installation_id: u64, private_key_pem: impl Into<Vec<u8>>) -> Self {
        Self {
            app_id,
            installation_id,
            private_key: private_key_pem.into(),
        }
    }

    /// The private key in PEM format
    pub fn private_key_pem(&self) -> &[u8] {
        &self.private_key
    }
}

impl fmt::Debug for AppCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredential")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Immutable runtime configuration, built once in `main`
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub credential: AppCredential,
    pub host: String,
    pub port: u16,
    pub api_url: String,
    pub request_timeout: Duration,
    pub token_cache: bool,
}

impl RelayConfig {
    /// Configuration with default server settings, pointed at `api_url`
    pub fn new(credential: AppCredential, api_url: impl Into<String>) -> Self {
        Self {
            credential,
            host: "0.0.0.0".to_string(),
            port: 4000,
            api_url: api_url.into(),
            request_timeout: Duration::from_secs(30),
            token_cache: false,
        }
    }

    /// `host:port` string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Args {
    /// Validate the parsed arguments and load the private key
    pub fn into_config(self) -> Result<RelayConfig, RelayError> {
        let app_id = self
            .app_id
            .ok_or_else(|| RelayError::Config("GITHUB_APP_ID must be set".to_string()))?;
        let installation_id = self.installation_id.ok_or_else(|| {
            RelayError::Config("GITHUB_INSTALLATION_ID must be set".to_string())
        })?;

        let key_source = PrivateKeySource::from_options(self.private_key, self.private_key_path)?;
        let private_key = key_source.load()?;

        let api_url = self.api_url.trim_end_matches('/').to_string();
        if api_url.is_empty() {
            return Err(RelayError::Config("GITHUB_API_URL is empty".to_string()));
        }

        Ok(RelayConfig {
            credential: AppCredential::new(app_id, installation_id, private_key),
            host: self.host,
            port: self.port,
            api_url,
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            token_cache: self.token_cache,
        })
    }
}

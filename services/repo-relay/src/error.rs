//! Relay Errors
//!
//! One error type for the whole request pipeline. Startup failures are
//! `Config`; everything else is converted into an HTTP response at the
//! facade boundary without leaking internal detail to the caller.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Message returned to callers for a request without `owner` or `name`
pub const MISSING_FIELDS_MESSAGE: &str = "Missing owner or name in request body";

/// Message returned to callers for any internal failure
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch repo data";

/// Message returned to callers when GitHub reports no such repository
pub const NOT_FOUND_MESSAGE: &str = "Repository not found";

/// Errors that can occur while relaying a repository request
#[derive(Debug, Error)]
pub enum RelayError {
    /// Invalid or missing startup configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The app assertion could not be signed (bad key, unsupported algorithm)
    #[error("Failed to sign app assertion: {0}")]
    Crypto(#[from] jsonwebtoken::errors::Error),

    /// GitHub refused or failed the installation token exchange
    #[error("Installation token exchange failed (status: {status:?}): {body}")]
    AuthExchange {
        /// Upstream HTTP status, absent for transport failures
        status: Option<u16>,
        /// Upstream body or transport error text
        body: String,
    },

    /// GraphQL endpoint answered 401; a `Query` failure that also evicts the cached token
    #[error("Installation token rejected: {0}")]
    TokenRejected(String),

    /// The GraphQL query failed or returned an unusable payload
    #[error("Repository query failed: {0}")]
    Query(String),

    /// GitHub resolved no repository for the given owner and name
    #[error("Repository not found: {owner}/{name}")]
    NotFound { owner: String, name: String },

    /// The request body is missing `owner` or `name`
    #[error("{}", MISSING_FIELDS_MESSAGE)]
    Validation,
}

impl RelayError {
    /// Build an exchange error from a transport-level failure
    pub fn exchange_transport(err: impl std::fmt::Display) -> Self {
        RelayError::AuthExchange {
            status: None,
            body: err.to_string(),
        }
    }

    /// HTTP status surfaced to the caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::Validation => StatusCode::BAD_REQUEST,
            RelayError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Caller-facing message; never includes upstream detail
    pub fn public_message(&self) -> &'static str {
        match self {
            RelayError::Validation => MISSING_FIELDS_MESSAGE,
            RelayError::NotFound { .. } => NOT_FOUND_MESSAGE,
            _ => FETCH_FAILED_MESSAGE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            RelayError::Validation => {}
            RelayError::NotFound { .. } => warn!(error = %self, "Repository lookup missed"),
            _ => error!(error = %self, "Failed to fetch repo data"),
        }

        (
            status,
            Json(ErrorBody {
                error: self.public_message(),
            }),
        )
            .into_response()
    }
}

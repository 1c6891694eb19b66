//! HTTP Routes
//!
//! `POST /api/repo-data` and a health check.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::debug;

use crate::error::RelayError;
use crate::relay::RepoRelay;
use crate::repository::{RepoRef, RepositoryView};

#[derive(Clone)]
pub struct AppState {
    relay: Arc<RepoRelay>,
}

impl AppState {
    pub fn new(relay: RepoRelay) -> Self {
        Self {
            relay: Arc::new(relay),
        }
    }
}

/// Build the relay router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/repo-data", post(repo_data))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "repo-relay",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Deserialize)]
struct RepoDataRequest {
    owner: Option<String>,
    name: Option<String>,
}

async fn repo_data(
    State(state): State<AppState>,
    payload: Result<Json<RepoDataRequest>, JsonRejection>,
) -> Result<Json<RepositoryView>, RelayError> {
    // Unparseable bodies and non-string fields get the same answer as missing ones
    let Json(req) = payload.map_err(|rejection| {
        debug!(error = %rejection, "Rejected repo-data body");
        RelayError::Validation
    })?;

    let repo = RepoRef::new(req.owner, req.name)?;
    let view = state.relay.fetch_repository(&repo).await?;

    Ok(Json(view))
}

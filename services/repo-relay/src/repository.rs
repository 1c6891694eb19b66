//! Repository Query
//!
//! Runs the repository metadata query against GitHub's GraphQL API and
//! flattens the nested result into the payload served to clients.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::token::{GITHUB_ACCEPT, GITHUB_API_VERSION};

/// Repository metadata query. `owner` and `name` are bound as variables only.
pub const REPOSITORY_QUERY: &str = r#"query RepositoryData($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    name
    description
    stargazerCount
    createdAt
    updatedAt
    owner { login }
    issues(states: OPEN) { totalCount }
    closedIssues: issues(states: CLOSED) { totalCount }
    releases(first: 1, orderBy: {field: CREATED_AT, direction: DESC}) {
      nodes {
        tagName
        publishedAt
      }
    }
  }
}"#;

/// Validated repository coordinates
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Both parts must be present and non-empty
    pub fn new(owner: Option<String>, name: Option<String>) -> Result<Self, RelayError> {
        match (owner, name) {
            (Some(owner), Some(name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(Self { owner, name })
            }
            _ => Err(RelayError::Validation),
        }
    }
}

/// GraphQL request body
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a> {
    pub query: &'static str,
    pub variables: &'a RepoRef,
}

impl<'a> GraphQlRequest<'a> {
    pub fn repository(repo: &'a RepoRef) -> Self {
        Self {
            query: REPOSITORY_QUERY,
            variables: repo,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<RepositoryData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RepositoryData {
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRepository {
    name: String,
    description: Option<String>,
    stargazer_count: u64,
    created_at: String,
    updated_at: String,
    owner: Owner,
    issues: TotalCount,
    closed_issues: TotalCount,
    releases: ReleaseConnection,
}

#[derive(Debug, Deserialize)]
struct ReleaseConnection {
    #[serde(default)]
    nodes: Vec<Release>,
}

/// Repository owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// Connection total
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TotalCount {
    pub total_count: u64,
}

/// Most recent release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Release {
    pub tag_name: String,
    pub published_at: Option<String>,
}

/// Flattened repository payload returned by `/api/repo-data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryView {
    pub name: String,
    pub description: Option<String>,
    pub stargazer_count: u64,
    pub created_at: String,
    pub updated_at: String,
    pub owner: Owner,
    pub issues: TotalCount,
    pub closed_issues: TotalCount,
    pub latest_release: Option<Release>,
}

impl From<RawRepository> for RepositoryView {
    fn from(raw: RawRepository) -> Self {
        Self {
            name: raw.name,
            description: raw.description,
            stargazer_count: raw.stargazer_count,
            created_at: raw.created_at,
            updated_at: raw.updated_at,
            owner: raw.owner,
            issues: raw.issues,
            closed_issues: raw.closed_issues,
            latest_release: raw.releases.nodes.into_iter().next(),
        }
    }
}

/// Turn a decoded GraphQL response into a view, or the matching error
fn into_view(response: GraphQlResponse, repo: &RepoRef) -> Result<RepositoryView, RelayError> {
    let not_found = || RelayError::NotFound {
        owner: repo.owner.clone(),
        name: repo.name.clone(),
    };

    if !response.errors.is_empty() {
        if response
            .errors
            .iter()
            .any(|e| e.kind.as_deref() == Some("NOT_FOUND"))
        {
            return Err(not_found());
        }

        let messages: Vec<&str> = response.errors.iter().map(|e| e.message.as_str()).collect();
        return Err(RelayError::Query(format!(
            "GraphQL errors: {}",
            messages.join("; ")
        )));
    }

    let data = response
        .data
        .ok_or_else(|| RelayError::Query("GraphQL response has no data".to_string()))?;

    data.repository.map(RepositoryView::from).ok_or_else(not_found)
}

/// Client for GitHub's GraphQL endpoint
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    client: Client,
    api_url: String,
}

impl RepositoryClient {
    pub fn new(client: Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Fetch repository metadata using an installation token
    pub async fn fetch(&self, token: &str, repo: &RepoRef) -> Result<RepositoryView, RelayError> {
        let url = format!("{}/graphql", self.api_url);

        debug!(owner = %repo.owner, name = %repo.name, "Querying repository");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", token))
            .header("Accept", GITHUB_ACCEPT)
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .json(&GraphQlRequest::repository(repo))
            .send()
            .await
            .map_err(|e| RelayError::Query(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(owner = %repo.owner, name = %repo.name, status = %status, "GraphQL request rejected");
            return Err(if status == StatusCode::UNAUTHORIZED {
                RelayError::TokenRejected(body)
            } else {
                RelayError::Query(format!("GitHub API error ({}): {}", status, body))
            });
        }

        let decoded = response
            .json::<GraphQlResponse>()
            .await
            .map_err(|e| RelayError::Query(format!("Failed to parse GraphQL response: {}", e)))?;

        into_view(decoded, repo)
    }
}

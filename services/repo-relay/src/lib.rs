//! GitHub Repository Relay Library
//!
//! Serves repository metadata to public clients while keeping the GitHub App
//! private key on the server.
//!
//! ## Request flow
//!
//! 1. `POST /api/repo-data` with `{"owner": "...", "name": "..."}`
//! 2. Sign an RS256 app JWT (`iss` = app ID, valid for 540 seconds)
//! 3. Exchange the JWT for an installation access token
//! 4. Run the repository GraphQL query with the installation token
//! 5. Return the flattened repository JSON
//!
//! ## Example
//!
//! ```bash
//! GITHUB_APP_ID=123456 \
//! GITHUB_INSTALLATION_ID=78901234 \
//! GITHUB_PRIVATE_KEY_PATH=./key.pem \
//! repo-relay
//!
//! curl -X POST localhost:4000/api/repo-data \
//!   -H 'content-type: application/json' \
//!   -d '{"owner":"octocat","name":"Hello-World"}'
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod relay;
pub mod repository;
pub mod routes;
pub mod token;

pub use config::{AppCredential, Args, PrivateKeySource, RelayConfig};
pub use error::RelayError;
pub use relay::RepoRelay;
pub use repository::{RepoRef, RepositoryView};
pub use routes::{router, AppState};

//! GitHub Repository Relay
//!
//! Authenticates as a GitHub App and serves repository metadata over a single
//! JSON endpoint.
//!
//! ## Usage
//! ```bash
//! # With command line arguments
//! repo-relay \
//!   --app-id 123456 \
//!   --installation-id 78901234 \
//!   --private-key-path ./key.pem
//!
//! # With environment variables (a .env file is also read)
//! GITHUB_APP_ID=123456 \
//! GITHUB_INSTALLATION_ID=78901234 \
//! GITHUB_PRIVATE_KEY="$(cat key.pem)" \
//! PORT=8080 \
//! repo-relay
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use repo_relay::{router, AppState, Args, RepoRelay};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv_path = dotenvy::dotenv().ok();

    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    if let Some(path) = dotenv_path {
        info!(path = %path.display(), "Loaded environment file");
    }

    let args = Args::parse();

    let relay = match args.into_config().and_then(RepoRelay::new) {
        Ok(relay) => relay,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            std::process::exit(1);
        }
    };

    let config = relay.config();
    let addr = config.listen_addr();
    info!(
        app_id = config.credential.app_id,
        installation_id = config.credential.installation_id,
        api_url = %config.api_url,
        token_cache = config.token_cache,
        "Starting repo relay"
    );

    let app = router(AppState::new(relay));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Repo relay listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Repo relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}

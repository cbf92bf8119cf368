mod cli;
mod config;
mod http;
mod state;
mod wiring;

use clap::Parser;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{AppConfig, ConfigError};
use crate::http::middleware::owner_auth::{self, OwnerAuthError};
use crate::http::HttpError;
use crate::wiring::WiringError;
use prompt_manager_infra::db::run_migrations;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("wiring error: {0}")]
    Wiring(#[from] WiringError),
    #[error("db error: {0}")]
    Db(#[from] prompt_manager_infra::db::DbPoolError),
    #[error("http error: {0}")]
    Http(#[from] HttpError),
    #[error("token error: {0}")]
    Token(#[from] OwnerAuthError),
    #[error("dotenv error: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

// The environment is settled before the runtime starts any worker threads.
fn main() -> Result<(), AppError> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();
    if let Some(path) = config::load_dotenv()? {
        info!(path = %path.display(), "loaded .env");
    }
    let config = AppConfig::from_env()?;

    if let Some(owner_id) = cli.issue_token {
        let ttl_secs = i64::try_from(config.token_ttl.as_secs()).unwrap_or(i64::MAX);
        let token = owner_auth::issue_token(&config.token_secret, owner_id, ttl_secs)?;
        info!(owner_id, ttl_secs, "issued session token");
        println!("{token}");
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(cli, config))
}

async fn run(cli: Cli, config: AppConfig) -> Result<(), AppError> {
    let state = wiring::build_state(config)?;
    if !cli.skip_migrations {
        run_migrations(&state.db).await?;
    }
    if cli.migrate_only {
        info!("migrations complete; exiting");
        return Ok(());
    }

    let addr = state.config.http_addr;
    info!(%addr, "http server starting");
    tokio::select! {
        _ = shutdown_signal() => {
            info!("shutdown signal received");
        }
        res = http::serve(addr, state) => {
            res?;
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to install ctrl-c handler");
    }
}

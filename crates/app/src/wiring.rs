use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::config::AppConfig;
use crate::state::AppState;
use prompt_manager_infra::db::{connect_lazy, DbPoolError};

#[derive(Debug, Error)]
pub enum WiringError {
    #[error("db pool error: {0}")]
    Db(#[from] DbPoolError),
}

pub fn build_state(config: AppConfig) -> Result<AppState, WiringError> {
    let db = connect_lazy(&config.database_url, config.db_max_connections)?;
    info!(
        max_connections = config.db_max_connections,
        "database pool configured"
    );
    Ok(AppState {
        config: Arc::new(config),
        db,
    })
}

use std::sync::Arc;

use crate::config::AppConfig;
use prompt_manager_infra::db::DbPool;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
}

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

const MIN_TOKEN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub token_secret: String,
    pub token_ttl: Duration,
    pub cors_allow_origins: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid socket address: {0}")]
    InvalidSocket(String),
    #[error("invalid integer for {0}: {1}")]
    InvalidNumber(&'static str, String),
    #[error("invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
    #[error("missing required variable {0}")]
    Missing(&'static str),
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr_raw = read_string("PROMPT_MANAGER_HTTP_ADDR", "127.0.0.1:5000");
        let http_addr = http_addr_raw
            .parse()
            .map_err(|_| ConfigError::InvalidSocket(http_addr_raw.clone()))?;
        let database_url = read_optional_string("PROMPT_MANAGER_DATABASE_URL")
            .ok_or(ConfigError::Missing("PROMPT_MANAGER_DATABASE_URL"))?;
        validate_database_url(&database_url)?;
        let db_max_connections = read_number("PROMPT_MANAGER_DB_MAX_CONNECTIONS", 5)?;
        let token_secret = read_optional_string("PROMPT_MANAGER_TOKEN_SECRET")
            .ok_or(ConfigError::Missing("PROMPT_MANAGER_TOKEN_SECRET"))?;
        validate_token_secret(&token_secret)?;
        let token_ttl_secs = read_number("PROMPT_MANAGER_TOKEN_TTL_SECS", 7 * 24 * 60 * 60)?;
        let cors_allow_origins =
            parse_origins(&read_string("PROMPT_MANAGER_CORS_ORIGINS", ""));

        Ok(Self {
            http_addr,
            database_url,
            db_max_connections,
            token_secret,
            token_ttl: Duration::from_secs(token_ttl_secs),
            cors_allow_origins,
        })
    }
}

/// Loads `.env` from the working directory or its parents. Variables already
/// set in the environment win. A missing file is not an error.
pub fn load_dotenv() -> Result<Option<PathBuf>, dotenvy::Error> {
    dotenv_outcome(dotenvy::dotenv())
}

fn dotenv_outcome(
    result: Result<PathBuf, dotenvy::Error>,
) -> Result<Option<PathBuf>, dotenvy::Error> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(err),
    }
}

fn read_string(key: &'static str, default: &'static str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn read_number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber(key, raw)),
        Err(_) => Ok(default),
    }
}

fn read_optional_string(key: &'static str) -> Option<String> {
    let value = std::env::var(key).unwrap_or_default();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn validate_database_url(url: &str) -> Result<(), ConfigError> {
    if url.starts_with("postgres://") || url.starts_with("postgresql://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidValue(
            "PROMPT_MANAGER_DATABASE_URL",
            "expected a postgres:// url".to_string(),
        ))
    }
}

fn validate_token_secret(secret: &str) -> Result<(), ConfigError> {
    if secret.chars().count() < MIN_TOKEN_SECRET_LEN {
        return Err(ConfigError::InvalidValue(
            "PROMPT_MANAGER_TOKEN_SECRET",
            format!("must be at least {MIN_TOKEN_SECRET_LEN} characters"),
        ));
    }
    Ok(())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_string)
        .collect()
}

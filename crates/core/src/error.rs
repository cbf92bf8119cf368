use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid date range: {0}")]
    InvalidDateRange(String),
    #[error("invalid search field: {0}")]
    InvalidSearchField(String),
    #[error("invalid prompt: {0}")]
    InvalidPrompt(String),
}

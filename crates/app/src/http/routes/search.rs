use axum::extract::{Extension, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::http::middleware::owner_auth::OwnerId;
use crate::http::routes::prompts::PromptsApiError;
use crate::state::AppState;
use prompt_manager_core::domain::prompt::{Prompt, TAG_SEPARATOR};
use prompt_manager_core::domain::search::{SearchCriteria, SearchField, VisibilityFlags};
use prompt_manager_core::filter::filter_prompts;
use prompt_manager_core::types::date_range::DateRange;
use prompt_manager_core::CoreError;
use prompt_manager_infra::db;

const MAX_QUERY_LEN: usize = 256;

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub field: Option<String>,
    pub case_sensitive: Option<bool>,
    /// Comma-separated; a prompt must carry all of them.
    pub tags: Option<String>,
    /// `YYYY-MM-DD~YYYY-MM-DD`
    pub range: Option<String>,
    pub liked: Option<bool>,
    pub nsfw: Option<bool>,
    pub private: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub total: usize,
    pub scanned: usize,
    pub prompts: Vec<Prompt>,
}

#[derive(Debug, Error)]
pub enum SearchApiError {
    #[error("invalid query: {0}")]
    Params(#[from] CoreError),
    #[error("query too long (max {0} chars)")]
    QueryTooLong(usize),
    #[error(transparent)]
    Prompts(#[from] PromptsApiError),
}

impl From<db::PromptsRepoError> for SearchApiError {
    fn from(err: db::PromptsRepoError) -> Self {
        SearchApiError::Prompts(err.into())
    }
}

pub async fn search_prompts(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, SearchApiError> {
    let (criteria, flags) = parse_params(params)?;
    let stored = db::list_prompts(&state.db, owner.0).await?;
    let matched = filter_prompts(&stored, &criteria, flags);
    debug!(
        owner_id = owner.0,
        ?criteria,
        ?flags,
        scanned = stored.len(),
        matched = matched.len(),
        "prompt search"
    );
    Ok(Json(SearchResponse {
        total: matched.len(),
        scanned: stored.len(),
        prompts: matched.iter().map(Prompt::desanitized).collect(),
    }))
}

fn parse_params(params: SearchParams) -> Result<(SearchCriteria, VisibilityFlags), SearchApiError> {
    let query = params.q.unwrap_or_default();
    enforce_query_length(&query)?;
    let field = match params.field.as_deref() {
        Some(raw) => raw.parse::<SearchField>()?,
        None => SearchField::All,
    };
    let date_range = params
        .range
        .as_deref()
        .filter(|raw| !raw.trim().is_empty())
        .map(DateRange::parse)
        .transpose()?;
    let tags = params
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(TAG_SEPARATOR)
        .map(str::trim)
        .filter(|tag| !tag.is_empty());
    let criteria = SearchCriteria::default()
        .with_query(query)
        .with_field(field)
        .with_case_sensitive(params.case_sensitive.unwrap_or(false))
        .with_tags(tags)
        .with_date_range(date_range);
    let flags = VisibilityFlags {
        liked_only: params.liked.unwrap_or(false),
        nsfw_only: params.nsfw.unwrap_or(false),
        private_only: params.private.unwrap_or(false),
    };
    Ok((criteria, flags))
}

fn enforce_query_length(query_text: &str) -> Result<(), SearchApiError> {
    if query_text.chars().count() > MAX_QUERY_LEN {
        return Err(SearchApiError::QueryTooLong(MAX_QUERY_LEN));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for SearchApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            SearchApiError::Params(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            err @ SearchApiError::QueryTooLong(_) => (StatusCode::BAD_REQUEST, err.to_string()),
            SearchApiError::Prompts(err) => return err.into_response(),
        };
        warn!(error = %message, "search api error");
        let body = Json(ErrorBody { error: message });
        (status, body).into_response()
    }
}

use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::http::middleware::owner_auth::OwnerId;
use crate::state::AppState;
use prompt_manager_core::domain::prompt::{NewPrompt, Prompt, PromptPatch};
use prompt_manager_core::CoreError;
use prompt_manager_infra::db::{self, PromptsRepoError};

#[derive(Debug, Serialize)]
pub struct PromptList {
    pub total: usize,
    pub prompts: Vec<Prompt>,
}

impl PromptList {
    /// Display copies of stored prompts.
    pub fn from_stored(stored: &[Prompt]) -> Self {
        let prompts: Vec<Prompt> = stored.iter().map(Prompt::desanitized).collect();
        PromptList {
            total: prompts.len(),
            prompts,
        }
    }
}

#[derive(Debug, Error)]
pub enum PromptsApiError {
    #[error("prompt {0} not found")]
    NotFound(i64),
    #[error("update has no fields")]
    EmptyPatch,
    #[error("invalid request body: {0}")]
    Body(String),
    #[error("{0}")]
    Invalid(#[from] CoreError),
    #[error("db error: {0}")]
    Db(PromptsRepoError),
}

impl From<PromptsRepoError> for PromptsApiError {
    fn from(err: PromptsRepoError) -> Self {
        match err {
            PromptsRepoError::Invalid(err) => PromptsApiError::Invalid(err),
            other => PromptsApiError::Db(other),
        }
    }
}

impl From<JsonRejection> for PromptsApiError {
    fn from(rejection: JsonRejection) -> Self {
        PromptsApiError::Body(rejection.body_text())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub async fn list_prompts(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<PromptList>, PromptsApiError> {
    let stored = db::list_prompts(&state.db, owner.0).await?;
    Ok(Json(PromptList::from_stored(&stored)))
}

pub async fn get_prompt(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<i64>,
) -> Result<Json<Prompt>, PromptsApiError> {
    let prompt = db::find_prompt(&state.db, owner.0, id)
        .await?
        .ok_or(PromptsApiError::NotFound(id))?;
    Ok(Json(prompt.desanitized()))
}

pub async fn create_prompt(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    payload: Result<Json<NewPrompt>, JsonRejection>,
) -> Result<(StatusCode, Json<Prompt>), PromptsApiError> {
    let Json(draft) = payload?;
    let prompt = db::create_prompt(&state.db, owner.0, draft).await?;
    info!(owner_id = owner.0, prompt_id = prompt.id, "prompt created");
    Ok((StatusCode::CREATED, Json(prompt.desanitized())))
}

pub async fn update_prompt(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<i64>,
    payload: Result<Json<PromptPatch>, JsonRejection>,
) -> Result<Json<Prompt>, PromptsApiError> {
    let Json(patch) = payload?;
    if patch.is_empty() {
        return Err(PromptsApiError::EmptyPatch);
    }
    let prompt = db::update_prompt(&state.db, owner.0, id, patch)
        .await?
        .ok_or(PromptsApiError::NotFound(id))?;
    info!(owner_id = owner.0, prompt_id = id, "prompt updated");
    Ok(Json(prompt.desanitized()))
}

pub async fn copy_prompt(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<Prompt>), PromptsApiError> {
    let copy = db::copy_prompt(&state.db, owner.0, id)
        .await?
        .ok_or(PromptsApiError::NotFound(id))?;
    info!(owner_id = owner.0, source_id = id, prompt_id = copy.id, "prompt copied");
    Ok((StatusCode::CREATED, Json(copy.desanitized())))
}

pub async fn delete_prompt(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
    Path(id): Path<i64>,
) -> Result<StatusCode, PromptsApiError> {
    if !db::delete_prompt(&state.db, owner.0, id).await? {
        return Err(PromptsApiError::NotFound(id));
    }
    info!(owner_id = owner.0, prompt_id = id, "prompt deleted");
    Ok(StatusCode::NO_CONTENT)
}

impl IntoResponse for PromptsApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            PromptsApiError::NotFound(_) => StatusCode::NOT_FOUND,
            PromptsApiError::EmptyPatch
            | PromptsApiError::Body(_)
            | PromptsApiError::Invalid(_) => StatusCode::BAD_REQUEST,
            PromptsApiError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = if status.is_server_error() {
            error!(error = %self, "prompts api failure");
            "internal error".to_string()
        } else {
            warn!(error = %self, "prompts api error");
            self.to_string()
        };
        let body = Json(ErrorBody { error: message });
        (status, body).into_response()
    }
}

use axum::extract::{Extension, State};
use axum::Json;
use serde::Serialize;

use crate::http::middleware::owner_auth::OwnerId;
use crate::http::routes::prompts::PromptsApiError;
use crate::state::AppState;
use prompt_manager_core::filter::available_tags;
use prompt_manager_infra::db;

#[derive(Debug, Serialize)]
pub struct TagsResponse {
    pub tags: Vec<String>,
}

/// Tags for the tag picker, across every prompt the owner has.
pub async fn list_tags(
    State(state): State<AppState>,
    Extension(owner): Extension<OwnerId>,
) -> Result<Json<TagsResponse>, PromptsApiError> {
    let stored = db::list_prompts(&state.db, owner.0).await?;
    Ok(Json(TagsResponse {
        tags: available_tags(&stored),
    }))
}

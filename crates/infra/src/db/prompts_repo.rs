use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use thiserror::Error;
use tracing::debug;

use prompt_manager_core::domain::prompt::{Metadata, NewPrompt, Prompt, PromptPatch};
use prompt_manager_core::CoreError;

const PROMPT_COLUMNS: &str = "id, owner_id, title, content, tags, metadata, is_liked, is_nsfw, \
                              is_private, created_at, updated_at";

#[derive(Debug, Error)]
pub enum PromptsRepoError {
    #[error("sqlx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Invalid(#[from] CoreError),
}

pub async fn ping(pool: &PgPool) -> Result<(), PromptsRepoError> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Stored (sanitized) prompts for one owner, newest first.
pub async fn list_prompts(pool: &PgPool, owner_id: i64) -> Result<Vec<Prompt>, PromptsRepoError> {
    let sql = format!(
        "SELECT {PROMPT_COLUMNS} FROM prompts \
         WHERE owner_id = $1 \
         ORDER BY created_at DESC NULLS LAST, id DESC"
    );
    let rows = sqlx::query(&sql).bind(owner_id).fetch_all(pool).await?;
    let mut prompts = Vec::with_capacity(rows.len());
    for row in rows {
        prompts.push(map_prompt(&row)?);
    }
    Ok(prompts)
}

pub async fn find_prompt(
    pool: &PgPool,
    owner_id: i64,
    id: i64,
) -> Result<Option<Prompt>, PromptsRepoError> {
    let sql = format!("SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = $1 AND owner_id = $2");
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(map_prompt).transpose()
}

/// Validates and sanitizes the draft, then inserts it.
pub async fn create_prompt(
    pool: &PgPool,
    owner_id: i64,
    draft: NewPrompt,
) -> Result<Prompt, PromptsRepoError> {
    let stored = draft.into_stored()?;
    let sql = format!(
        "INSERT INTO prompts (owner_id, title, content, tags, metadata, is_liked, is_nsfw, is_private) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {PROMPT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(owner_id)
        .bind(&stored.title)
        .bind(&stored.content)
        .bind(&stored.tags)
        .bind(metadata_to_json(&stored.metadata))
        .bind(stored.is_liked)
        .bind(stored.is_nsfw)
        .bind(stored.is_private)
        .fetch_one(pool)
        .await?;
    let prompt = map_prompt(&row)?;
    debug!(owner_id, prompt_id = prompt.id, "prompt created");
    Ok(prompt)
}

/// Duplicates one of the owner's prompts as a new row with fresh timestamps.
/// `None` when the source does not exist for this owner.
pub async fn copy_prompt(
    pool: &PgPool,
    owner_id: i64,
    id: i64,
) -> Result<Option<Prompt>, PromptsRepoError> {
    let sql = format!(
        "INSERT INTO prompts (owner_id, title, content, tags, metadata, is_liked, is_nsfw, is_private) \
         SELECT owner_id, title, content, tags, metadata, is_liked, is_nsfw, is_private \
         FROM prompts WHERE id = $1 AND owner_id = $2 \
         RETURNING {PROMPT_COLUMNS}"
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(pool)
        .await?;
    let copy = row.as_ref().map(map_prompt).transpose()?;
    if let Some(copy) = &copy {
        debug!(owner_id, source_id = id, prompt_id = copy.id, "prompt copied");
    }
    Ok(copy)
}

/// Applies the patch under a row lock. `None` when the prompt does not exist
/// for this owner.
pub async fn update_prompt(
    pool: &PgPool,
    owner_id: i64,
    id: i64,
    patch: PromptPatch,
) -> Result<Option<Prompt>, PromptsRepoError> {
    let patch = patch.into_stored()?;
    let metadata = patched_metadata(patch.metadata.as_ref());
    let mut tx = pool.begin().await?;
    let select = format!(
        "SELECT {PROMPT_COLUMNS} FROM prompts WHERE id = $1 AND owner_id = $2 FOR UPDATE"
    );
    let row = sqlx::query(&select)
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(row) = row else {
        return Ok(None);
    };
    let mut prompt = map_prompt(&row)?;
    patch.apply(&mut prompt, Utc::now());

    sqlx::query(
        r#"
        UPDATE prompts
        SET title = $3,
            content = $4,
            tags = $5,
            metadata = COALESCE($6, metadata),
            is_liked = $7,
            is_nsfw = $8,
            is_private = $9,
            updated_at = $10
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .bind(&prompt.title)
    .bind(&prompt.content)
    .bind(&prompt.tags)
    .bind(metadata)
    .bind(prompt.is_liked)
    .bind(prompt.is_nsfw)
    .bind(prompt.is_private)
    .bind(prompt.updated_at)
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;
    debug!(owner_id, prompt_id = id, "prompt updated");
    Ok(Some(prompt))
}

pub async fn delete_prompt(pool: &PgPool, owner_id: i64, id: i64) -> Result<bool, PromptsRepoError> {
    let result = sqlx::query(
        r#"
        DELETE FROM prompts
        WHERE id = $1 AND owner_id = $2
        "#,
    )
    .bind(id)
    .bind(owner_id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn map_prompt(row: &PgRow) -> Result<Prompt, PromptsRepoError> {
    let tags: Option<Vec<String>> = row.try_get("tags")?;
    let metadata: Option<Value> = row.try_get("metadata")?;
    let created_at: Option<DateTime<Utc>> = row.try_get("created_at")?;
    let updated_at: Option<DateTime<Utc>> = row.try_get("updated_at")?;
    Ok(Prompt {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        tags: tags.unwrap_or_default(),
        metadata: metadata.map(metadata_from_json).unwrap_or_default(),
        is_liked: row.try_get("is_liked")?,
        is_nsfw: row.try_get("is_nsfw")?,
        is_private: row.try_get("is_private")?,
        created_at,
        updated_at,
    })
}

/// Flattens a stored JSON document into string pairs. Nulls are dropped,
/// other non-string values keep their JSON text. Anything but an object is
/// treated as empty.
pub(crate) fn metadata_from_json(value: Value) -> Metadata {
    let Value::Object(entries) = value else {
        return Metadata::new();
    };
    entries
        .into_iter()
        .filter_map(|(key, value)| match value {
            Value::Null => None,
            Value::String(text) => Some((key, text)),
            other => Some((key, other.to_string())),
        })
        .collect()
}

pub(crate) fn metadata_to_json(metadata: &Metadata) -> Value {
    let entries: Map<String, Value> = metadata
        .iter()
        .map(|(key, value)| (key.clone(), Value::String(value.clone())))
        .collect();
    Value::Object(entries)
}

/// Column value for an update. `None` keeps the stored document as is, so
/// nesting the read path flattened is not written back.
pub(crate) fn patched_metadata(metadata: Option<&Metadata>) -> Option<Value> {
    metadata.map(metadata_to_json)
}

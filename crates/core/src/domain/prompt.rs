use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::sanitize::{
    desanitize, desanitize_metadata, desanitize_tags, sanitize, sanitize_metadata, sanitize_tags,
};

pub type Metadata = BTreeMap<String, String>;

const MAX_TITLE_LEN: usize = 200;
const MAX_TAG_LEN: usize = 64;

/// Separates tags in query strings, so it can never appear inside one.
pub const TAG_SEPARATOR: char = ',';

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub id: i64,
    pub owner_id: i64,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_nsfw: bool,
    #[serde(default)]
    pub is_private: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Prompt {
    /// Display copy of a stored prompt.
    pub fn desanitized(&self) -> Prompt {
        Prompt {
            title: desanitize(&self.title).into_owned(),
            content: desanitize(&self.content).into_owned(),
            tags: desanitize_tags(&self.tags),
            metadata: desanitize_metadata(&self.metadata),
            ..self.clone()
        }
    }

    pub fn sanitized(&self) -> Prompt {
        Prompt {
            title: sanitize(&self.title).into_owned(),
            content: sanitize(&self.content).into_owned(),
            tags: sanitize_tags(&self.tags),
            metadata: sanitize_metadata(&self.metadata),
            ..self.clone()
        }
    }
}

/// Create payload, in plain (unsanitized) text.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct NewPrompt {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub is_liked: bool,
    #[serde(default)]
    pub is_nsfw: bool,
    #[serde(default)]
    pub is_private: bool,
}

impl NewPrompt {
    /// Trims and validates text fields, drops blank tags, then sanitizes.
    pub fn into_stored(self) -> Result<NewPrompt, CoreError> {
        let title = validate_title(&self.title)?;
        let content = validate_content(&self.content)?;
        let tags = normalize_tags(&self.tags)?;
        Ok(NewPrompt {
            title: sanitize(&title).into_owned(),
            content: sanitize(&content).into_owned(),
            tags: sanitize_tags(&tags),
            metadata: sanitize_metadata(&self.metadata),
            ..self
        })
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PromptPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
    pub metadata: Option<Metadata>,
    pub is_liked: Option<bool>,
    pub is_nsfw: Option<bool>,
    pub is_private: Option<bool>,
}

impl PromptPatch {
    pub fn is_empty(&self) -> bool {
        self == &PromptPatch::default()
    }

    pub fn into_stored(self) -> Result<PromptPatch, CoreError> {
        let title = match self.title {
            Some(title) => Some(sanitize(&validate_title(&title)?).into_owned()),
            None => None,
        };
        let content = match self.content {
            Some(content) => Some(sanitize(&validate_content(&content)?).into_owned()),
            None => None,
        };
        let tags = match self.tags {
            Some(tags) => Some(sanitize_tags(&normalize_tags(&tags)?)),
            None => None,
        };
        Ok(PromptPatch {
            title,
            content,
            tags,
            metadata: self.metadata.as_ref().map(sanitize_metadata),
            ..self
        })
    }

    /// Applies an already stored-form patch to a stored prompt.
    pub fn apply(self, prompt: &mut Prompt, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            prompt.title = title;
        }
        if let Some(content) = self.content {
            prompt.content = content;
        }
        if let Some(tags) = self.tags {
            prompt.tags = tags;
        }
        if let Some(metadata) = self.metadata {
            prompt.metadata = metadata;
        }
        if let Some(is_liked) = self.is_liked {
            prompt.is_liked = is_liked;
        }
        if let Some(is_nsfw) = self.is_nsfw {
            prompt.is_nsfw = is_nsfw;
        }
        if let Some(is_private) = self.is_private {
            prompt.is_private = is_private;
        }
        prompt.updated_at = Some(now);
    }
}

fn validate_title(title: &str) -> Result<String, CoreError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidPrompt("title is required".to_string()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(CoreError::InvalidPrompt(format!(
            "title longer than {MAX_TITLE_LEN} chars"
        )));
    }
    Ok(trimmed.to_string())
}

fn validate_content(content: &str) -> Result<String, CoreError> {
    if content.trim().is_empty() {
        return Err(CoreError::InvalidPrompt("content is required".to_string()));
    }
    Ok(content.to_string())
}

fn normalize_tags(tags: &[String]) -> Result<Vec<String>, CoreError> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains(TAG_SEPARATOR) {
            return Err(CoreError::InvalidPrompt(format!(
                "tag may not contain '{TAG_SEPARATOR}': {trimmed}"
            )));
        }
        if trimmed.chars().count() > MAX_TAG_LEN {
            return Err(CoreError::InvalidPrompt(format!(
                "tag longer than {MAX_TAG_LEN} chars: {trimmed}"
            )));
        }
        if !normalized.iter().any(|existing| existing == trimmed) {
            normalized.push(trimmed.to_string());
        }
    }
    Ok(normalized)
}

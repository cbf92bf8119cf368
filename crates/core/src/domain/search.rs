use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::date_range::DateRange;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchField {
    #[default]
    All,
    Title,
    Content,
    Tags,
    Metadata,
}

impl SearchField {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::All => "all",
            SearchField::Title => "title",
            SearchField::Content => "content",
            SearchField::Tags => "tags",
            SearchField::Metadata => "metadata",
        }
    }
}

impl FromStr for SearchField {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(SearchField::All),
            "title" => Ok(SearchField::Title),
            "content" => Ok(SearchField::Content),
            "tags" => Ok(SearchField::Tags),
            "metadata" => Ok(SearchField::Metadata),
            _ => Err(CoreError::InvalidSearchField(value.to_string())),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One filter pass worth of query state.
///
/// Values are replaced rather than edited: every `with_*` method consumes the
/// criteria and returns the updated copy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchCriteria {
    pub query: String,
    pub field: SearchField,
    pub case_sensitive: bool,
    pub selected_tags: BTreeSet<String>,
    pub date_range: Option<DateRange>,
}

impl SearchCriteria {
    pub fn with_query(self, query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..self
        }
    }

    pub fn with_field(self, field: SearchField) -> Self {
        Self { field, ..self }
    }

    pub fn with_case_sensitive(self, case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            ..self
        }
    }

    pub fn with_tags<I, S>(self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            selected_tags: tags.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Adds the tag if absent, removes it otherwise.
    pub fn toggle_tag(self, tag: &str) -> Self {
        let mut selected_tags = self.selected_tags;
        if !selected_tags.remove(tag) {
            selected_tags.insert(tag.to_string());
        }
        Self {
            selected_tags,
            ..self
        }
    }

    pub fn with_date_range(self, date_range: Option<DateRange>) -> Self {
        Self { date_range, ..self }
    }

    pub fn has_text_filter(&self) -> bool {
        !self.query.is_empty()
    }
}

/// Boolean visibility toggles; each one set narrows the result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityFlags {
    pub liked_only: bool,
    pub nsfw_only: bool,
    pub private_only: bool,
}

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Calendar-day bounds for a filter pass, inclusive on both ends.
///
/// Either side may be unset while a range is being picked; only a range with
/// both ends set constrains anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Result<Self, CoreError> {
        if from > to {
            return Err(CoreError::InvalidDateRange(format!("{from}~{to}")));
        }
        Ok(DateRange {
            from: Some(from),
            to: Some(to),
        })
    }

    /// Parses `YYYY-MM-DD~YYYY-MM-DD`; one side may be blank.
    pub fn parse(input: &str) -> Result<Self, CoreError> {
        let trimmed = input.trim();
        let Some((left, right)) = trimmed.split_once('~') else {
            return Err(CoreError::InvalidDateRange(trimmed.to_string()));
        };
        let from = parse_side(left)?;
        let to = parse_side(right)?;
        match (from, to) {
            (None, None) => Err(CoreError::InvalidDateRange(trimmed.to_string())),
            (Some(from), Some(to)) if from > to => {
                Err(CoreError::InvalidDateRange(trimmed.to_string()))
            }
            (from, to) => Ok(DateRange { from, to }),
        }
    }

    pub fn bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        match (self.from, self.to) {
            (Some(from), Some(to)) => Some((from, to)),
            _ => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.bounds().is_some()
    }

    /// An incomplete range admits everything.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        let Some((from, to)) = self.bounds() else {
            return true;
        };
        let day = at.date_naive();
        from <= day && day <= to
    }
}

fn parse_side(input: &str) -> Result<Option<NaiveDate>, CoreError> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| CoreError::InvalidDateRange(input.to_string()))
}

//! Query-time filtering over a materialized snapshot of stored prompts.
//!
//! Records are expected in stored (sanitized) form. Every comparison runs on
//! desanitized text, and the query is taken as the person typed it.

use std::borrow::Cow;
use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::domain::prompt::Prompt;
use crate::domain::search::{SearchCriteria, SearchField, VisibilityFlags};
use crate::sanitize::desanitize;

/// Prompts matching every active filter, in input order.
pub fn filter_prompts(
    records: &[Prompt],
    criteria: &SearchCriteria,
    flags: VisibilityFlags,
) -> Vec<Prompt> {
    filter_prompts_at(records, criteria, flags, Utc::now())
}

/// Same as [`filter_prompts`] with an explicit clock. A prompt without
/// `created_at` is dated at `now` for the date-range check.
pub fn filter_prompts_at(
    records: &[Prompt],
    criteria: &SearchCriteria,
    flags: VisibilityFlags,
    now: DateTime<Utc>,
) -> Vec<Prompt> {
    let needle = TextNeedle::new(criteria);
    records
        .iter()
        .filter(|prompt| matches_with(prompt, criteria, flags, now, needle.as_ref()))
        .cloned()
        .collect()
}

pub fn matches(
    prompt: &Prompt,
    criteria: &SearchCriteria,
    flags: VisibilityFlags,
    now: DateTime<Utc>,
) -> bool {
    let needle = TextNeedle::new(criteria);
    matches_with(prompt, criteria, flags, now, needle.as_ref())
}

/// Sorted, deduplicated display tags across all records. Blank tags are skipped.
pub fn available_tags(records: &[Prompt]) -> Vec<String> {
    records
        .iter()
        .flat_map(|prompt| prompt.tags.iter())
        .filter(|tag| !tag.trim().is_empty())
        .map(|tag| desanitize(tag).into_owned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn matches_with(
    prompt: &Prompt,
    criteria: &SearchCriteria,
    flags: VisibilityFlags,
    now: DateTime<Utc>,
    needle: Option<&TextNeedle>,
) -> bool {
    passes_flags(prompt, flags)
        && passes_tags(prompt, &criteria.selected_tags)
        && passes_date_range(prompt, criteria, now)
        && needle.is_none_or(|needle| needle.matches(prompt))
}

fn passes_flags(prompt: &Prompt, flags: VisibilityFlags) -> bool {
    (!flags.liked_only || prompt.is_liked)
        && (!flags.nsfw_only || prompt.is_nsfw)
        && (!flags.private_only || prompt.is_private)
}

/// Superset test: every selected tag must be on the prompt.
fn passes_tags(prompt: &Prompt, selected: &BTreeSet<String>) -> bool {
    if selected.is_empty() {
        return true;
    }
    let tags: BTreeSet<Cow<'_, str>> = prompt.tags.iter().map(|tag| desanitize(tag)).collect();
    selected.iter().all(|tag| tags.contains(tag.as_str()))
}

fn passes_date_range(prompt: &Prompt, criteria: &SearchCriteria, now: DateTime<Utc>) -> bool {
    match criteria.date_range {
        Some(range) if range.is_active() => range.contains(prompt.created_at.unwrap_or(now)),
        _ => true,
    }
}

/// Query text folded once per pass.
struct TextNeedle {
    query: String,
    field: SearchField,
    case_sensitive: bool,
}

impl TextNeedle {
    fn new(criteria: &SearchCriteria) -> Option<Self> {
        if !criteria.has_text_filter() {
            return None;
        }
        let query = if criteria.case_sensitive {
            criteria.query.clone()
        } else {
            criteria.query.to_lowercase()
        };
        Some(TextNeedle {
            query,
            field: criteria.field,
            case_sensitive: criteria.case_sensitive,
        })
    }

    fn hit(&self, stored: &str) -> bool {
        let plain = desanitize(stored);
        if self.case_sensitive {
            plain.contains(self.query.as_str())
        } else {
            plain.to_lowercase().contains(self.query.as_str())
        }
    }

    fn hit_title(&self, prompt: &Prompt) -> bool {
        self.hit(&prompt.title)
    }

    fn hit_content(&self, prompt: &Prompt) -> bool {
        self.hit(&prompt.content)
    }

    fn hit_tags(&self, prompt: &Prompt) -> bool {
        prompt.tags.iter().any(|tag| self.hit(tag))
    }

    fn hit_metadata(&self, prompt: &Prompt) -> bool {
        prompt
            .metadata
            .iter()
            .any(|(key, value)| self.hit(key) || self.hit(value))
    }

    fn matches(&self, prompt: &Prompt) -> bool {
        match self.field {
            SearchField::Title => self.hit_title(prompt),
            SearchField::Content => self.hit_content(prompt),
            SearchField::Tags => self.hit_tags(prompt),
            SearchField::Metadata => self.hit_metadata(prompt),
            SearchField::All => {
                self.hit_title(prompt)
                    || self.hit_content(prompt)
                    || self.hit_tags(prompt)
                    || self.hit_metadata(prompt)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::domain::prompt::Metadata;
    use crate::sanitize::sanitize;
    use crate::types::date_range::DateRange;

    fn prompt(id: i64, title: &str, tags: &[&str]) -> Prompt {
        Prompt {
            id,
            owner_id: 1,
            title: sanitize(title).into_owned(),
            content: String::new(),
            tags: tags.iter().map(|tag| sanitize(tag).into_owned()).collect(),
            metadata: Metadata::new(),
            is_liked: false,
            is_nsfw: false,
            is_private: false,
            created_at: Some(Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()),
            updated_at: None,
        }
    }

    fn ids(prompts: &[Prompt]) -> Vec<i64> {
        prompts.iter().map(|prompt| prompt.id).collect()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn run(records: &[Prompt], criteria: &SearchCriteria, flags: VisibilityFlags) -> Vec<i64> {
        ids(&filter_prompts_at(records, criteria, flags, now()))
    }

    #[test]
    fn empty_query_returns_everything_in_order() {
        let records = vec![prompt(3, "c", &[]), prompt(1, "a", &[]), prompt(2, "b", &[])];
        let result = run(&records, &SearchCriteria::default(), VisibilityFlags::default());
        assert_eq!(result, vec![3, 1, 2]);
    }

    #[test]
    fn poem_scenario_matches_title_across_all_fields() {
        let mut poem = prompt(1, "Write a poem", &["creative"]);
        poem.is_liked = true;
        let summary = prompt(2, "Summarize text", &["utility"]);
        let criteria = SearchCriteria::default().with_query("poem");
        let result = filter_prompts(&[poem.clone(), summary], &criteria, VisibilityFlags::default());
        assert_eq!(result, vec![poem]);
    }

    #[test]
    fn tag_filter_requires_superset() {
        let records = vec![prompt(1, "x", &["a", "b", "c"])];
        let subset = SearchCriteria::default().with_tags(["a", "b"]);
        let missing = SearchCriteria::default().with_tags(["a", "d"]);
        assert_eq!(run(&records, &subset, VisibilityFlags::default()), vec![1]);
        assert!(run(&records, &missing, VisibilityFlags::default()).is_empty());
    }

    #[test]
    fn tag_filter_treats_missing_tags_as_empty() {
        let records = vec![prompt(1, "untagged", &[])];
        let criteria = SearchCriteria::default().with_tags(["a"]);
        assert!(run(&records, &criteria, VisibilityFlags::default()).is_empty());
    }

    #[test]
    fn tag_filter_compares_plain_tags() {
        let records = vec![prompt(1, "x", &["r&d", "a/b"])];
        let criteria = SearchCriteria::default().with_tags(["r&d", "a/b"]);
        assert_eq!(run(&records, &criteria, VisibilityFlags::default()), vec![1]);
    }

    #[test]
    fn case_sensitivity_toggle() {
        let mut record = prompt(1, "notes", &[]);
        record.content = "some foo bar text".to_string();
        let records = vec![record];
        let insensitive = SearchCriteria::default().with_query("Foo");
        let sensitive = insensitive.clone().with_case_sensitive(true);
        assert_eq!(run(&records, &insensitive, VisibilityFlags::default()), vec![1]);
        assert!(run(&records, &sensitive, VisibilityFlags::default()).is_empty());
    }

    #[test]
    fn flags_and_tags_are_conjunctive() {
        let mut liked_untagged = prompt(1, "one", &[]);
        liked_untagged.is_liked = true;
        let mut liked_tagged = prompt(2, "two", &["keep"]);
        liked_tagged.is_liked = true;
        let unliked_tagged = prompt(3, "three", &["keep"]);
        let records = vec![liked_untagged, liked_tagged, unliked_tagged];
        let criteria = SearchCriteria::default().with_tags(["keep"]);
        let flags = VisibilityFlags {
            liked_only: true,
            ..VisibilityFlags::default()
        };
        assert_eq!(run(&records, &criteria, flags), vec![2]);
    }

    #[test]
    fn every_flag_narrows() {
        let mut nsfw = prompt(1, "a", &[]);
        nsfw.is_nsfw = true;
        let mut private = prompt(2, "b", &[]);
        private.is_private = true;
        let records = vec![nsfw, private];
        let nsfw_only = VisibilityFlags {
            nsfw_only: true,
            ..VisibilityFlags::default()
        };
        let private_only = VisibilityFlags {
            private_only: true,
            ..VisibilityFlags::default()
        };
        let criteria = SearchCriteria::default();
        assert_eq!(run(&records, &criteria, nsfw_only), vec![1]);
        assert_eq!(run(&records, &criteria, private_only), vec![2]);
    }

    #[test]
    fn query_matches_desanitized_text() {
        let records = vec![prompt(1, "Tom & Jerry <3", &[])];
        let amp = SearchCriteria::default().with_query("tom & jerry");
        let escaped = SearchCriteria::default().with_query("&amp;");
        let heart = SearchCriteria::default().with_query("<3");
        assert_eq!(run(&records, &amp, VisibilityFlags::default()), vec![1]);
        assert!(run(&records, &escaped, VisibilityFlags::default()).is_empty());
        assert_eq!(run(&records, &heart, VisibilityFlags::default()), vec![1]);
    }

    #[test]
    fn field_scope_limits_matching() {
        let mut record = prompt(1, "alpha", &["beta"]);
        record.content = "gamma".to_string();
        record.metadata.insert("delta".to_string(), "epsilon".to_string());
        let records = vec![record];
        let cases = [
            (SearchField::Title, "alpha", true),
            (SearchField::Title, "gamma", false),
            (SearchField::Content, "gamma", true),
            (SearchField::Content, "beta", false),
            (SearchField::Tags, "bet", true),
            (SearchField::Tags, "alpha", false),
            (SearchField::Metadata, "delta", true),
            (SearchField::Metadata, "epsilon", true),
            (SearchField::Metadata, "gamma", false),
            (SearchField::All, "epsilon", true),
            (SearchField::All, "zeta", false),
        ];
        for (field, query, expected) in cases {
            let criteria = SearchCriteria::default().with_query(query).with_field(field);
            let matched = !run(&records, &criteria, VisibilityFlags::default()).is_empty();
            assert_eq!(matched, expected, "{field} / {query}");
        }
    }

    #[test]
    fn date_range_is_inclusive_and_needs_both_ends() {
        let records = vec![prompt(1, "x", &[])];
        let day = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let exact = SearchCriteria::default().with_date_range(Some(DateRange::new(day, day).unwrap()));
        let later = SearchCriteria::default().with_date_range(Some(DateRange::parse("2024-02-01~2024-03-01").unwrap()));
        let half = SearchCriteria::default().with_date_range(Some(DateRange::parse("2024-02-01~").unwrap()));
        assert_eq!(run(&records, &exact, VisibilityFlags::default()), vec![1]);
        assert!(run(&records, &later, VisibilityFlags::default()).is_empty());
        assert_eq!(run(&records, &half, VisibilityFlags::default()), vec![1]);
    }

    #[test]
    fn undated_prompt_counts_as_now() {
        let mut record = prompt(1, "x", &[]);
        record.created_at = None;
        let records = vec![record];
        let around_now = SearchCriteria::default()
            .with_date_range(Some(DateRange::parse("2024-05-31~2024-06-01").unwrap()));
        let past = SearchCriteria::default()
            .with_date_range(Some(DateRange::parse("2023-01-01~2023-12-31").unwrap()));
        assert_eq!(run(&records, &around_now, VisibilityFlags::default()), vec![1]);
        assert!(run(&records, &past, VisibilityFlags::default()).is_empty());
    }

    #[test]
    fn filtering_leaves_input_untouched() {
        let records = vec![prompt(1, "a & b", &["x"])];
        let snapshot = records.clone();
        let criteria = SearchCriteria::default().with_query("a & b");
        let first = filter_prompts_at(&records, &criteria, VisibilityFlags::default(), now());
        let second = filter_prompts_at(&records, &criteria, VisibilityFlags::default(), now());
        assert_eq!(records, snapshot);
        assert_eq!(first, second);
        assert_eq!(first[0].title, "a &amp; b");
    }

    #[test]
    fn matches_agrees_with_filter() {
        let record = prompt(1, "Write a poem", &[]);
        let criteria = SearchCriteria::default().with_query("POEM");
        assert!(matches(&record, &criteria, VisibilityFlags::default(), now()));
        let criteria = criteria.with_case_sensitive(true);
        assert!(!matches(&record, &criteria, VisibilityFlags::default(), now()));
    }

    #[test]
    fn available_tags_are_sorted_and_deduplicated() {
        let records = vec![
            prompt(1, "x", &["a", "b"]),
            prompt(2, "y", &["b", "c"]),
            prompt(3, "z", &["", "a"]),
        ];
        assert_eq!(available_tags(&records), vec!["a", "b", "c"]);
    }

    #[test]
    fn available_tags_are_plain_text() {
        let records = vec![prompt(1, "x", &["r&d"])];
        assert_eq!(available_tags(&records), vec!["r&d"]);
    }
}

//! Reversible escaping of the characters that matter when stored text is
//! later rendered as markup.
//!
//! Stored prompts always hold the sanitized form. Anything shown to a person
//! or matched against a search query goes through [`desanitize`] first.

use std::borrow::Cow;
use std::collections::BTreeMap;

/// Reserved characters and their references. `&` comes first.
const ENTITIES: [(char, &str); 6] = [
    ('&', "&amp;"),
    ('<', "&lt;"),
    ('>', "&gt;"),
    ('"', "&quot;"),
    ('\'', "&#x27;"),
    ('/', "&#x2F;"),
];

fn is_reserved(ch: char) -> bool {
    matches!(ch, '&' | '<' | '>' | '"' | '\'' | '/')
}

/// Encodes `& < > " ' /` as character references.
///
/// Runs in a single pass, so an `&` that is already part of a reference is
/// encoded exactly once and `sanitize("&lt;")` is `"&amp;lt;"`.
pub fn sanitize(text: &str) -> Cow<'_, str> {
    if !text.contains(is_reserved) {
        return Cow::Borrowed(text);
    }
    let mut output = String::with_capacity(text.len() + text.len() / 4);
    for ch in text.chars() {
        match ENTITIES.iter().find(|(reserved, _)| *reserved == ch) {
            Some((_, entity)) => output.push_str(entity),
            None => output.push(ch),
        }
    }
    Cow::Owned(output)
}

/// Decodes the references produced by [`sanitize`].
///
/// Decoded output is never rescanned, which is the same as decoding `&amp;`
/// after every other reference: `"&amp;lt;"` becomes `"&lt;"`, not `"<"`.
/// Unknown references such as `&nbsp;` are left untouched.
pub fn desanitize(text: &str) -> Cow<'_, str> {
    if !text.contains('&') {
        return Cow::Borrowed(text);
    }
    let mut output = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        output.push_str(&rest[..pos]);
        rest = &rest[pos..];
        match ENTITIES
            .iter()
            .find(|(_, entity)| rest.starts_with(entity))
        {
            Some((ch, entity)) => {
                output.push(*ch);
                rest = &rest[entity.len()..];
            }
            None => {
                output.push('&');
                rest = &rest[1..];
            }
        }
    }
    output.push_str(rest);
    Cow::Owned(output)
}

/// Absent text sanitizes to the empty string.
pub fn sanitize_opt(text: Option<&str>) -> String {
    text.map(|value| sanitize(value).into_owned())
        .unwrap_or_default()
}

pub fn desanitize_opt(text: Option<&str>) -> String {
    text.map(|value| desanitize(value).into_owned())
        .unwrap_or_default()
}

/// Order and duplicates are preserved.
pub fn sanitize_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| sanitize(tag).into_owned()).collect()
}

pub fn desanitize_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| desanitize(tag).into_owned()).collect()
}

pub fn sanitize_metadata(metadata: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(key, value)| (sanitize(key).into_owned(), sanitize(value).into_owned()))
        .collect()
}

pub fn desanitize_metadata(metadata: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    metadata
        .iter()
        .map(|(key, value)| {
            (
                desanitize(key).into_owned(),
                desanitize(value).into_owned(),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn sanitize_encodes_every_reserved_character() {
        assert_eq!(
            sanitize(r#"<a href="/x">Tom & Jerry's</a>"#),
            "&lt;a href=&quot;&#x2F;x&quot;&gt;Tom &amp; Jerry&#x27;s&lt;&#x2F;a&gt;"
        );
    }

    #[test]
    fn sanitize_does_not_reinterpret_existing_references() {
        assert_eq!(sanitize("&lt;"), "&amp;lt;");
        assert_eq!(sanitize(&sanitize("&")), "&amp;amp;");
    }

    #[test]
    fn desanitize_decodes_ampersand_last() {
        assert_eq!(desanitize("&amp;lt;"), "&lt;");
        assert_eq!(desanitize("&amp;amp;"), "&amp;");
        assert_eq!(desanitize("a &lt;b&gt; c"), "a <b> c");
    }

    #[test]
    fn desanitize_keeps_unknown_references() {
        assert_eq!(desanitize("&nbsp;&copy; & done"), "&nbsp;&copy; & done");
        assert_eq!(desanitize("trailing &"), "trailing &");
    }

    #[test]
    fn plain_text_is_borrowed_both_ways() {
        assert!(matches!(sanitize("write a poem"), Cow::Borrowed(_)));
        assert!(matches!(desanitize("write a poem"), Cow::Borrowed(_)));
    }

    #[test]
    fn absent_text_becomes_empty() {
        assert_eq!(sanitize_opt(None), "");
        assert_eq!(desanitize_opt(None), "");
        assert_eq!(sanitize_opt(Some("a/b")), "a&#x2F;b");
    }

    #[test]
    fn tags_keep_order_and_duplicates() {
        let tags = vec!["b&c".to_string(), "a".to_string(), "b&c".to_string()];
        let sanitized = sanitize_tags(&tags);
        assert_eq!(sanitized, vec!["b&amp;c", "a", "b&amp;c"]);
        assert_eq!(desanitize_tags(&sanitized), tags);
    }

    #[test]
    fn metadata_sanitizes_keys_and_values() {
        let mut metadata = BTreeMap::new();
        metadata.insert("<model>".to_string(), "gpt/4".to_string());
        let sanitized = sanitize_metadata(&metadata);
        assert_eq!(sanitized.get("&lt;model&gt;").map(String::as_str), Some("gpt&#x2F;4"));
        assert_eq!(desanitize_metadata(&sanitized), metadata);
    }

    #[test]
    fn round_trip_over_reserved_alphabet() {
        let alphabet = ['&', '<', '>', '"', '\'', '/', 'a', ';', '#', 'x'];
        for a in alphabet {
            for b in alphabet {
                for c in alphabet {
                    let text: String = [a, b, c].iter().collect();
                    let back = desanitize(&sanitize(&text)).into_owned();
                    assert_eq!(back, text, "input {text:?}");
                }
            }
        }
    }

    proptest! {
        #[test]
        fn round_trip_any_text(text in "\\PC*") {
            let back = desanitize(&sanitize(&text)).into_owned();
            prop_assert_eq!(back.as_str(), text.as_str());
        }

        #[test]
        fn round_trip_entity_like_text(text in "[&a-z#0-9;<>/'\"]{0,24}") {
            let back = desanitize(&sanitize(&text)).into_owned();
            prop_assert_eq!(back.as_str(), text.as_str());
        }

        #[test]
        fn plain_text_is_unchanged(text in "[^&<>\"'/]*") {
            let encoded = sanitize(&text).into_owned();
            let decoded = desanitize(&text).into_owned();
            prop_assert_eq!(encoded.as_str(), text.as_str());
            prop_assert_eq!(decoded.as_str(), text.as_str());
        }
    }
}

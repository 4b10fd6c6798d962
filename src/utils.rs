// Text helpers shared by the normalizer and the parser
use regex::Regex;
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("hardcoded regex pattern is valid"));

/// Collapses runs of whitespace into single spaces and trims the ends.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text.trim(), " ").into_owned()
}

/// Case-folded, whitespace-collapsed form used for keys and duplicate checks.
pub fn normalize_key(text: &str) -> String {
    collapse_whitespace(text).to_lowercase()
}

/// Whether `needle` occurs in `haystack` as a run of whole words.
/// Both sides are compared in their normalized form.
pub fn contains_words(haystack: &str, needle: &str) -> bool {
    let haystack = normalize_key(haystack);
    let needle = normalize_key(needle);
    if needle.is_empty() {
        return false;
    }
    haystack.match_indices(&needle).any(|(start, _)| {
        let end = start + needle.len();
        let before = haystack[..start].chars().next_back();
        let after = haystack[end..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}

/// Converts a string to kebab-case, used for image file prefixes.
pub fn to_kebab_case(text: &str) -> String {
    normalize_key(text).replace(' ', "-")
}

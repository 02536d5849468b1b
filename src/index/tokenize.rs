//! Tokenizer shared by indexing and text queries

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token regex is valid"));

/// Lowercase and split on anything that is not a letter or digit.
/// Tokens are returned in order of appearance, duplicates included.
pub fn tokenize(text: &str) -> Vec<String> {
    TOKEN_REGEX
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Distinct tokens of `text`
pub fn word_set(text: &str) -> BTreeSet<String> {
    tokenize(text).into_iter().collect()
}

/// Canonical form used for phrase containment: tokens joined by single spaces
pub fn normalize_phrase(text: &str) -> String {
    tokenize(text).join(" ")
}

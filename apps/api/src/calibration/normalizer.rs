//! Feature-name normalization shared by the calibration store, the matcher and the loader.
//!
//! Two keys are produced from the same free-text name:
//! - the strict key (`[a-z0-9]` only, concatenated) used for exact lookup and as the store key
//! - the token set (stopwords removed) used for Jaccard overlap scoring
//!
//! Both functions are total: any input, including the empty string, yields a value.

use std::collections::BTreeSet;

/// Tokens that carry no signal when comparing feature names.
pub const STOPWORDS: &[&str] = &[
    "user",
    "management",
    "system",
    "module",
    "service",
    "and",
    "&",
    "the",
    "a",
    "an",
    "for",
    "with",
];

/// Lowercases `name` and keeps only ASCII letters and digits.
///
/// `"OAuth 2.0 Login"` → `"oauth20login"`.
pub fn normalize_strict(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

/// Lowercases `name`, replaces every non-word character with a space, splits on whitespace
/// and drops stopwords.
///
/// `"User Management & Roles"` → `{"roles"}`.
pub fn normalize_for_tokens(name: &str) -> BTreeSet<String> {
    let spaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if is_word_char(c) || c.is_whitespace() { c } else { ' ' })
        .collect();

    spaced
        .split_whitespace()
        .filter(|token| !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Splits a strict key into tokens, inserting a break between a lowercase letter and a
/// following digit (`"api2"` → `{"api", "2"}`).
pub fn tokenize_key(key: &str) -> BTreeSet<String> {
    let mut expanded = String::with_capacity(key.len() + 4);
    let mut prev: Option<char> = None;

    for c in key.chars() {
        if let Some(p) = prev {
            if p.is_ascii_lowercase() && c.is_ascii_digit() {
                expanded.push(' ');
            }
        }
        expanded.push(c);
        prev = Some(c);
    }

    expanded.split_whitespace().map(str::to_string).collect()
}

/// Jaccard similarity `|a ∩ b| / |a ∪ b|`. Returns 0.0 when both sets are empty.
pub fn token_overlap(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    intersection as f64 / union as f64
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

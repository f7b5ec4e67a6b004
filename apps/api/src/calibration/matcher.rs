//! Resolves a free-text feature name to the best trustworthy calibration entry.
//!
//! Order is fixed and deterministic:
//! 1. Exact strict-key hit with `sample_size >= 2` wins outright.
//! 2. Otherwise every trustworthy entry is scanned. An entry is a candidate when its key and
//!    the query's strict key contain one another (substring), or when the Jaccard overlap
//!    between the query tokens and the entry's key tokens is at least 0.6.
//! 3. Among candidates the largest `sample_size` wins; ties keep the first key in sorted order.

use serde::Serialize;
use tracing::debug;

use crate::calibration::normalizer::{
    normalize_for_tokens, normalize_strict, token_overlap, tokenize_key,
};
use crate::calibration::store::{CalibrationEntry, CalibrationStore};

pub const TOKEN_OVERLAP_THRESHOLD: f64 = 0.6;

/// How a match was found. Reported for diagnostics only; ranking ignores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    Exact,
    Substring,
    TokenOverlap,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CalibrationMatch<'a> {
    pub entry: &'a CalibrationEntry,
    pub tier: MatchTier,
}

/// `{avg_hours, sample_size}` view of a match.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibrationInfo {
    pub key: String,
    pub avg_hours: f64,
    pub sample_size: u32,
    pub tier: MatchTier,
}

pub struct CalibrationMatcher<'a> {
    store: &'a CalibrationStore,
}

impl<'a> CalibrationMatcher<'a> {
    pub fn new(store: &'a CalibrationStore) -> Self {
        Self { store }
    }

    /// Best trustworthy entry for `name`, or `None`.
    pub fn find(&self, name: &str) -> Option<&'a CalibrationEntry> {
        self.find_with_tier(name).map(|m| m.entry)
    }

    pub fn find_with_tier(&self, name: &str) -> Option<CalibrationMatch<'a>> {
        let strict_key = normalize_strict(name);

        if let Some(entry) = self.store.get(&strict_key) {
            if entry.is_trustworthy() {
                return Some(CalibrationMatch {
                    entry,
                    tier: MatchTier::Exact,
                });
            }
        }

        let query_tokens = normalize_for_tokens(name);
        if query_tokens.is_empty() {
            return None;
        }

        let mut best: Option<CalibrationMatch<'a>> = None;

        for entry in self.store.iter().filter(|e| e.is_trustworthy()) {
            let tier = if is_substring_match(&strict_key, &entry.key) {
                MatchTier::Substring
            } else if token_overlap(&query_tokens, &tokenize_key(&entry.key))
                >= TOKEN_OVERLAP_THRESHOLD
            {
                MatchTier::TokenOverlap
            } else {
                continue;
            };

            let better = best
                .as_ref()
                .map_or(true, |b| entry.sample_size > b.entry.sample_size);
            if better {
                best = Some(CalibrationMatch { entry, tier });
            }
        }

        if let Some(m) = &best {
            debug!(
                "Fuzzy calibration match: '{}' → '{}' ({:?}, n={})",
                name, m.entry.key, m.tier, m.entry.sample_size
            );
        }

        best
    }

    pub fn calibration_info(&self, name: &str) -> Option<CalibrationInfo> {
        let m = self.find_with_tier(name)?;
        let avg_hours = m.entry.avg_hours()?;
        Some(CalibrationInfo {
            key: m.entry.key.clone(),
            avg_hours,
            sample_size: m.entry.sample_size,
            tier: m.tier,
        })
    }
}

/// Either key contains the other. An empty strict key (a name with no ASCII letters or
/// digits) is contained in every entry key.
fn is_substring_match(strict_key: &str, entry_key: &str) -> bool {
    strict_key.contains(entry_key) || entry_key.contains(strict_key)
}

//! In-memory calibration table: normalized feature key → aggregated historical effort.
//!
//! Built once at startup and shared read-only (`Arc<CalibrationStore>`) by every request.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::calibration::normalizer::normalize_strict;

/// Minimum observations before an entry may override a base estimate.
pub const MIN_TRUSTED_SAMPLES: u32 = 2;

/// Aggregated historical effort for one normalized key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationEntry {
    pub key: String,
    pub total_hours: f64,
    pub sample_size: u32,
}

impl CalibrationEntry {
    /// `total_hours / sample_size`, or `None` when there are no samples.
    pub fn avg_hours(&self) -> Option<f64> {
        if self.sample_size == 0 {
            None
        } else {
            Some(self.total_hours / self.sample_size as f64)
        }
    }

    pub fn is_trustworthy(&self) -> bool {
        self.sample_size >= MIN_TRUSTED_SAMPLES
    }
}

/// One row of loader output: the averaged view of a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedCalibration {
    pub avg_hours: f64,
    pub sample_size: u32,
    #[serde(default)]
    pub sources: Vec<String>,
}

/// Historical context row handed to the external sizing call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationSummaryEntry {
    pub feature: String,
    pub avg_hours: f64,
    pub sample_size: u32,
}

#[derive(Debug, Default, Clone)]
pub struct CalibrationStore {
    // Sorted so that scans, and therefore matcher tie-breaks, are deterministic.
    entries: BTreeMap<String, CalibrationEntry>,
}

impl CalibrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs aggregated rows. `total_hours` is rebuilt as `avg_hours * sample_size`.
    /// Existing entries with the same key are replaced, never merged.
    pub fn load(&mut self, aggregated: &BTreeMap<String, AggregatedCalibration>) {
        for (raw_key, data) in aggregated {
            let key = normalize_strict(raw_key);
            if key.is_empty() {
                continue;
            }
            self.entries.insert(
                key.clone(),
                CalibrationEntry {
                    key,
                    total_hours: data.avg_hours * data.sample_size as f64,
                    sample_size: data.sample_size,
                },
            );
        }

        info!(
            "Loaded {} features into calibration store",
            self.entries.len()
        );
    }

    /// Records one observed effort for `feature_name`. Not used on the request path.
    // TODO: expose through an offline feedback import once delivered-project actuals are exported.
    #[allow(dead_code)]
    pub fn add_calibration_data(&mut self, feature_name: &str, actual_hours: f64) {
        let key = normalize_strict(feature_name);
        if key.is_empty() {
            return;
        }
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| CalibrationEntry {
                key,
                total_hours: 0.0,
                sample_size: 0,
            });
        entry.total_hours += actual_hours;
        entry.sample_size += 1;
    }

    pub fn get(&self, key: &str) -> Option<&CalibrationEntry> {
        self.entries.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CalibrationEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trustworthy entries only, ascending by average hours.
    pub fn summary(&self) -> Vec<CalibrationSummaryEntry> {
        let mut rows: Vec<CalibrationSummaryEntry> = self
            .entries
            .values()
            .filter(|e| e.is_trustworthy())
            .filter_map(|e| {
                e.avg_hours().map(|avg| CalibrationSummaryEntry {
                    feature: e.key.clone(),
                    avg_hours: round1(avg),
                    sample_size: e.sample_size,
                })
            })
            .collect();

        rows.sort_by(|a, b| a.avg_hours.total_cmp(&b.avg_hours));
        rows
    }
}

/// Rounds to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aggregated(rows: &[(&str, f64, u32)]) -> BTreeMap<String, AggregatedCalibration> {
        rows.iter()
            .map(|(k, avg, n)| {
                (
                    k.to_string(),
                    AggregatedCalibration {
                        avg_hours: *avg,
                        sample_size: *n,
                        sources: vec![],
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_load_rebuilds_total_hours() {
        let mut store = CalibrationStore::new();
        store.load(&aggregated(&[("oauthlogin", 50.0, 4)]));

        let entry = store.get("oauthlogin").unwrap();
        assert_eq!(entry.total_hours, 200.0);
        assert_eq!(entry.sample_size, 4);
        assert_eq!(entry.avg_hours(), Some(50.0));
    }

    #[test]
    fn test_load_normalizes_raw_keys() {
        let mut store = CalibrationStore::new();
        store.load(&aggregated(&[("OAuth Login", 50.0, 4), ("***", 10.0, 3)]));

        assert!(store.get("oauthlogin").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_second_load_replaces_matching_keys() {
        let mut store = CalibrationStore::new();
        store.load(&aggregated(&[("chat", 40.0, 2), ("search", 30.0, 5)]));
        store.load(&aggregated(&[("chat", 10.0, 3)]));

        let chat = store.get("chat").unwrap();
        assert_eq!(chat.sample_size, 3);
        assert_eq!(chat.total_hours, 30.0);
        assert_eq!(store.get("search").unwrap().sample_size, 5);
    }

    #[test]
    fn test_avg_hours_undefined_without_samples() {
        let entry = CalibrationEntry {
            key: "x".to_string(),
            total_hours: 0.0,
            sample_size: 0,
        };
        assert_eq!(entry.avg_hours(), None);
        assert!(!entry.is_trustworthy());
    }

    #[test]
    fn test_add_calibration_data_accumulates() {
        let mut store = CalibrationStore::new();
        store.add_calibration_data("Admin Panel", 40.0);
        store.add_calibration_data("admin-panel", 60.0);

        let entry = store.get("adminpanel").unwrap();
        assert_eq!(entry.sample_size, 2);
        assert_eq!(entry.avg_hours(), Some(50.0));
    }

    #[test]
    fn test_summary_filters_and_sorts() {
        let mut store = CalibrationStore::new();
        store.load(&aggregated(&[
            ("payments", 80.0, 3),
            ("login", 20.0, 2),
            ("chat", 5.0, 1),
            ("search", 45.56, 4),
        ]));

        let summary = store.summary();
        let keys: Vec<&str> = summary.iter().map(|r| r.feature.as_str()).collect();
        assert_eq!(keys, vec!["login", "search", "payments"]);
        assert_eq!(summary[1].avg_hours, 45.6);
    }

    #[test]
    fn test_empty_store_summary_is_empty() {
        let store = CalibrationStore::new();
        assert!(store.is_empty());
        assert!(store.summary().is_empty());
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(16.0 * 1.2), 19.2);
        assert_eq!(round1(50.0 * 1.2), 60.0);
        assert_eq!(round1(0.04), 0.0);
    }
}

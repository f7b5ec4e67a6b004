//! Calibration ETL: reads historical effort sheets exported as JSON and aggregates them
//! into per-key averages for [`CalibrationStore::load`](crate::calibration::store::CalibrationStore::load).
//!
//! Each `*.json` file in the calibration folder holds an array of rows such as:
//!
//! ```json
//! [
//!   {"module name": "OAuth Login", "total hours": 48},
//!   {"feature": "Admin Panel", "backend": 20, "web mobile": 30}
//! ]
//! ```
//!
//! A broken file is logged and skipped; the other files still load.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::calibration::normalizer::normalize_strict;
use crate::calibration::store::{round1, AggregatedCalibration};

/// Row names containing any of these are sheet subtotals, not features.
const SKIP_ROW_KEYWORDS: &[&str] = &[
    "total",
    "subtotal",
    "summary",
    "grand total",
    "sub-total",
    "sub total",
    "grand-total",
];

/// Source of aggregated calibration data. Callers must tolerate both an empty map and an error.
pub trait CalibrationLoader {
    fn load_all(&self) -> Result<BTreeMap<String, AggregatedCalibration>>;
}

/// One row of a historical effort sheet.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoricalRecord {
    #[serde(
        default,
        alias = "module name",
        alias = "module_name",
        alias = "feature",
        alias = "module"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        alias = "total hours",
        alias = "total",
        alias = "hours"
    )]
    pub total_hours: Option<f64>,
    #[serde(default, alias = "web mobile")]
    pub web_mobile: Option<f64>,
    #[serde(default)]
    pub backend: Option<f64>,
    #[serde(default)]
    pub wireframe: Option<f64>,
    #[serde(default, alias = "visual design")]
    pub visual_design: Option<f64>,
}

impl HistoricalRecord {
    /// Cleaned feature name, or `None` for blank, too-short, or subtotal rows.
    fn feature_name(&self) -> Option<&str> {
        let name = self.name.as_deref()?.trim();
        if name.chars().count() < 2 {
            return None;
        }
        let lower = name.to_lowercase();
        if SKIP_ROW_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
            return None;
        }
        Some(name)
    }

    /// Total column when positive, otherwise the sum of the component columns.
    fn hours(&self) -> f64 {
        if let Some(total) = self.total_hours.filter(|h| *h > 0.0) {
            return total;
        }
        [
            self.web_mobile,
            self.backend,
            self.wireframe,
            self.visual_design,
        ]
        .iter()
        .flatten()
        .sum()
    }
}

/// Loads every `*.json` sheet from a folder.
pub struct JsonCalibrationLoader {
    folder: PathBuf,
}

impl JsonCalibrationLoader {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
        }
    }

    fn sheet_files(&self) -> Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(&self.folder)
            .with_context(|| format!("Cannot read calibration folder {}", self.folder.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        files.sort();
        Ok(files)
    }
}

impl CalibrationLoader for JsonCalibrationLoader {
    fn load_all(&self) -> Result<BTreeMap<String, AggregatedCalibration>> {
        if !self.folder.exists() {
            warn!(
                "Calibration folder not found: {}",
                self.folder.display()
            );
            return Ok(BTreeMap::new());
        }

        let files = self.sheet_files()?;
        if files.is_empty() {
            info!("No calibration sheets found in {}", self.folder.display());
            return Ok(BTreeMap::new());
        }

        info!("Found {} calibration sheet(s) to process", files.len());

        let mut records: Vec<(String, f64, String)> = Vec::new();
        for path in &files {
            match read_sheet(path) {
                Ok(rows) => {
                    info!("Processed {}: {} records", path.display(), rows.len());
                    records.extend(rows);
                }
                Err(e) => {
                    error!("Failed to process {}: {e:#}", path.display());
                }
            }
        }

        let aggregated = aggregate_records(&records);
        info!(
            "Loaded {} unique features from calibration data",
            aggregated.len()
        );
        Ok(aggregated)
    }
}

/// Parses one sheet into `(feature_name, hours, source)` rows.
fn read_sheet(path: &Path) -> Result<Vec<(String, f64, String)>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let rows: Vec<HistoricalRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid calibration JSON in {}", path.display()))?;

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_string();

    let mut out = Vec::with_capacity(rows.len());
    for row in &rows {
        let Some(name) = row.feature_name() else {
            continue;
        };
        let hours = row.hours();
        if hours <= 0.0 {
            debug!("Skipping '{}' in {}: no usable hours", name, source);
            continue;
        }
        out.push((name.to_string(), hours, source.clone()));
    }
    Ok(out)
}

/// Groups rows by strict key and averages them.
pub fn aggregate_records(
    records: &[(String, f64, String)],
) -> BTreeMap<String, AggregatedCalibration> {
    let mut sums: BTreeMap<String, (f64, u32, Vec<String>)> = BTreeMap::new();

    for (name, hours, source) in records {
        let key = normalize_strict(name);
        if key.is_empty() {
            continue;
        }
        let slot = sums.entry(key).or_insert_with(|| (0.0, 0, Vec::new()));
        slot.0 += hours;
        slot.1 += 1;
        if !slot.2.contains(source) {
            slot.2.push(source.clone());
        }
    }

    sums.into_iter()
        .map(|(key, (total, count, sources))| {
            (
                key,
                AggregatedCalibration {
                    avg_hours: round1(total / count as f64),
                    sample_size: count,
                    sources,
                },
            )
        })
        .collect()
}

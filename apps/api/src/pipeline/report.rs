//! Report assembly: the client-facing shape of one estimate run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::calibration::round1;
use crate::estimation::models::Complexity;
use crate::estimation::{EstimatedFeature, EstimationResult};
use crate::pipeline::domain::DomainDetection;
use crate::pipeline::proposal::Proposal;
use crate::pipeline::tech_stack::TechStack;
use crate::planning::PlanningResult;
use crate::scoring::ConfidenceBreakdown;

pub const PIPELINE_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallComplexity {
    Low,
    Medium,
    High,
    VeryHigh,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub pipeline_version: String,
    pub feature_count: usize,
    pub calibrated_features: usize,
    /// Percentage of features with any calibrated subfeature, rounded to one decimal.
    pub calibration_coverage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstimateReport {
    pub request_id: Uuid,
    pub generated_at: DateTime<Utc>,
    /// Present when the description was classified by the domain detector.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub domain: Option<DomainDetection>,
    /// Detector confidence, or the value supplied by the caller. Reported alongside the
    /// calibration confidence, never blended into it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub domain_confidence: Option<f64>,
    pub estimation: EstimationResult,
    pub overall_complexity: OverallComplexity,
    pub confidence: ConfidenceBreakdown,
    pub planning: PlanningResult,
    /// Description-driven runs only.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tech_stack: Option<TechStack>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub proposal: Option<Proposal>,
    pub metadata: ReportMetadata,
}

/// `very_high` when more than 40% (or more than 5) features are high, `high` above 20%
/// (or more than 2), then `medium` when medium outnumbers low. Empty input is `medium`.
pub fn overall_complexity(features: &[EstimatedFeature]) -> OverallComplexity {
    if features.is_empty() {
        return OverallComplexity::Medium;
    }

    let count = |c: Complexity| features.iter().filter(|f| f.complexity == c).count();
    let high = count(Complexity::High);
    let medium = count(Complexity::Medium);
    let low = count(Complexity::Low);
    let high_ratio = high as f64 / features.len() as f64;

    if high_ratio > 0.4 || high > 5 {
        OverallComplexity::VeryHigh
    } else if high_ratio > 0.2 || high > 2 {
        OverallComplexity::High
    } else if medium > low {
        OverallComplexity::Medium
    } else {
        OverallComplexity::Low
    }
}

pub fn report_metadata(features: &[EstimatedFeature]) -> ReportMetadata {
    let calibrated = features.iter().filter(|f| f.was_calibrated).count();
    let calibration_coverage = if features.is_empty() {
        0.0
    } else {
        round1(calibrated as f64 / features.len() as f64 * 100.0)
    };

    ReportMetadata {
        pipeline_version: PIPELINE_VERSION.to_string(),
        feature_count: features.len(),
        calibrated_features: calibrated,
        calibration_coverage,
    }
}

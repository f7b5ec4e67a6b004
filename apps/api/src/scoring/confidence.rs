use serde::{Deserialize, Serialize};

use crate::calibration::{CalibrationMatcher, CalibrationStore};
use crate::estimation::EstimatedFeature;

/// Confidence is never reported at or near certainty.
pub const CONFIDENCE_CAP: f64 = 95.0;
/// Strength assumed when no calibration store is available to inspect.
pub const DEFAULT_STRENGTH: f64 = 0.5;
/// Samples needed before a calibration entry counts as strong evidence.
pub const STRONG_SAMPLE_SIZE: u32 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub coverage: f64,
    pub strength: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            coverage: 0.6,
            strength: 0.4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
    /// Share of features resting on any calibrated history (0.0 – 1.0).
    pub coverage: f64,
    /// Share of features resting on strong history (0.0 – 1.0).
    pub strength: f64,
    /// Combined score, 0.0 – 95.0.
    pub score: f64,
}

/// score = min((coverage × 0.6 + strength × 0.4) × 100, 95), always within `[0, 95]`.
/// Empty input scores 0.0.
pub fn compute_confidence(
    features: &[EstimatedFeature],
    store: Option<&CalibrationStore>,
    weights: &ConfidenceWeights,
) -> ConfidenceBreakdown {
    if features.is_empty() {
        return ConfidenceBreakdown {
            coverage: 0.0,
            strength: 0.0,
            score: 0.0,
        };
    }

    let total = features.len() as f64;
    let calibrated = features.iter().filter(|f| f.was_calibrated).count();
    let coverage = calibrated as f64 / total;

    let strength = match store {
        Some(store) => {
            let matcher = CalibrationMatcher::new(store);
            let strong = features
                .iter()
                .filter(|f| f.was_calibrated && has_strong_evidence(f, &matcher))
                .count();
            strong as f64 / total
        }
        None => DEFAULT_STRENGTH,
    };

    let score = ((coverage * weights.coverage + strength * weights.strength) * 100.0)
        .clamp(0.0, CONFIDENCE_CAP);

    ConfidenceBreakdown {
        coverage,
        strength,
        score,
    }
}

/// A feature is strong when one of the subfeatures it was actually calibrated from matched
/// an entry with at least `STRONG_SAMPLE_SIZE` samples. The parent name's own entry never
/// priced anything, so it is not consulted.
fn has_strong_evidence(feature: &EstimatedFeature, matcher: &CalibrationMatcher) -> bool {
    feature
        .subfeatures
        .iter()
        .filter(|s| s.was_calibrated)
        .filter_map(|s| matcher.find(&s.name))
        .any(|entry| entry.sample_size >= STRONG_SAMPLE_SIZE)
}

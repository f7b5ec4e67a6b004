//! Planning: deterministic phase split, team sizing and complexity totals from an estimate.
//!
//! No LLM calls and no state: the same `(total_hours, timeline_weeks, features)` always
//! yields the same plan.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::calibration::round1;
use crate::estimation::EstimatedFeature;

pub const HOURS_PER_WEEK: f64 = 40.0;
pub const MIN_TEAM_SIZE: u32 = 2;
/// Shortest positive horizon a team is sized against (half a working day).
pub const MIN_TIMELINE_WEEKS: f64 = 0.1;

/// Share of total hours per delivery phase. Sums to exactly 1.0.
pub const PHASE_RATIOS: PhaseRatios = PhaseRatios {
    frontend: 0.40,
    backend: 0.35,
    qa: 0.15,
    pm_ba: 0.10,
};

/// Display order for complexity totals; anything else sorts after these.
const COMPLEXITY_ORDER: &[&str] = &["high", "medium", "low"];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhaseRatios {
    pub frontend: f64,
    pub backend: f64,
    pub qa: f64,
    pub pm_ba: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseSplit {
    pub frontend: f64,
    pub backend: f64,
    pub qa: f64,
    pub pm_ba: f64,
}

/// Recommended head count per role.
///
/// Role counts are not constrained to sum to `total_engineers_needed`: front- and back-end
/// are each half the team rounded up, QA is a third rounded down, and PM is always one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecommendation {
    pub frontend: u32,
    pub backend: u32,
    pub qa: u32,
    pub project_manager: u32,
    pub total_engineers_needed: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplexityTotal {
    pub complexity: String,
    pub hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningResult {
    pub phase_split: PhaseSplit,
    pub team_recommendation: TeamRecommendation,
    pub complexity_totals: Vec<ComplexityTotal>,
    pub timeline_weeks: f64,
    pub total_hours: f64,
}

/// Planning view of one feature. `total_hours` wins; `estimated_hours` is the fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningFeature {
    pub complexity: String,
    #[serde(default)]
    pub total_hours: Option<f64>,
    #[serde(default)]
    pub estimated_hours: Option<f64>,
}

impl PlanningFeature {
    fn hours(&self) -> f64 {
        self.total_hours.or(self.estimated_hours).unwrap_or(0.0)
    }
}

impl From<&EstimatedFeature> for PlanningFeature {
    fn from(feature: &EstimatedFeature) -> Self {
        Self {
            complexity: feature.complexity.as_str().to_string(),
            total_hours: Some(feature.total_hours),
            estimated_hours: None,
        }
    }
}

pub fn compute_planning(
    total_hours: f64,
    timeline_weeks: f64,
    features: &[PlanningFeature],
) -> PlanningResult {
    PlanningResult {
        phase_split: compute_phase_split(total_hours),
        team_recommendation: compute_team_recommendation(total_hours, timeline_weeks),
        complexity_totals: compute_complexity_totals(features),
        timeline_weeks: round1(timeline_weeks),
        total_hours: round1(total_hours),
    }
}

pub fn compute_phase_split(total_hours: f64) -> PhaseSplit {
    PhaseSplit {
        frontend: round1(total_hours * PHASE_RATIOS.frontend),
        backend: round1(total_hours * PHASE_RATIOS.backend),
        qa: round1(total_hours * PHASE_RATIOS.qa),
        pm_ba: round1(total_hours * PHASE_RATIOS.pm_ba),
    }
}

pub fn compute_team_recommendation(total_hours: f64, timeline_weeks: f64) -> TeamRecommendation {
    let weeks = if timeline_weeks.is_finite() && timeline_weeks > 0.0 {
        timeline_weeks.max(MIN_TIMELINE_WEEKS)
    } else {
        1.0
    };
    let hours_per_engineer = weeks * HOURS_PER_WEEK;

    let needed = (total_hours.max(0.0) / hours_per_engineer).ceil() as u32;
    let total_engineers_needed = needed.max(MIN_TEAM_SIZE);

    let half = (total_engineers_needed as f64 * 0.5).ceil() as u32;

    TeamRecommendation {
        frontend: half.max(1),
        backend: half.max(1),
        qa: (total_engineers_needed / 3).max(1),
        project_manager: 1,
        total_engineers_needed,
    }
}

/// Sums hours per complexity label (case-insensitive), ordered High, Medium, Low, then others
/// alphabetically.
pub fn compute_complexity_totals(features: &[PlanningFeature]) -> Vec<ComplexityTotal> {
    let mut sums: BTreeMap<String, f64> = BTreeMap::new();
    for feature in features {
        let label = feature.complexity.trim().to_lowercase();
        *sums.entry(label).or_insert(0.0) += feature.hours();
    }

    let mut totals: Vec<(String, f64)> = sums.into_iter().collect();
    totals.sort_by(|(a, _), (b, _)| complexity_rank(a).cmp(&complexity_rank(b)).then(a.cmp(b)));

    totals
        .into_iter()
        .map(|(label, hours)| ComplexityTotal {
            complexity: capitalize(&label),
            hours: round1(hours),
        })
        .collect()
}

fn complexity_rank(label: &str) -> usize {
    COMPLEXITY_ORDER
        .iter()
        .position(|known| *known == label)
        .unwrap_or(COMPLEXITY_ORDER.len())
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

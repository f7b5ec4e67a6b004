//! Axum route handlers for the Calibration API.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::calibration::matcher::CalibrationInfo;
use crate::calibration::store::CalibrationSummaryEntry;
use crate::calibration::CalibrationMatcher;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CalibrationQuery {
    /// Optional feature name to resolve against the store.
    pub feature: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CalibrationLookup {
    pub feature: String,
    /// `None` when no trustworthy entry matches.
    pub matched: Option<CalibrationInfo>,
}

#[derive(Debug, Serialize)]
pub struct CalibrationResponse {
    pub source_dir: String,
    pub entry_count: usize,
    pub trusted: Vec<CalibrationSummaryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lookup: Option<CalibrationLookup>,
}

/// GET /api/v1/calibration[?feature=<name>]
///
/// Size of the loaded store and the trustworthy entries the sizing prompt is grounded on.
/// With `feature`, also reports which entry (if any) that name would be calibrated from.
pub async fn handle_get_calibration(
    State(state): State<AppState>,
    Query(query): Query<CalibrationQuery>,
) -> Json<CalibrationResponse> {
    let lookup = query
        .feature
        .filter(|f| !f.trim().is_empty())
        .map(|feature| CalibrationLookup {
            matched: CalibrationMatcher::new(&state.calibration).calibration_info(&feature),
            feature,
        });

    Json(CalibrationResponse {
        source_dir: state.config.calibration_dir.display().to_string(),
        entry_count: state.calibration.len(),
        trusted: state.calibration.summary(),
        lookup,
    })
}

//! Axum route handlers for the Estimates API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::estimation::FeatureSpec;
use crate::pipeline::report::EstimateReport;
use crate::pipeline::{run_describe, run_estimate, EstimateInput, PipelineError};
use crate::planning::MIN_TIMELINE_WEEKS;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EstimateRequest {
    #[serde(default)]
    pub project_description: String,
    #[serde(default)]
    pub features: Vec<FeatureSpec>,
    #[serde(default)]
    pub timeline_weeks: Option<f64>,
    #[serde(default)]
    pub domain_confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct DescribeRequest {
    pub project_description: String,
    #[serde(default)]
    pub timeline_weeks: Option<f64>,
}

fn validate_timeline(timeline_weeks: Option<f64>) -> Result<(), AppError> {
    match timeline_weeks {
        Some(weeks) if !weeks.is_finite() || weeks < MIN_TIMELINE_WEEKS => {
            Err(AppError::Validation(format!(
                "timeline_weeks must be a number of at least {MIN_TIMELINE_WEEKS}"
            )))
        }
        _ => Ok(()),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/estimates
///
/// Estimates caller-supplied features. Blank feature names are dropped, not rejected;
/// an empty list yields a zero-hour report.
pub async fn handle_create_estimate(
    State(state): State<AppState>,
    Json(request): Json<EstimateRequest>,
) -> Result<Json<EstimateReport>, AppError> {
    validate_timeline(request.timeline_weeks)?;
    if let Some(c) = request.domain_confidence {
        if !(0.0..=1.0).contains(&c) {
            return Err(AppError::Validation(
                "domain_confidence must be between 0.0 and 1.0".to_string(),
            ));
        }
    }

    let report = run_estimate(
        &state.estimation,
        EstimateInput {
            project_description: request.project_description,
            features: request.features,
            timeline_weeks: request.timeline_weeks,
            domain: None,
            domain_confidence: request.domain_confidence,
        },
    )
    .await;

    Ok(Json(report))
}

/// POST /api/v1/estimates/describe
///
/// Full pipeline from a freeform description: domain detection → feature structuring →
/// tech stack → estimation → proposal → confidence → planning. Requires a configured
/// completion service.
pub async fn handle_describe_estimate(
    State(state): State<AppState>,
    Json(request): Json<DescribeRequest>,
) -> Result<Json<EstimateReport>, AppError> {
    if request.project_description.trim().is_empty() {
        return Err(AppError::Validation(
            "project_description cannot be empty".to_string(),
        ));
    }
    validate_timeline(request.timeline_weeks)?;

    let completion = state.completion.as_ref().ok_or_else(|| {
        AppError::Validation(
            "Description-based estimates need ANTHROPIC_API_KEY to be configured".to_string(),
        )
    })?;

    let report = run_describe(
        &state.estimation,
        completion.as_ref(),
        &request.project_description,
        request.timeline_weeks,
    )
    .await
    .map_err(|e| match e {
        PipelineError::Structuring(e) => AppError::Llm(format!("Feature structuring failed: {e}")),
    })?;

    if report.estimation.features.is_empty() {
        return Err(AppError::UnprocessableEntity(
            "No estimable features could be extracted from the description".to_string(),
        ));
    }

    Ok(Json(report))
}

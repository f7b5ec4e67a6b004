// Pipeline: request → estimate → confidence → planning → report.
// The describe path adds domain detection, structuring, a tech stack and a proposal whose
// timeline sizes the team. Stages run sequentially; the only suspend points are completion calls.

pub mod domain;
pub mod handlers;
pub mod prompts;
pub mod proposal;
pub mod report;
pub mod structuring;
pub mod tech_stack;

use chrono::Utc;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::calibration::round1;
use crate::estimation::{EstimationEngine, EstimationResult, FeatureSpec};
use crate::llm_client::{LlmError, TextCompletionService};
use crate::planning::{compute_planning, PlanningFeature, HOURS_PER_WEEK};
use crate::scoring::{compute_confidence, ConfidenceBreakdown, ConfidenceWeights};

use self::domain::{detect_domain, DomainDetection};
use self::proposal::{draft_proposal, Proposal, ProposalContext};
use self::report::{overall_complexity, report_metadata, EstimateReport};
use self::structuring::structure_features;
use self::tech_stack::{recommend_tech_stack, TechStack};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("feature structuring failed: {0}")]
    Structuring(#[from] LlmError),
}

/// Everything one estimate run needs besides the engine.
#[derive(Debug, Clone, Default)]
pub struct EstimateInput {
    pub project_description: String,
    pub features: Vec<FeatureSpec>,
    pub timeline_weeks: Option<f64>,
    pub domain: Option<DomainDetection>,
    pub domain_confidence: Option<f64>,
}

/// Stage outputs carried into the report next to the estimate itself.
#[derive(Debug, Default)]
struct ReportExtras {
    timeline_weeks: Option<f64>,
    domain: Option<DomainDetection>,
    domain_confidence: Option<f64>,
    tech_stack: Option<TechStack>,
    proposal: Option<Proposal>,
}

/// Caller-supplied positive timeline, otherwise one engineer-week per 40 hours.
pub fn resolve_timeline_weeks(requested: Option<f64>, total_hours: f64) -> f64 {
    match requested {
        Some(weeks) if weeks.is_finite() && weeks > 0.0 => weeks,
        _ => total_hours / HOURS_PER_WEEK,
    }
}

/// Runs estimation, confidence and planning over caller-supplied features. Never fails.
pub async fn run_estimate(engine: &EstimationEngine, input: EstimateInput) -> EstimateReport {
    let request_id = Uuid::new_v4();
    info!(
        "[{request_id}] Estimating {} requested features",
        input.features.len()
    );

    let estimation = engine
        .estimate(&input.features, &input.project_description)
        .await;

    assemble_report(
        engine,
        request_id,
        estimation,
        ReportExtras {
            timeline_weeks: input.timeline_weeks,
            domain: input.domain,
            domain_confidence: input.domain_confidence,
            ..ReportExtras::default()
        },
    )
}

/// Description-only entry point: domain, features, tech stack, estimate, proposal, plan.
///
/// The caller's timeline wins; otherwise the proposal's timeline sizes the team. Domain
/// detection, the tech stack and the proposal degrade silently; a failed structuring call is
/// the only error.
pub async fn run_describe(
    engine: &EstimationEngine,
    service: &dyn TextCompletionService,
    project_description: &str,
    timeline_weeks: Option<f64>,
) -> Result<EstimateReport, PipelineError> {
    let request_id = Uuid::new_v4();
    let domain = detect_domain(project_description, service).await;
    let features = structure_features(project_description, service).await?;

    if features.is_empty() {
        info!("[{request_id}] No features extracted; skipping tech stack and proposal");
        let estimation = EstimationResult::empty();
        return Ok(assemble_report(
            engine,
            request_id,
            estimation,
            ReportExtras {
                timeline_weeks,
                domain: Some(domain),
                ..ReportExtras::default()
            },
        ));
    }

    info!(
        "[{request_id}] Estimating {} structured features ({} domain)",
        features.len(),
        domain.domain
    );

    let tech_stack = recommend_tech_stack(domain.domain, &features, Some(service)).await;
    let estimation = engine.estimate(&features, project_description).await;

    let proposal = draft_proposal(
        &ProposalContext {
            domain: domain.domain,
            description: project_description,
            features: &estimation.features,
            total_hours: estimation.total_hours,
            tech_stack: Some(&tech_stack),
        },
        service,
    )
    .await;

    Ok(assemble_report(
        engine,
        request_id,
        estimation,
        ReportExtras {
            timeline_weeks: timeline_weeks.or(Some(proposal.timeline_weeks)),
            domain: Some(domain),
            domain_confidence: None,
            tech_stack: Some(tech_stack),
            proposal: Some(proposal),
        },
    ))
}

fn assemble_report(
    engine: &EstimationEngine,
    request_id: Uuid,
    estimation: EstimationResult,
    extras: ReportExtras,
) -> EstimateReport {
    let confidence = compute_confidence(
        &estimation.features,
        Some(engine.store()),
        &ConfidenceWeights::default(),
    );

    let timeline_weeks = resolve_timeline_weeks(extras.timeline_weeks, estimation.total_hours);
    let planning_features: Vec<PlanningFeature> =
        estimation.features.iter().map(PlanningFeature::from).collect();
    let planning = compute_planning(estimation.total_hours, timeline_weeks, &planning_features);

    info!(
        "[{request_id}] Estimate complete: {}h ({}–{}h), confidence {:.1}, team of {} over {} weeks",
        estimation.total_hours,
        estimation.min_hours,
        estimation.max_hours,
        confidence.score,
        planning.team_recommendation.total_engineers_needed,
        planning.timeline_weeks
    );

    let domain_confidence = extras
        .domain
        .as_ref()
        .map(|d| d.confidence)
        .or(extras.domain_confidence)
        .map(|c| (c * 100.0).round() / 100.0);

    EstimateReport {
        request_id,
        generated_at: Utc::now(),
        domain: extras.domain,
        domain_confidence,
        overall_complexity: overall_complexity(&estimation.features),
        metadata: report_metadata(&estimation.features),
        confidence: ConfidenceBreakdown {
            score: round1(confidence.score),
            ..confidence
        },
        planning,
        tech_stack: extras.tech_stack,
        proposal: extras.proposal,
        estimation,
    }
}

//! Client proposal: executive-level sections plus the delivery timeline used to size the team.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::calibration::round1;
use crate::estimation::engine::BUFFER_MULTIPLIER;
use crate::estimation::EstimatedFeature;
use crate::llm_client::prompts::json_system;
use crate::llm_client::TextCompletionService;
use crate::pipeline::domain::Domain;
use crate::pipeline::prompts::{PROPOSAL_PROMPT_TEMPLATE, PROPOSAL_ROLE};
use crate::pipeline::tech_stack::TechStack;
use crate::planning::HOURS_PER_WEEK;

/// Features listed in the proposal prompt.
const MAX_PROMPT_FEATURES: usize = 15;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProposalPhase {
    #[serde(default)]
    pub phase: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    pub executive_summary: String,
    pub scope_of_work: String,
    pub deliverables: Vec<String>,
    pub project_timeline: Vec<ProposalPhase>,
    /// Delivery timeline in weeks, rounded to one decimal. Feeds team sizing when the caller
    /// gave no timeline.
    pub timeline_weeks: f64,
    pub risks: Vec<String>,
    pub mitigation_strategies: Vec<String>,
    pub assumptions: Vec<String>,
    pub client_dependencies: Vec<String>,
    /// False when the sections could not be drafted and only the defaults are present.
    pub drafted: bool,
}

impl Proposal {
    pub fn fallback(total_hours: f64) -> Self {
        Self {
            executive_summary: String::new(),
            scope_of_work: String::new(),
            deliverables: Vec::new(),
            project_timeline: Vec::new(),
            timeline_weeks: default_timeline_weeks(total_hours),
            risks: Vec::new(),
            mitigation_strategies: Vec::new(),
            assumptions: default_assumptions(),
            client_dependencies: Vec::new(),
            drafted: false,
        }
    }
}

/// What the proposal is written about.
pub struct ProposalContext<'a> {
    pub domain: Domain,
    pub description: &'a str,
    pub features: &'a [EstimatedFeature],
    pub total_hours: f64,
    pub tech_stack: Option<&'a TechStack>,
}

fn default_timeline_weeks(total_hours: f64) -> f64 {
    round1(total_hours.max(0.0) / HOURS_PER_WEEK)
}

fn default_assumptions() -> Vec<String> {
    let buffer_percent = ((BUFFER_MULTIPLIER - 1.0) * 100.0).round();
    vec![
        format!("Estimates include a {buffer_percent}% buffer for unforeseen complexity"),
        "Assumes standard development practices and code quality".to_string(),
        "Third-party API integrations are assumed to have stable documentation".to_string(),
    ]
}

#[derive(Debug, Deserialize)]
struct RawProposal {
    #[serde(default)]
    executive_summary: String,
    #[serde(default)]
    scope_of_work: String,
    #[serde(default)]
    deliverables: Vec<String>,
    #[serde(default)]
    project_timeline: Vec<ProposalPhase>,
    #[serde(default)]
    timeline_weeks: Option<Value>,
    #[serde(default)]
    risks: Vec<String>,
    #[serde(default)]
    mitigation_strategies: Vec<String>,
    #[serde(default)]
    assumptions: Vec<String>,
    #[serde(default)]
    client_dependencies: Vec<String>,
}

/// Decodes a drafted proposal. A missing or non-positive `timeline_weeks` becomes
/// `total_hours / 40`; an empty assumption list gets the default assumptions.
pub fn decode_proposal(raw: &str, total_hours: f64) -> Result<Proposal, serde_json::Error> {
    let raw: RawProposal = serde_json::from_str(raw.trim())?;

    let timeline_weeks = raw
        .timeline_weeks
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|w| w.is_finite() && *w > 0.0)
        .map(round1)
        .unwrap_or_else(|| default_timeline_weeks(total_hours));

    let assumptions = if raw.assumptions.is_empty() {
        default_assumptions()
    } else {
        raw.assumptions
    };

    Ok(Proposal {
        executive_summary: raw.executive_summary,
        scope_of_work: raw.scope_of_work,
        deliverables: raw.deliverables,
        project_timeline: raw.project_timeline,
        timeline_weeks,
        risks: raw.risks,
        mitigation_strategies: raw.mitigation_strategies,
        assumptions,
        client_dependencies: raw.client_dependencies,
        drafted: true,
    })
}

fn build_proposal_prompt(ctx: &ProposalContext<'_>) -> String {
    let feature_summary = ctx
        .features
        .iter()
        .take(MAX_PROMPT_FEATURES)
        .map(|f| format!("- {} ({} complexity)", f.name, f.complexity.as_str()))
        .collect::<Vec<_>>()
        .join("\n");
    let tech_summary = ctx
        .tech_stack
        .map(TechStack::summary)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "To be confirmed".to_string());

    // Description last: it is free text and may itself contain braces.
    PROPOSAL_PROMPT_TEMPLATE
        .replace("{domain}", ctx.domain.as_str())
        .replace("{total_hours}", &round1(ctx.total_hours).to_string())
        .replace("{tech_summary}", &tech_summary)
        .replace("{feature_summary}", &feature_summary)
        .replace("{description}", ctx.description.trim())
}

/// Never fails: transport errors and undecodable answers return [`Proposal::fallback`].
pub async fn draft_proposal(
    ctx: &ProposalContext<'_>,
    service: &dyn TextCompletionService,
) -> Proposal {
    let prompt = build_proposal_prompt(ctx);

    let raw = match service.complete(&prompt, &json_system(PROPOSAL_ROLE)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Proposal drafting failed: {e}");
            return Proposal::fallback(ctx.total_hours);
        }
    };

    match decode_proposal(&raw, ctx.total_hours) {
        Ok(proposal) => {
            info!(
                "Drafted proposal: {} phases over {} weeks",
                proposal.project_timeline.len(),
                proposal.timeline_weeks
            );
            proposal
        }
        Err(e) => {
            warn!("Proposal drafting returned malformed JSON: {e}");
            Proposal::fallback(ctx.total_hours)
        }
    }
}

//! Tech stack recommendation: a fixed table for well-known domains, a completion call for
//! everything else.
//!
//! Never fails. A missing service, a transport error or an undecodable answer yields the
//! default stack.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::estimation::FeatureSpec;
use crate::llm_client::prompts::json_system;
use crate::llm_client::TextCompletionService;
use crate::pipeline::domain::Domain;
use crate::pipeline::prompts::{TECH_STACK_PROMPT_TEMPLATE, TECH_STACK_ROLE};

/// Features listed in the generation prompt.
const MAX_PROMPT_FEATURES: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StackSource {
    /// Taken from the fixed domain table.
    Mapped,
    /// Produced by the completion service for an unmapped domain.
    Generated,
    /// Generation was unavailable or unusable.
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechStack {
    pub frontend: Vec<String>,
    pub backend: Vec<String>,
    pub database: Vec<String>,
    pub infrastructure: Vec<String>,
    pub third_party_services: Vec<String>,
    pub justification: String,
    pub source: StackSource,
}

impl TechStack {
    fn new(
        frontend: &[&str],
        backend: &[&str],
        database: &[&str],
        infrastructure: &[&str],
        third_party_services: &[&str],
        justification: &str,
        source: StackSource,
    ) -> Self {
        let owned = |items: &[&str]| -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        };
        Self {
            frontend: owned(frontend),
            backend: owned(backend),
            database: owned(database),
            infrastructure: owned(infrastructure),
            third_party_services: owned(third_party_services),
            justification: justification.to_string(),
            source,
        }
    }

    fn fallback() -> Self {
        Self::new(
            &["React", "TypeScript", "TailwindCSS"],
            &["Node.js", "Python/FastAPI"],
            &["PostgreSQL", "Redis"],
            &["AWS", "Docker"],
            &[],
            "General-purpose web stack; no domain-specific recommendation was available.",
            StackSource::Default,
        )
    }

    /// Frontend and backend technologies, comma-separated, for prompts and summaries.
    pub fn summary(&self) -> String {
        self.frontend
            .iter()
            .chain(self.backend.iter())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Stack for domains with an established recommendation, `None` for the rest.
pub fn mapped_stack(domain: Domain) -> Option<TechStack> {
    use StackSource::Mapped;

    let stack = match domain {
        Domain::Ecommerce => TechStack::new(
            &["React", "Next.js", "TailwindCSS"],
            &["Node.js", "Express/NestJS", "Python/FastAPI"],
            &["PostgreSQL", "Redis"],
            &["AWS/GCP", "Docker", "Nginx"],
            &["Stripe", "SendGrid", "Cloudinary"],
            "Proven stack for high-traffic stores: fast page loads, secure payments and a \
             horizontally scalable backend.",
            Mapped,
        ),
        Domain::Saas => TechStack::new(
            &["React", "TypeScript", "TailwindCSS"],
            &["Node.js/NestJS", "Python/FastAPI"],
            &["PostgreSQL", "Redis"],
            &["AWS/GCP", "Kubernetes", "Docker"],
            &["Stripe", "Auth0", "SendGrid", "Segment"],
            "Multi-tenant friendly stack with managed authentication and billing.",
            Mapped,
        ),
        Domain::Marketplace => TechStack::new(
            &["React", "Next.js", "TailwindCSS"],
            &["Node.js", "Python/FastAPI"],
            &["PostgreSQL", "MongoDB", "Redis"],
            &["AWS", "Docker", "Nginx"],
            &["Stripe Connect", "Twilio", "AWS S3"],
            "Supports multi-vendor workflows and split payments.",
            Mapped,
        ),
        Domain::Healthcare => TechStack::new(
            &["React", "TypeScript", "Material-UI"],
            &["Python/FastAPI", "Node.js"],
            &["PostgreSQL", "Redis"],
            &["AWS (HIPAA-eligible)", "Docker", "VPN"],
            &["Twilio Video", "SendGrid", "AWS KMS"],
            "Encryption at rest and in transit, audit logging and telemedicine support for \
             HIPAA workloads.",
            Mapped,
        ),
        Domain::Fintech => TechStack::new(
            &["React", "TypeScript", "Material-UI"],
            &["Python/FastAPI", "Node.js"],
            &["PostgreSQL", "Redis"],
            &["AWS", "Kubernetes", "WAF"],
            &["Plaid", "Stripe", "Twilio", "AWS KMS"],
            "Security-first stack for PCI scope and real-time transaction processing.",
            Mapped,
        ),
        Domain::Enterprise => TechStack::new(
            &["React", "TypeScript", "TailwindCSS"],
            &["Python/FastAPI", "Node.js/NestJS"],
            &["PostgreSQL", "Redis"],
            &["AWS/GCP", "Docker", "Nginx"],
            &["SendGrid", "AWS S3", "Auth0"],
            "Integration-friendly stack with SSO and solid data management.",
            Mapped,
        ),
        _ => return None,
    };
    Some(stack)
}

#[derive(Debug, Deserialize)]
struct RawStack {
    #[serde(default)]
    frontend: Option<Vec<String>>,
    #[serde(default)]
    backend: Option<Vec<String>>,
    #[serde(default)]
    database: Option<Vec<String>>,
    #[serde(default)]
    infrastructure: Option<Vec<String>>,
    #[serde(default)]
    third_party_services: Option<Vec<String>>,
    #[serde(default)]
    justification: Option<String>,
}

/// Decodes a generated stack. Missing sections fall back to conservative defaults.
pub fn decode_stack(raw: &str) -> Result<TechStack, serde_json::Error> {
    let raw: RawStack = serde_json::from_str(raw.trim())?;
    let or = |v: Option<Vec<String>>, default: &[&str]| {
        v.unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
    };

    Ok(TechStack {
        frontend: or(raw.frontend, &["React", "TypeScript"]),
        backend: or(raw.backend, &["Python/FastAPI"]),
        database: or(raw.database, &["PostgreSQL"]),
        infrastructure: or(raw.infrastructure, &["AWS", "Docker"]),
        third_party_services: raw.third_party_services.unwrap_or_default(),
        justification: raw
            .justification
            .unwrap_or_else(|| "Custom stack for project requirements".to_string()),
        source: StackSource::Generated,
    })
}

pub async fn recommend_tech_stack(
    domain: Domain,
    features: &[FeatureSpec],
    service: Option<&dyn TextCompletionService>,
) -> TechStack {
    if let Some(stack) = mapped_stack(domain) {
        info!("Using mapped tech stack for domain {domain}");
        return stack;
    }

    let Some(service) = service else {
        return TechStack::fallback();
    };

    let feature_list = features
        .iter()
        .take(MAX_PROMPT_FEATURES)
        .map(|f| format!("- {}", f.name))
        .collect::<Vec<_>>()
        .join("\n");
    let prompt = TECH_STACK_PROMPT_TEMPLATE
        .replace("{domain}", domain.as_str())
        .replace("{feature_list}", &feature_list);

    let raw = match service.complete(&prompt, &json_system(TECH_STACK_ROLE)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Tech stack generation failed: {e}");
            return TechStack::fallback();
        }
    };

    match decode_stack(&raw) {
        Ok(stack) => {
            info!("Generated tech stack for domain {domain}");
            stack
        }
        Err(e) => {
            warn!("Tech stack generation returned malformed JSON: {e}");
            TechStack::fallback()
        }
    }
}

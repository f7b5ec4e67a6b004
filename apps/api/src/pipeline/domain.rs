//! Domain detection: classifies a project description into one closed domain label.
//!
//! Never fails. Short descriptions, transport errors and undecodable answers all come back
//! as `Domain::Unknown` with confidence 0.0.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::prompts::json_system;
use crate::llm_client::TextCompletionService;
use crate::pipeline::prompts::{DOMAIN_PROMPT_TEMPLATE, DOMAIN_ROLE};

/// Descriptions shorter than this (after trimming) are not worth a completion call.
pub const MIN_DESCRIPTION_CHARS: usize = 10;
/// Used when the model omits a confidence.
const DEFAULT_RAW_CONFIDENCE: f64 = 0.75;
/// Presales confidence band: raw [0, 1] maps onto [0.65, 0.95].
const CONFIDENCE_FLOOR: f64 = 0.65;
const CONFIDENCE_SPAN: f64 = 0.30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Ecommerce,
    Fintech,
    Healthcare,
    Education,
    Saas,
    Enterprise,
    MobileApp,
    WebApp,
    AiMl,
    Marketplace,
    SocialMedia,
    Iot,
    Blockchain,
    #[default]
    Unknown,
}

impl Domain {
    const ALL: [Domain; 14] = [
        Domain::Ecommerce,
        Domain::Fintech,
        Domain::Healthcare,
        Domain::Education,
        Domain::Saas,
        Domain::Enterprise,
        Domain::MobileApp,
        Domain::WebApp,
        Domain::AiMl,
        Domain::Marketplace,
        Domain::SocialMedia,
        Domain::Iot,
        Domain::Blockchain,
        Domain::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Ecommerce => "ecommerce",
            Domain::Fintech => "fintech",
            Domain::Healthcare => "healthcare",
            Domain::Education => "education",
            Domain::Saas => "saas",
            Domain::Enterprise => "enterprise",
            Domain::MobileApp => "mobile_app",
            Domain::WebApp => "web_app",
            Domain::AiMl => "ai_ml",
            Domain::Marketplace => "marketplace",
            Domain::SocialMedia => "social_media",
            Domain::Iot => "iot",
            Domain::Blockchain => "blockchain",
            Domain::Unknown => "unknown",
        }
    }

    /// Case-insensitive; unrecognised labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == label)
            .unwrap_or(Domain::Unknown)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainDetection {
    pub domain: Domain,
    /// Presales confidence, 0.0 when detection did not run or failed.
    pub confidence: f64,
    pub reasoning: String,
}

impl DomainDetection {
    fn unknown(reasoning: &str) -> Self {
        Self {
            domain: Domain::Unknown,
            confidence: 0.0,
            reasoning: reasoning.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDomainAnswer {
    #[serde(default)]
    domain: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Maps a raw model confidence onto the presales band, rounded to two decimals.
pub fn normalize_domain_confidence(raw: f64) -> f64 {
    let clamped = if raw.is_finite() { raw.clamp(0.0, 1.0) } else { 0.0 };
    ((CONFIDENCE_FLOOR + clamped * CONFIDENCE_SPAN) * 100.0).round() / 100.0
}

pub async fn detect_domain(
    description: &str,
    service: &dyn TextCompletionService,
) -> DomainDetection {
    let description = description.trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        return DomainDetection::unknown("Insufficient project description provided");
    }

    let prompt = DOMAIN_PROMPT_TEMPLATE.replace("{description}", description);
    let raw = match service.complete(&prompt, &json_system(DOMAIN_ROLE)).await {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Domain detection failed: {e}");
            return DomainDetection::unknown("Domain detection unavailable");
        }
    };

    let answer: RawDomainAnswer = match serde_json::from_str(raw.trim()) {
        Ok(answer) => answer,
        Err(e) => {
            warn!("Domain detection returned malformed JSON: {e}");
            return DomainDetection::unknown("Domain detection unavailable");
        }
    };

    let detection = DomainDetection {
        domain: answer
            .domain
            .as_deref()
            .map(Domain::from_label)
            .unwrap_or_default(),
        confidence: normalize_domain_confidence(
            answer.confidence.unwrap_or(DEFAULT_RAW_CONFIDENCE),
        ),
        reasoning: answer
            .reasoning
            .unwrap_or_else(|| "Domain classification completed".to_string()),
    };

    info!(
        "Detected domain {} (confidence {:.2})",
        detection.domain, detection.confidence
    );
    detection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Canned {
        reply: Result<&'static str, ()>,
        calls: AtomicUsize,
    }

    impl Canned {
        fn ok(reply: &'static str) -> Self {
            Self {
                reply: Ok(reply),
                calls: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                reply: Err(()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextCompletionService for Canned {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.reply {
                Ok(text) => Ok(text.to_string()),
                Err(()) => Err(LlmError::EmptyContent),
            }
        }
    }

    const DESCRIPTION: &str = "A payments app for small merchants with card processing";

    #[test]
    fn test_domain_labels() {
        assert_eq!(Domain::from_label("FinTech"), Domain::Fintech);
        assert_eq!(Domain::from_label(" ai_ml "), Domain::AiMl);
        assert_eq!(Domain::from_label("gaming"), Domain::Unknown);
        assert_eq!(
            serde_json::to_string(&Domain::SocialMedia).unwrap(),
            "\"social_media\""
        );
    }

    #[test]
    fn test_confidence_band() {
        assert_eq!(normalize_domain_confidence(0.0), 0.65);
        assert_eq!(normalize_domain_confidence(0.5), 0.8);
        assert_eq!(normalize_domain_confidence(1.0), 0.95);
        assert_eq!(normalize_domain_confidence(7.0), 0.95);
        assert_eq!(normalize_domain_confidence(-1.0), 0.65);
        assert_eq!(normalize_domain_confidence(f64::NAN), 0.65);
    }

    #[tokio::test]
    async fn test_short_description_skips_call() {
        let service = Canned::ok(r#"{"domain": "fintech", "confidence": 1.0}"#);
        let detection = detect_domain("  app  ", &service).await;

        assert_eq!(detection.domain, Domain::Unknown);
        assert_eq!(detection.confidence, 0.0);
        assert_eq!(service.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_detects_domain_and_maps_confidence() {
        let service = Canned::ok(
            r#"{"domain": "Fintech", "confidence": 0.9, "reasoning": "Payments product"}"#,
        );
        let detection = detect_domain(DESCRIPTION, &service).await;

        assert_eq!(detection.domain, Domain::Fintech);
        assert_eq!(detection.confidence, 0.92);
        assert_eq!(detection.reasoning, "Payments product");
    }

    #[tokio::test]
    async fn test_unknown_label_and_missing_confidence() {
        let service = Canned::ok(r#"{"domain": "space_tourism"}"#);
        let detection = detect_domain(DESCRIPTION, &service).await;

        assert_eq!(detection.domain, Domain::Unknown);
        // 0.65 + 0.75 × 0.30 = 0.875 before rounding
        assert!((0.87..=0.88).contains(&detection.confidence));
    }

    #[tokio::test]
    async fn test_failure_and_malformed_answer_degrade_to_unknown() {
        let detection = detect_domain(DESCRIPTION, &Canned::failing()).await;
        assert_eq!(detection.domain, Domain::Unknown);
        assert_eq!(detection.confidence, 0.0);

        let detection = detect_domain(DESCRIPTION, &Canned::ok("fintech, probably")).await;
        assert_eq!(detection.domain, Domain::Unknown);
        assert_eq!(detection.confidence, 0.0);
    }
}

//! Sizing: the single batched external call that prices every subfeature lacking
//! trustworthy calibration.
//!
//! The response is decoded strictly into [`DecodedSizing`]: either a typed list of
//! per-item hours (each validated independently) or `Malformed` carrying the raw text.
//! Nothing here decides fallbacks; the engine does.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::calibration::store::CalibrationSummaryEntry;
use crate::estimation::models::Complexity;
use crate::estimation::prompts::{SIZING_PROMPT_TEMPLATE, SIZING_ROLE};
use crate::llm_client::prompts::json_system;
use crate::llm_client::{LlmError, TextCompletionService};

/// Whole-feature hour scale given to the model for orientation.
pub const FEATURE_SCALE_HOURS: &[(Complexity, f64)] = &[
    (Complexity::Low, 28.0),
    (Complexity::Medium, 72.0),
    (Complexity::High, 140.0),
];

/// A subfeature queued for external sizing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeferredItem {
    pub feature: String,
    pub subfeature: String,
    pub complexity: Complexity,
}

#[derive(Debug, Error)]
pub enum SizingError {
    #[error("completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to build sizing prompt: {0}")]
    Prompt(#[from] serde_json::Error),

    #[error("malformed sizing response: {0}")]
    Malformed(String),

    #[error("sizing returned {got} values for {expected} items")]
    LengthMismatch { expected: usize, got: usize },
}

/// Per-item hours in request order. `None` marks an entry that was not a positive number.
#[derive(Debug, Clone, PartialEq)]
pub struct SizingResponse {
    pub hours: Vec<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedSizing {
    Parsed(SizingResponse),
    Malformed(String),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizingPayload {
    Wrapped { hours: Vec<Value> },
    Bare(Vec<Value>),
}

/// Decodes the model's text into per-item hours.
pub fn decode_sizing(raw: &str) -> DecodedSizing {
    let values = match serde_json::from_str::<SizingPayload>(raw.trim()) {
        Ok(SizingPayload::Wrapped { hours }) | Ok(SizingPayload::Bare(hours)) => hours,
        Err(_) => return DecodedSizing::Malformed(raw.to_string()),
    };

    DecodedSizing::Parsed(SizingResponse {
        hours: values.iter().map(parse_hours).collect(),
    })
}

/// Accepts numbers and numeric strings; anything non-positive or non-finite is rejected.
fn parse_hours(value: &Value) -> Option<f64> {
    let hours = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    (hours.is_finite() && hours > 0.0).then_some(hours)
}

pub fn build_sizing_prompt(
    items: &[DeferredItem],
    description: &str,
    history: &[CalibrationSummaryEntry],
) -> Result<String, serde_json::Error> {
    let items_json = serde_json::to_string_pretty(items)?;
    let history_json = serde_json::to_string(history)?;
    let scale_json = serde_json::to_string(
        &FEATURE_SCALE_HOURS
            .iter()
            .map(|(c, h)| (c.as_str(), *h))
            .collect::<std::collections::BTreeMap<_, _>>(),
    )?;

    let description = if description.trim().is_empty() {
        "(not provided)"
    } else {
        description.trim()
    };

    // The free-text description goes in last so placeholder-like text inside it stays literal.
    Ok(SIZING_PROMPT_TEMPLATE
        .replace("{item_count}", &items.len().to_string())
        .replace("{scale_json}", &scale_json)
        .replace("{history_json}", &history_json)
        .replace("{items_json}", &items_json)
        .replace("{description}", description))
}

/// Issues one completion for the whole batch and returns per-item hours in request order.
///
/// Errors cover transport failure, timeout, undecodable output and a length mismatch;
/// per-item failures come back as `None` entries.
pub async fn request_sizing(
    service: &dyn TextCompletionService,
    items: &[DeferredItem],
    description: &str,
    history: &[CalibrationSummaryEntry],
    timeout: Duration,
) -> Result<Vec<Option<f64>>, SizingError> {
    let prompt = build_sizing_prompt(items, description, history)?;
    let system = json_system(SIZING_ROLE);

    let raw = tokio::time::timeout(timeout, service.complete(&prompt, &system))
        .await
        .map_err(|_| SizingError::Timeout(timeout))??;

    match decode_sizing(&raw) {
        DecodedSizing::Parsed(response) => {
            if response.hours.len() != items.len() {
                return Err(SizingError::LengthMismatch {
                    expected: items.len(),
                    got: response.hours.len(),
                });
            }
            Ok(response.hours)
        }
        DecodedSizing::Malformed(text) => {
            Err(SizingError::Malformed(text.chars().take(200).collect()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextCompletionService for Canned {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    fn items(n: usize) -> Vec<DeferredItem> {
        (0..n)
            .map(|i| DeferredItem {
                feature: "Auth".to_string(),
                subfeature: format!("Step {i}"),
                complexity: Complexity::Medium,
            })
            .collect()
    }

    #[test]
    fn test_decode_wrapped_and_bare() {
        assert_eq!(
            decode_sizing(r#"{"hours": [12, 20.5]}"#),
            DecodedSizing::Parsed(SizingResponse {
                hours: vec![Some(12.0), Some(20.5)]
            })
        );
        assert_eq!(
            decode_sizing("[8]"),
            DecodedSizing::Parsed(SizingResponse {
                hours: vec![Some(8.0)]
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_entries_individually() {
        let decoded = decode_sizing(r#"{"hours": [10, -4, 0, "6.5", "lots", null, {"h": 3}]}"#);
        assert_eq!(
            decoded,
            DecodedSizing::Parsed(SizingResponse {
                hours: vec![Some(10.0), None, None, Some(6.5), None, None, None]
            })
        );
    }

    #[test]
    fn test_decode_malformed_keeps_raw_text() {
        let decoded = decode_sizing("Sure! Here are the hours: 10, 20");
        assert_eq!(
            decoded,
            DecodedSizing::Malformed("Sure! Here are the hours: 10, 20".to_string())
        );
        assert!(matches!(
            decode_sizing(r#"{"estimates": [1]}"#),
            DecodedSizing::Malformed(_)
        ));
    }

    #[test]
    fn test_prompt_includes_items_history_and_count() {
        let history = vec![CalibrationSummaryEntry {
            feature: "oauthlogin".to_string(),
            avg_hours: 50.0,
            sample_size: 4,
        }];
        let prompt = build_sizing_prompt(&items(2), "A food delivery app", &history).unwrap();

        assert!(prompt.contains("A food delivery app"));
        assert!(prompt.contains("oauthlogin"));
        assert!(prompt.contains("Step 1"));
        assert!(prompt.contains("exactly 2 numbers"));
        assert!(prompt.contains("\"high\":140.0"));
    }

    #[test]
    fn test_prompt_with_blank_description() {
        let prompt = build_sizing_prompt(&items(1), "   ", &[]).unwrap();
        assert!(prompt.contains("(not provided)"));
    }

    #[test]
    fn test_prompt_keeps_placeholder_text_in_description() {
        let prompt =
            build_sizing_prompt(&items(1), "Admin panel {items_json} and {item_count}", &[])
                .unwrap();
        assert!(prompt.contains("Admin panel {items_json} and {item_count}"));
        assert!(prompt.contains("exactly 1 numbers"));
    }

    #[tokio::test]
    async fn test_request_sizing_returns_per_item_hours() {
        let service = Canned(r#"{"hours": [10, "x"]}"#);
        let hours = request_sizing(&service, &items(2), "", &[], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(hours, vec![Some(10.0), None]);
    }

    #[tokio::test]
    async fn test_request_sizing_length_mismatch_is_error() {
        let service = Canned(r#"{"hours": [10]}"#);
        let err = request_sizing(&service, &items(3), "", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SizingError::LengthMismatch {
                expected: 3,
                got: 1
            }
        ));
    }

    #[tokio::test]
    async fn test_request_sizing_malformed_is_error() {
        let service = Canned("not json at all");
        let err = request_sizing(&service, &items(1), "", &[], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, SizingError::Malformed(_)));
    }
}

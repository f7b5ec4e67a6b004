//! Feature structuring: turns a freeform description into normalized `FeatureSpec`s.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::estimation::models::{normalize_feature_specs, FeatureSpec};
use crate::llm_client::prompts::json_system;
use crate::llm_client::{LlmError, TextCompletionService};
use crate::pipeline::domain::MIN_DESCRIPTION_CHARS;
use crate::pipeline::prompts::{STRUCTURING_PROMPT_TEMPLATE, STRUCTURING_ROLE};

#[derive(Debug, Deserialize)]
struct StructuredFeatures {
    #[serde(default)]
    features: Vec<Value>,
}

/// Decodes `{"features": [...]}`. Entries that are not feature objects are skipped.
pub fn decode_features(raw: &str) -> Result<Vec<FeatureSpec>, serde_json::Error> {
    let structured: StructuredFeatures = serde_json::from_str(raw.trim())?;
    let total = structured.features.len();

    let specs: Vec<FeatureSpec> = structured
        .features
        .into_iter()
        .filter_map(|value| serde_json::from_value::<FeatureSpec>(value).ok())
        .collect();

    if specs.len() < total {
        warn!("Skipped {} undecodable feature entries", total - specs.len());
    }

    Ok(normalize_feature_specs(specs))
}

/// Errors only when the completion call fails or the answer is not the expected object.
pub async fn structure_features(
    description: &str,
    service: &dyn TextCompletionService,
) -> Result<Vec<FeatureSpec>, LlmError> {
    let description = description.trim();
    if description.chars().count() < MIN_DESCRIPTION_CHARS {
        return Ok(Vec::new());
    }

    let prompt = STRUCTURING_PROMPT_TEMPLATE.replace("{description}", description);
    let raw = service
        .complete(&prompt, &json_system(STRUCTURING_ROLE))
        .await?;

    let features = decode_features(&raw)?;
    info!("Structured description into {} features", features.len());
    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimation::models::Complexity;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl TextCompletionService for Canned {
        async fn complete(&self, _prompt: &str, _system: &str) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_decode_normalizes_specs() {
        let raw = r#"{"features": [
            {"name": "  User Authentication ", "complexity": "High",
             "subfeatures": [{"name": "OAuth Login"}, {"name": "  "}]},
            {"name": "", "complexity": "low"},
            {"name": "Search", "complexity": "extreme"},
            {"name": "Notifications"},
            "not a feature"
        ]}"#;

        let specs = decode_features(raw).unwrap();
        assert_eq!(specs.len(), 3);

        assert_eq!(specs[0].name, "User Authentication");
        assert_eq!(specs[0].complexity, Complexity::High);
        assert_eq!(specs[0].subfeatures.len(), 1);
        assert_eq!(specs[0].subfeatures[0].name, "OAuth Login");

        assert_eq!(specs[1].complexity, Complexity::Medium);
        assert_eq!(specs[2].complexity, Complexity::Medium);
        assert!(specs[2].subfeatures.is_empty());
    }

    #[test]
    fn test_decode_rejects_wrong_shape() {
        assert!(decode_features("[1, 2]").is_err());
        assert!(decode_features("here you go").is_err());
        assert!(decode_features("{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_structure_features_via_service() {
        let service = Canned(r#"{"features": [{"name": "Cart", "complexity": "low"}]}"#);
        let specs = structure_features("An online store with a cart and checkout", &service)
            .await
            .unwrap();
        assert_eq!(specs, vec![FeatureSpec::new("Cart", Complexity::Low)]);
    }

    #[tokio::test]
    async fn test_short_description_yields_no_features() {
        let service = Canned("not json");
        assert!(structure_features("shop", &service).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_answer_is_parse_error() {
        let service = Canned("Sure, here are the features: cart, checkout");
        let err = structure_features("An online store with a cart and checkout", &service)
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }
}

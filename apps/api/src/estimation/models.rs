use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Requested complexity of a feature. Missing or unrecognised values decode as `Medium`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl Complexity {
    /// Case-insensitive parse; anything unknown is `Medium`.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" => Complexity::Low,
            "high" => Complexity::High,
            _ => Complexity::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Complexity::Low => "low",
            Complexity::Medium => "medium",
            Complexity::High => "high",
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Complexity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<serde_json::Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(serde_json::Value::String(s)) => Complexity::from_label(&s),
            _ => Complexity::Medium,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubFeatureSpec {
    #[serde(default)]
    pub name: String,
}

/// A requested unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSpec {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub subfeatures: Vec<SubFeatureSpec>,
}

impl FeatureSpec {
    /// Trimmed subfeature names, or the parent name alone when none are usable.
    /// Every estimated feature therefore has at least one subfeature.
    pub fn effective_subfeatures(&self) -> Vec<String> {
        let names: Vec<String> = self
            .subfeatures
            .iter()
            .map(|s| s.name.trim())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            vec![self.name.trim().to_string()]
        } else {
            names
        }
    }

    /// True when the caller supplied at least one usable subfeature.
    pub fn has_explicit_subfeatures(&self) -> bool {
        self.subfeatures.iter().any(|s| !s.name.trim().is_empty())
    }
}

#[cfg(test)]
impl FeatureSpec {
    pub fn new(name: impl Into<String>, complexity: Complexity) -> Self {
        Self {
            name: name.into(),
            complexity,
            subfeatures: Vec::new(),
        }
    }

    pub fn with_subfeatures(mut self, names: &[&str]) -> Self {
        self.subfeatures = names
            .iter()
            .map(|n| SubFeatureSpec {
                name: n.to_string(),
            })
            .collect();
        self
    }
}

/// Drops specs with blank names and trims the rest. Never fails.
pub fn normalize_feature_specs(specs: Vec<FeatureSpec>) -> Vec<FeatureSpec> {
    specs
        .into_iter()
        .filter_map(|spec| {
            let name = spec.name.trim().to_string();
            if name.is_empty() {
                return None;
            }
            let subfeatures = spec
                .subfeatures
                .into_iter()
                .filter_map(|s| {
                    let n = s.name.trim().to_string();
                    (!n.is_empty()).then_some(SubFeatureSpec { name: n })
                })
                .collect();
            Some(FeatureSpec {
                name,
                complexity: spec.complexity,
                subfeatures,
            })
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedSubFeature {
    pub name: String,
    /// Buffered hours, rounded to one decimal.
    pub effort: f64,
    pub was_calibrated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimatedFeature {
    pub name: String,
    pub complexity: Complexity,
    /// Sum of subfeature efforts, rounded to one decimal.
    pub total_hours: f64,
    pub subfeatures: Vec<EstimatedSubFeature>,
    /// True if any subfeature was calibrated.
    pub was_calibrated: bool,
    /// Buffered calibrated hours for the parent name itself, when the parent matched
    /// trustworthy history. Informational: `total_hours` is never adjusted to it.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub parent_calibrated_hours: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EstimationResult {
    pub total_hours: f64,
    pub min_hours: f64,
    pub max_hours: f64,
    pub features: Vec<EstimatedFeature>,
}

impl EstimationResult {
    pub fn empty() -> Self {
        Self {
            total_hours: 0.0,
            min_hours: 0.0,
            max_hours: 0.0,
            features: Vec::new(),
        }
    }
}

// Estimation: turns feature specs into buffered hour estimates.
// All external sizing goes through a TextCompletionService; no direct API calls here.

pub mod engine;
pub mod models;
pub mod prompts;
pub mod sizing;

pub use engine::EstimationEngine;
pub use models::{EstimatedFeature, EstimationResult, FeatureSpec};

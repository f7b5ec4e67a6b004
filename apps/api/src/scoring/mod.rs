// Scoring: deterministic, side-effect-free scores computed from an estimate.

pub mod confidence;

pub use confidence::{compute_confidence, ConfidenceBreakdown, ConfidenceWeights};

use std::sync::Arc;

use crate::calibration::CalibrationStore;
use crate::config::Config;
use crate::estimation::EstimationEngine;
use crate::llm_client::TextCompletionService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Loaded once at startup, read-only afterwards.
    pub calibration: Arc<CalibrationStore>,
    /// `None` when no API key is configured; description-based estimates are then unavailable.
    pub completion: Option<Arc<dyn TextCompletionService>>,
    pub estimation: Arc<EstimationEngine>,
}

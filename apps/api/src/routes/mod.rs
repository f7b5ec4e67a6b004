pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::calibration::handlers as calibration;
use crate::pipeline::handlers as estimates;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/calibration",
            get(calibration::handle_get_calibration),
        )
        .route("/api/v1/estimates", post(estimates::handle_create_estimate))
        .route(
            "/api/v1/estimates/describe",
            post(estimates::handle_describe_estimate),
        )
        .with_state(state)
}

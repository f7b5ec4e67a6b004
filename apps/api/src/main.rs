mod calibration;
mod config;
mod errors;
mod estimation;
mod llm_client;
mod pipeline;
mod planning;
mod routes;
mod scoring;
mod state;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::calibration::loader::{CalibrationLoader, JsonCalibrationLoader};
use crate::calibration::CalibrationStore;
use crate::config::Config;
use crate::estimation::EstimationEngine;
use crate::llm_client::{LlmClient, TextCompletionService};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Estimator API v{}", env!("CARGO_PKG_VERSION"));

    // Calibration history: a missing or broken folder degrades to an empty store.
    let calibration = Arc::new(load_calibration(&JsonCalibrationLoader::new(
        config.calibration_dir.clone(),
    )));

    let completion: Option<Arc<dyn TextCompletionService>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone()).context("Failed to build LLM client")?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Some(Arc::new(llm))
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; sizing falls back to static hours");
            None
        }
    };

    let estimation = Arc::new(
        EstimationEngine::new(calibration.clone(), completion.clone())
            .with_sizing_timeout(config.sizing_timeout),
    );

    let state = AppState {
        config: config.clone(),
        calibration,
        completion,
        estimation,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn load_calibration(loader: &dyn CalibrationLoader) -> CalibrationStore {
    let mut store = CalibrationStore::new();
    match loader.load_all() {
        Ok(aggregated) => store.load(&aggregated),
        Err(e) => warn!("Calibration load failed, continuing with an empty store: {e:#}"),
    }
    if store.is_empty() {
        warn!("No calibration history loaded; every estimate will be uncalibrated");
    }
    store
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Absent ⇒ no completion service: static sizing, no description-based estimates.
    pub anthropic_api_key: Option<String>,
    pub port: u16,
    pub rust_log: String,
    pub calibration_dir: PathBuf,
    pub sizing_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let sizing_timeout_secs = lookup("SIZING_TIMEOUT_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse::<u64>()
            .context("SIZING_TIMEOUT_SECS must be a whole number of seconds")?;

        Ok(Config {
            anthropic_api_key: lookup("ANTHROPIC_API_KEY").filter(|k| !k.trim().is_empty()),
            port: lookup("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse::<u16>()
                .context("PORT must be a valid port number")?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            calibration_dir: lookup("CALIBRATION_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/calibration")),
            sizing_timeout: Duration::from_secs(sizing_timeout_secs),
        })
    }

    #[cfg(test)]
    pub fn for_tests() -> Self {
        Self::from_lookup(|_| None).unwrap()
    }
}

use adsync_common::error::{AdsyncError, AdsyncResult};
use serde::Deserialize;
use std::env;

/// Infrastructure-level configuration shared by every service binary.
/// Connector-specific settings (credentials, endpoints, retry budgets) are
/// loaded next to the client that consumes them.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    /// Loads `.env` file if present, then reads required vars.
    pub fn from_env() -> AdsyncResult<Self> {
        // Best-effort .env load; ignore if missing
        let _ = dotenvy::dotenv();

        Ok(Self {
            database_url: get_var("DATABASE_URL")?,
            log_level: get_var_or("LOG_LEVEL", "info"),
        })
    }
}

/// Read a required environment variable, failing with a named config error.
pub fn get_var(key: &str) -> AdsyncResult<String> {
    env::var(key).map_err(|_| AdsyncError::Config(format!("{key} is required but not set")))
}

/// Read an optional environment variable with a fallback default.
pub fn get_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_owned())
}

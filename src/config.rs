//! Runtime configuration (SPEC_FULL.md §3 Ambient: Configuration, §6).
//! Grounded on `Wolftown-io-canis/server/src/config.rs`'s `Config::from_env`
//! pattern: required vars fail loudly, optional ones fall back to a default.
//! Loaded once at startup from environment variables only — no files, no CLI
//! flags.

use base::format_err_t;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL DSN. Required; a missing value is a misconfiguration, not
    /// a transient condition (SPEC_FULL.md §9 Design Notes).
    pub database_url: String,
    /// Path to the object-detection model weights.
    pub model_path: String,
    /// Connection pool size. A worker processes one job at a time, so this
    /// doesn't need to be large.
    pub database_max_connections: u32,
    /// How long to sleep after finding no claimable job (§4.6 step 1).
    pub poll_interval_secs: u64,
    /// How long to sleep after an unexpected loop error (§4.6 step 11).
    pub error_backoff_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, base::Error> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| format_err_t!(Permanent, "DATABASE_URL must be set"))?;

        Ok(Config {
            database_url,
            model_path: env::var("MODEL_PATH").unwrap_or_else(|_| "yolov8n.pt".to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            poll_interval_secs: env::var("POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(5),
            error_backoff_secs: env::var("ERROR_BACKOFF_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(10),
        })
    }
}

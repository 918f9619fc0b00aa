use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub wg_email: String,
    pub wg_password: String,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    /// City name to search in, resolved to a city id at startup
    pub city: String,
    /// Maximum rent in euros
    pub max_rent: u32,
    /// Minimum room size in square meters
    pub min_size: u32,
    /// Maximum number of current flatmates
    pub max_flatmates: u32,
    /// Pause between search cycles
    pub poll_interval: Duration,
    pub ledger_path: PathBuf,
    pub session_path: PathBuf,
    /// Free text about the applicant, fed into message generation
    pub applicant_profile: Option<String>,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        // A profile file wins over the inline variable
        let applicant_profile = match env::var("APPLICANT_PROFILE_PATH") {
            Ok(path) => Some(
                std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read applicant profile from {}", path))?,
            ),
            Err(_) => env::var("APPLICANT_PROFILE").ok(),
        };

        Ok(Self {
            wg_email: env::var("WG_EMAIL").context("WG_EMAIL must be set")?,
            wg_password: env::var("WG_PASSWORD").context("WG_PASSWORD must be set")?,
            anthropic_api_key: env::var("ANTHROPIC_API_KEY").ok(),
            anthropic_model: env::var("ANTHROPIC_MODEL")
                .unwrap_or_else(|_| "claude-3-haiku-20240307".to_string()),
            city: env::var("WG_CITY").context("WG_CITY must be set")?,
            max_rent: env::var("WG_MAX_RENT")
                .unwrap_or_else(|_| "450".to_string())
                .parse()
                .context("WG_MAX_RENT must be a valid number")?,
            min_size: env::var("WG_MIN_SIZE")
                .unwrap_or_else(|_| "12".to_string())
                .parse()
                .context("WG_MIN_SIZE must be a valid number")?,
            max_flatmates: env::var("WG_MAX_FLATMATES")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("WG_MAX_FLATMATES must be a valid number")?,
            poll_interval: Duration::from_secs(
                env::var("POLL_INTERVAL_SECS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .context("POLL_INTERVAL_SECS must be a valid number")?,
            ),
            ledger_path: env::var("LEDGER_PATH")
                .unwrap_or_else(|_| "contacted_offers.json".to_string())
                .into(),
            session_path: env::var("SESSION_PATH")
                .unwrap_or_else(|_| "wg_session.json".to_string())
                .into(),
            applicant_profile,
        })
    }
}

//! Application configuration management

use std::env;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use url::Url;

use crate::services::LoaderSettings;
use crate::services::graphql::registry::DEFAULT_BATCH_DELAY;

/// Where the book and user domains live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendMode {
    /// Seeded in-process services
    Embedded,
    /// JSON-over-HTTP services at the configured URLs
    Remote,
}

impl BackendMode {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "embedded" => Ok(BackendMode::Embedded),
            "remote" => Ok(BackendMode::Remote),
            other => bail!("Invalid BACKEND_MODE '{}': expected 'embedded' or 'remote'", other),
        }
    }
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host (for generating URLs)
    pub host: Option<String>,

    /// Server port
    pub port: u16,

    pub backend_mode: BackendMode,

    /// Book service base URL (remote mode)
    pub book_service_url: String,

    /// User service base URL (remote mode)
    pub user_service_url: String,

    /// Deadline for every backend call
    pub rpc_timeout: Duration,

    /// Extra wait after a loader window settles before it dispatches
    pub loader_batch_delay: Duration,

    /// Default loan length when a borrow names no due date
    pub loan_period_days: i64,

    /// Daily late fine charged by the embedded book service
    pub fine_per_day: f64,

    /// Seed the embedded services with a sample catalogue
    pub seed_sample_data: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: 4000,
            backend_mode: BackendMode::Embedded,
            book_service_url: "http://localhost:9091".to_string(),
            user_service_url: "http://localhost:9092".to_string(),
            rpc_timeout: Duration::from_millis(5000),
            loader_batch_delay: DEFAULT_BATCH_DELAY,
            loan_period_days: 14,
            fine_per_day: 1.0,
            seed_sample_data: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let backend_mode = match lookup("BACKEND_MODE") {
            Some(mode) => BackendMode::parse(&mode)?,
            None => defaults.backend_mode,
        };

        let book_service_url = lookup("BOOK_SERVICE_URL").unwrap_or(defaults.book_service_url);
        Url::parse(&book_service_url)
            .with_context(|| format!("Invalid BOOK_SERVICE_URL: {}", book_service_url))?;

        let user_service_url = lookup("USER_SERVICE_URL").unwrap_or(defaults.user_service_url);
        Url::parse(&user_service_url)
            .with_context(|| format!("Invalid USER_SERVICE_URL: {}", user_service_url))?;

        let loan_period_days: i64 = lookup("LOAN_PERIOD_DAYS")
            .unwrap_or_else(|| defaults.loan_period_days.to_string())
            .parse()
            .context("Invalid LOAN_PERIOD_DAYS")?;
        if loan_period_days <= 0 {
            bail!("LOAN_PERIOD_DAYS must be positive, got {}", loan_period_days);
        }

        let fine_per_day: f64 = lookup("FINE_PER_DAY")
            .unwrap_or_else(|| defaults.fine_per_day.to_string())
            .parse()
            .context("Invalid FINE_PER_DAY")?;
        if !fine_per_day.is_finite() || fine_per_day < 0.0 {
            bail!("FINE_PER_DAY must be a non-negative number, got {}", fine_per_day);
        }

        Ok(Self {
            host: lookup("HOST"),

            port: lookup("PORT")
                .unwrap_or_else(|| defaults.port.to_string())
                .parse()
                .context("Invalid PORT")?,

            backend_mode,
            book_service_url,
            user_service_url,

            rpc_timeout: Duration::from_millis(
                lookup("RPC_TIMEOUT_MS")
                    .unwrap_or_else(|| "5000".to_string())
                    .parse()
                    .context("Invalid RPC_TIMEOUT_MS")?,
            ),

            loader_batch_delay: Duration::from_millis(
                lookup("LOADER_BATCH_DELAY_MS")
                    .unwrap_or_else(|| defaults.loader_batch_delay.as_millis().to_string())
                    .parse()
                    .context("Invalid LOADER_BATCH_DELAY_MS")?,
            ),

            loan_period_days,
            fine_per_day,

            seed_sample_data: lookup("SEED_SAMPLE_DATA")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.seed_sample_data),
        })
    }

    pub fn loader_settings(&self) -> LoaderSettings {
        LoaderSettings {
            batch_delay: self.loader_batch_delay,
        }
    }
}

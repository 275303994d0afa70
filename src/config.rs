//! Configuration module
//!
//! Loads configuration from environment variables.

use std::env;
use std::time::Duration;

use crate::ledger::{ProviderKind, ResilienceConfig};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Maximum database connections in pool
    pub database_max_connections: u32,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Environment (development, production)
    pub environment: String,

    /// Which external ledger provider to use
    pub ledger_provider: ProviderKind,

    /// Base URL of the ledger provider API
    pub ledger_base_url: String,

    /// API key for the ledger provider
    pub ledger_api_key: String,

    /// Per-request timeout for ledger calls
    pub ledger_timeout: Duration,

    /// Retry attempts per ledger operation
    pub ledger_max_attempts: u32,

    /// Base backoff between ledger retries, in milliseconds
    pub ledger_retry_backoff_ms: u64,

    /// Consecutive failures before the ledger circuit breaker opens
    pub ledger_breaker_threshold: u32,

    /// Seconds the breaker stays open before probing again
    pub ledger_breaker_reset_secs: u64,

    /// Seconds between reconciliation sweep runs
    pub reconciliation_interval_secs: u64,

    /// Reload-and-reapply attempts when persisting balances after an
    /// external call succeeded
    pub persist_attempts: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnv("DATABASE_URL"))?;

        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", "10")?;

        let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_or("PORT", "3000")?;
        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        let ledger_provider = env::var("LEDGER_PROVIDER")
            .unwrap_or_else(|_| "atlas".to_string())
            .parse()
            .map_err(|_| ConfigError::InvalidValue("LEDGER_PROVIDER"))?;

        let ledger_base_url = env::var("LEDGER_BASE_URL")
            .map_err(|_| ConfigError::MissingEnv("LEDGER_BASE_URL"))?;

        let ledger_api_key = env::var("LEDGER_API_KEY")
            .map_err(|_| ConfigError::MissingEnv("LEDGER_API_KEY"))?;

        let ledger_timeout = Duration::from_secs(parse_or("LEDGER_TIMEOUT_SECS", "30")?);

        let ledger_max_attempts = parse_or("LEDGER_MAX_ATTEMPTS", "3")?;
        let ledger_retry_backoff_ms = parse_or("LEDGER_RETRY_BACKOFF_MS", "200")?;
        let ledger_breaker_threshold = parse_or("LEDGER_BREAKER_THRESHOLD", "5")?;
        let ledger_breaker_reset_secs = parse_or("LEDGER_BREAKER_RESET_SECS", "60")?;

        let reconciliation_interval_secs = parse_or("RECONCILIATION_INTERVAL_SECS", "300")?;
        let persist_attempts = parse_or("PERSIST_ATTEMPTS", "3")?;

        Ok(Self {
            database_url,
            database_max_connections,
            host,
            port,
            environment,
            ledger_provider,
            ledger_base_url,
            ledger_api_key,
            ledger_timeout,
            ledger_max_attempts,
            ledger_retry_backoff_ms,
            ledger_breaker_threshold,
            ledger_breaker_reset_secs,
            reconciliation_interval_secs,
            persist_attempts,
        })
    }

    /// Retry/breaker parameters for the ledger client.
    pub fn resilience(&self) -> ResilienceConfig {
        ResilienceConfig {
            max_attempts: self.ledger_max_attempts,
            retry_backoff: Duration::from_millis(self.ledger_retry_backoff_ms),
            breaker_failure_threshold: self.ledger_breaker_threshold,
            breaker_reset: Duration::from_secs(self.ledger_breaker_reset_secs),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError> {
    env::var(key)
        .unwrap_or_else(|_| default.to_string())
        .parse()
        .map_err(|_| ConfigError::InvalidValue(key))
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnv(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(&'static str),
}

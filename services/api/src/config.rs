//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub stats_cache_ttl: Duration,
    pub cors_origin: String,
    pub auth_session_days: i64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address = parse_or(&lookup, "BIND_ADDRESS", "0.0.0.0:3000")?;

        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let db_max_connections = parse_or(&lookup, "DB_MAX_CONNECTIONS", "5")?;
        let db_acquire_timeout =
            Duration::from_secs(parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", "5")?);

        // --- Caching, CORS and Auth ---
        let stats_cache_ttl =
            Duration::from_secs(parse_or(&lookup, "STATS_CACHE_TTL_SECS", "60")?);
        let cors_origin =
            lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());
        let auth_session_days: i64 = parse_or(&lookup, "AUTH_SESSION_DAYS", "30")?;
        if auth_session_days <= 0 {
            return Err(ConfigError::InvalidValue(
                "AUTH_SESSION_DAYS".to_string(),
                "must be a positive number of days".to_string(),
            ));
        }

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            db_max_connections,
            db_acquire_timeout,
            stats_cache_ttl,
            cors_origin,
            auth_session_days,
        })
    }
}

/// Parses `key` from the lookup, falling back to `default` when unset.
fn parse_or<F, T>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))
}

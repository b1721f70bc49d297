//! Centralized configuration for the grant store.
//!
//! All configuration is loaded from environment variables (optionally via a
//! `.env` file) and validated at startup.

use std::env;
use std::time::Duration;

use rust_common::TracingConfig;

use crate::error::StoreError;
use crate::keys::KeyNamespace;
use crate::store::DEFAULT_OP_TIMEOUT;

/// Grant store configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Redis connection URL
    pub redis_url: String,
    /// Namespace prefix for every key
    pub key_prefix: String,
    /// Timeout applied to store operations without a caller deadline
    pub op_timeout: Duration,
    /// Lifetime of access tokens issued from the CLI
    pub access_token_ttl: Duration,
    /// Lifetime of refresh tokens issued from the CLI
    pub refresh_token_ttl: Duration,
    /// Log level filter
    pub log_level: String,
    /// Emit JSON logs
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: "myToken".to_string(),
            op_timeout: DEFAULT_OP_TIMEOUT,
            access_token_ttl: Duration::from_secs(2 * 3600),
            refresh_token_ttl: Duration::from_secs(24 * 3600),
            log_level: "info".to_string(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a variable is present but invalid.
    pub fn from_env() -> Result<Self, StoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its
    /// value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if a value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let redis_url = lookup("REDIS_URL").unwrap_or(defaults.redis_url);
        let key_prefix = lookup("TOKEN_KEY_PREFIX").unwrap_or(defaults.key_prefix);
        let op_timeout = Duration::from_millis(parse_var(
            &lookup,
            "STORE_OP_TIMEOUT_MS",
            3000_u64,
        )?);
        let access_token_ttl =
            Duration::from_secs(parse_var(&lookup, "ACCESS_TOKEN_TTL", 7200_u64)?);
        let refresh_token_ttl =
            Duration::from_secs(parse_var(&lookup, "REFRESH_TOKEN_TTL", 86_400_u64)?);
        let log_level = lookup("LOG_LEVEL").unwrap_or(defaults.log_level);
        let log_json = parse_var(&lookup, "LOG_JSON", false)?;

        if op_timeout.is_zero() {
            return Err(StoreError::config("STORE_OP_TIMEOUT_MS must be positive"));
        }
        if access_token_ttl.is_zero() {
            return Err(StoreError::config("ACCESS_TOKEN_TTL must be positive"));
        }
        if key_prefix.contains(char::is_whitespace) {
            return Err(StoreError::config("TOKEN_KEY_PREFIX must not contain whitespace"));
        }

        Ok(Self {
            redis_url,
            key_prefix,
            op_timeout,
            access_token_ttl,
            refresh_token_ttl,
            log_level,
            log_json,
        })
    }

    /// Key namespace for this configuration.
    #[must_use]
    pub fn namespace(&self) -> KeyNamespace {
        KeyNamespace::new(self.key_prefix.clone())
    }

    /// Tracing setup for this configuration.
    #[must_use]
    pub fn tracing(&self) -> TracingConfig {
        TracingConfig::default()
            .with_service_name("grant-store")
            .with_log_level(self.log_level.clone())
            .with_json_output(self.log_json)
    }
}

/// Parse a variable with a default value.
fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, StoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(val) => val
            .trim()
            .parse()
            .map_err(|e| StoreError::config(format!("Invalid {name}: {e}"))),
        None => Ok(default),
    }
}

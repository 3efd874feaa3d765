//! NebulaBridge API configuration.
//!
//! Configuration is loaded from environment variables. The user pool id is
//! required; everything else has a default.

use auth_core::jwks::{KeyStoreConfig, MAX_FETCH_TIMEOUT};
use auth_core::IssuerConfig;
use axum::http::HeaderValue;
use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default server bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default Cognito region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Default JWKS cache TTL in seconds.
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 3600;

/// Default JWKS request timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default minimum seconds between forced JWKS refreshes.
pub const DEFAULT_JWKS_MIN_REFRESH_SECONDS: u64 = 30;

/// Default graceful shutdown drain period in seconds.
pub const DEFAULT_DRAIN_SECONDS: u64 = 30;

/// NebulaBridge API configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// User pool region, pool id and expected app client id.
    pub issuer: IssuerConfig,

    /// How long a fetched JWKS is cached, in seconds.
    pub jwks_cache_ttl_seconds: u64,

    /// Timeout for the JWKS request, in seconds (1-30).
    pub jwks_fetch_timeout_seconds: u64,

    /// Minimum seconds between forced refreshes for unknown key ids.
    pub jwks_min_refresh_seconds: u64,

    /// Provider base URL replacing the regional Cognito host.
    pub jwks_provider_url: Option<String>,

    /// Value for `Access-Control-Allow-Origin` ("*" allows any origin).
    pub cors_allowed_origin: String,

    /// Seconds to keep draining connections after a shutdown signal.
    pub drain_seconds: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid Cognito configuration: {0}")]
    InvalidIssuer(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid JWKS fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),

    #[error("Invalid JWKS refresh interval configuration: {0}")]
    InvalidMinRefresh(String),

    #[error("Invalid CORS origin configuration: {0}")]
    InvalidCorsOrigin(String),

    #[error("Invalid drain period configuration: {0}")]
    InvalidDrainSeconds(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());

        let region = vars
            .get("COGNITO_REGION")
            .cloned()
            .unwrap_or_else(|| DEFAULT_REGION.to_string());

        let user_pool_id = vars
            .get("COGNITO_USER_POOL_ID")
            .ok_or_else(|| ConfigError::MissingEnvVar("COGNITO_USER_POOL_ID".to_string()))?
            .clone();

        let client_id = vars.get("COGNITO_CLIENT_ID").cloned();

        let issuer = IssuerConfig::new(region, user_pool_id, client_id)
            .map_err(|e| ConfigError::InvalidIssuer(e.to_string()))?;

        let jwks_cache_ttl_seconds = if let Some(value_str) = vars.get("JWKS_CACHE_TTL_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidCacheTtl(format!(
                    "JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                ))
            })?;

            if value == 0 {
                return Err(ConfigError::InvalidCacheTtl(
                    "JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                ));
            }

            value
        } else {
            DEFAULT_JWKS_CACHE_TTL_SECONDS
        };

        let jwks_fetch_timeout_seconds =
            if let Some(value_str) = vars.get("JWKS_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{value_str}': {e}"
                    ))
                })?;

                if value == 0 || value > MAX_FETCH_TIMEOUT.as_secs() {
                    return Err(ConfigError::InvalidFetchTimeout(format!(
                        "JWKS_FETCH_TIMEOUT_SECONDS must be between 1 and {}, got {value}",
                        MAX_FETCH_TIMEOUT.as_secs()
                    )));
                }

                value
            } else {
                DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS
            };

        let jwks_min_refresh_seconds =
            if let Some(value_str) = vars.get("JWKS_MIN_REFRESH_SECONDS") {
                value_str.parse().map_err(|e| {
                    ConfigError::InvalidMinRefresh(format!(
                        "JWKS_MIN_REFRESH_SECONDS must be a valid non-negative integer, got '{value_str}': {e}"
                    ))
                })?
            } else {
                DEFAULT_JWKS_MIN_REFRESH_SECONDS
            };

        let jwks_provider_url = vars
            .get("JWKS_PROVIDER_URL")
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());

        let cors_allowed_origin = vars
            .get("CORS_ALLOWED_ORIGIN")
            .cloned()
            .unwrap_or_else(|| "*".to_string());

        if HeaderValue::from_str(&cors_allowed_origin).is_err() {
            return Err(ConfigError::InvalidCorsOrigin(format!(
                "CORS_ALLOWED_ORIGIN is not a valid header value: '{cors_allowed_origin}'"
            )));
        }

        let drain_seconds = if let Some(value_str) = vars.get("DRAIN_SECONDS") {
            value_str.parse().map_err(|e| {
                ConfigError::InvalidDrainSeconds(format!(
                    "DRAIN_SECONDS must be a valid non-negative integer, got '{value_str}': {e}"
                ))
            })?
        } else {
            DEFAULT_DRAIN_SECONDS
        };

        Ok(Config {
            bind_address,
            issuer,
            jwks_cache_ttl_seconds,
            jwks_fetch_timeout_seconds,
            jwks_min_refresh_seconds,
            jwks_provider_url,
            cors_allowed_origin,
            drain_seconds,
        })
    }

    /// Key store settings derived from this configuration.
    pub fn key_store_config(&self) -> KeyStoreConfig {
        KeyStoreConfig {
            ttl: Duration::from_secs(self.jwks_cache_ttl_seconds),
            fetch_timeout: Duration::from_secs(self.jwks_fetch_timeout_seconds),
            min_refresh_interval: Duration::from_secs(self.jwks_min_refresh_seconds),
            provider_base_url: self.jwks_provider_url.clone(),
        }
    }
}

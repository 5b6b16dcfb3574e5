// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
//! Server configuration, read from the environment at startup.
//!
//! A `.env` file in the working directory is honoured outside of tests.
use std::net::SocketAddr;

pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
pub const DEFAULT_DATABASE_URL: &str = "sqlite://database/punchclock.db";
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    /// Path every route is mounted under, e.g. `/acme/punchclock`.
    pub api_prefix: Option<String>,
    pub log_filter: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string()))?;

        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let api_prefix = match lookup("API_PREFIX").filter(|p| !p.is_empty()) {
            None => None,
            Some(prefix) if prefix.starts_with('/') && !prefix.ends_with('/') => Some(prefix),
            Some(prefix) => {
                return Err(ConfigError::InvalidValue(
                    "API_PREFIX".to_string(),
                    format!("'{}' must start with '/' and must not end with '/'", prefix),
                ));
            }
        };

        let log_filter = lookup("RUST_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
        tracing_subscriber::EnvFilter::try_new(&log_filter)
            .map_err(|e| ConfigError::InvalidValue("RUST_LOG".to_string(), e.to_string()))?;

        Ok(Self {
            bind_address,
            database_url,
            api_prefix,
            log_filter,
        })
    }
}

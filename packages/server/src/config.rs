use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::domains::auth::AuthFlow;
use crate::kernel::{DEFAULT_IDENTITY_BASE_URL, DEFAULT_SCAN_TIMEOUT};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub identity_api_key: String,
    pub identity_base_url: String,
    pub auth_flow: AuthFlow,
    pub device_scan_timeout: Duration,
    /// Where the device-side client persists its fingerprint
    pub device_id_path: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            database_url: var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: var("PORT")
                .unwrap_or_else(|| "8080".to_string())
                .parse()
                .context("PORT must be a valid number")?,
            identity_api_key: var("IDENTITY_API_KEY").context("IDENTITY_API_KEY must be set")?,
            identity_base_url: var("IDENTITY_BASE_URL")
                .unwrap_or_else(|| DEFAULT_IDENTITY_BASE_URL.to_string()),
            auth_flow: match var("AUTH_FLOW") {
                Some(flow) => flow
                    .parse()
                    .map_err(anyhow::Error::msg)
                    .context("AUTH_FLOW must be 'registry' or 'session'")?,
                None => AuthFlow::default(),
            },
            device_scan_timeout: match var("DEVICE_SCAN_TIMEOUT_MS") {
                Some(ms) => Duration::from_millis(
                    ms.parse()
                        .context("DEVICE_SCAN_TIMEOUT_MS must be a number of milliseconds")?,
                ),
                None => DEFAULT_SCAN_TIMEOUT,
            },
            device_id_path: var("DEVICE_ID_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".device-id")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("IDENTITY_API_KEY", "key"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.auth_flow, AuthFlow::Session);
        assert_eq!(config.device_scan_timeout, Duration::from_secs(5));
        assert_eq!(config.identity_base_url, DEFAULT_IDENTITY_BASE_URL);
        assert_eq!(config.device_id_path, PathBuf::from(".device-id"));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("IDENTITY_API_KEY", "key"),
            ("PORT", "9000"),
            ("AUTH_FLOW", "registry"),
            ("DEVICE_SCAN_TIMEOUT_MS", "250"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.auth_flow, AuthFlow::Registry);
        assert_eq!(config.device_scan_timeout, Duration::from_millis(250));
    }

    #[test]
    fn test_missing_and_invalid_values() {
        assert!(Config::from_lookup(lookup(&[("IDENTITY_API_KEY", "key")])).is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("IDENTITY_API_KEY", "key"),
            ("AUTH_FLOW", "both"),
        ]))
        .is_err());
        assert!(Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://localhost/auth"),
            ("IDENTITY_API_KEY", "key"),
            ("DEVICE_SCAN_TIMEOUT_MS", "soon"),
        ]))
        .is_err());
    }
}

//! Orchestrator configuration
//!
//! Loaded from environment variables (a `.env` file is honored when
//! present). Every knob has a default tuned for the public attestation
//! service; hosts embedding the library can also construct the struct
//! directly.

use eyre::{eyre, Result};
use serde::Deserialize;
use std::env;
use std::path::Path;
use std::time::Duration;

use crate::attestation::IRIS_API_MAINNET;

/// Tunables for the transfer state machine
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Base URL of the attestation service
    #[serde(default = "default_attestation_api_url")]
    pub attestation_api_url: String,
    /// Interval between attestation polls
    #[serde(default = "default_attestation_poll_interval_ms")]
    pub attestation_poll_interval_ms: u64,
    /// Attempt budget for one attestation wait (exhaustion is a timeout,
    /// not an error: the record survives and the claim can be retried)
    #[serde(default = "default_attestation_max_attempts")]
    pub attestation_max_attempts: u32,
    /// How many times to poll the adapter's reported chain id after a
    /// network-switch request before giving up
    #[serde(default = "default_switch_verify_attempts")]
    pub switch_verify_attempts: u32,
    /// Delay between chain-id verification polls
    #[serde(default = "default_switch_verify_delay_ms")]
    pub switch_verify_delay_ms: u64,
    /// Per-request timeout for the attestation HTTP client
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_attestation_api_url() -> String {
    IRIS_API_MAINNET.to_string()
}

fn default_attestation_poll_interval_ms() -> u64 {
    2000
}

fn default_attestation_max_attempts() -> u32 {
    150
}

fn default_switch_verify_attempts() -> u32 {
    10
}

fn default_switch_verify_delay_ms() -> u64 {
    500
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            attestation_api_url: default_attestation_api_url(),
            attestation_poll_interval_ms: default_attestation_poll_interval_ms(),
            attestation_max_attempts: default_attestation_max_attempts(),
            switch_verify_attempts: default_switch_verify_attempts(),
            switch_verify_delay_ms: default_switch_verify_delay_ms(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from the environment, honoring a `.env` file
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env").or_else(|_| Self::from_env())
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .map_err(|e| eyre!("Failed to load .env file from {}: {}", path, e))?;
        }
        Self::from_env()
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config = Self {
            attestation_api_url: env::var("ATTESTATION_API_URL")
                .unwrap_or_else(|_| default_attestation_api_url()),
            attestation_poll_interval_ms: env::var("ATTESTATION_POLL_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_attestation_poll_interval_ms),
            attestation_max_attempts: env::var("ATTESTATION_MAX_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_attestation_max_attempts),
            switch_verify_attempts: env::var("SWITCH_VERIFY_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_switch_verify_attempts),
            switch_verify_delay_ms: env::var("SWITCH_VERIFY_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_switch_verify_delay_ms),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_http_timeout_secs),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.attestation_api_url)
            .map_err(|e| eyre!("attestation_api_url is not a valid URL: {}", e))?;

        if self.attestation_poll_interval_ms == 0 {
            return Err(eyre!("attestation_poll_interval_ms must be greater than zero"));
        }

        if self.attestation_max_attempts == 0 {
            return Err(eyre!("attestation_max_attempts must be greater than zero"));
        }

        if self.switch_verify_attempts == 0 {
            return Err(eyre!("switch_verify_attempts must be greater than zero"));
        }

        if self.http_timeout_secs == 0 {
            return Err(eyre!("http_timeout_secs must be greater than zero"));
        }

        Ok(())
    }

    /// Interval between attestation polls
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.attestation_poll_interval_ms)
    }

    /// Delay between chain-id verification polls
    pub fn switch_verify_delay(&self) -> Duration {
        Duration::from_millis(self.switch_verify_delay_ms)
    }

    /// Per-request timeout for the attestation HTTP client
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.attestation_poll_interval_ms, 2000);
        assert_eq!(config.attestation_max_attempts, 150);
        assert_eq!(config.switch_verify_attempts, 10);
        assert_eq!(config.switch_verify_delay_ms, 500);
        // 150 attempts at 2s keep the bounded wait at ~5 minutes
        assert_eq!(
            config.poll_interval().as_secs() * config.attestation_max_attempts as u64,
            300
        );
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(OrchestratorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = OrchestratorConfig {
            attestation_api_url: "not a url".to_string(),
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_bounds() {
        let config = OrchestratorConfig {
            attestation_max_attempts: 0,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());

        let config = OrchestratorConfig {
            attestation_poll_interval_ms: 0,
            ..OrchestratorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

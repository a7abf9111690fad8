//! # Configuration Management
//!
//! Plain configuration structure for the gateway pipeline. Loaded from YAML
//! or built in code, validated once at pipeline construction — a bad value
//! is rejected before any request is processed.
//!
//! Durations are declared with `humantime_serde`, so YAML can say `1s`,
//! `500ms` or `5m` instead of raw integers.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{GatewayError, GatewayResult};

/// How backend latency is applied during an invocation
///
/// `Wall` sleeps for the drawn duration, modelling real network/compute
/// time. `Recorded` skips the sleep and only reports the drawn value on the
/// response, which is what test suites want for deterministic runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LatencyMode {
    #[default]
    Wall,
    Recorded,
}

/// Gateway pipeline configuration
///
/// Each stage can be toggled independently; disabled stages are still
/// audited as skipped. Defaults mirror a small demo deployment: 10 requests
/// per second per client, 5 minute cache TTL, lambda integration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Whether the authentication stage is enabled
    pub auth_enabled: bool,

    /// Whether the rate limiting stage is enabled
    pub throttle_enabled: bool,

    /// Whether response caching is enabled (lookup and write-back)
    pub caching_enabled: bool,

    /// Maximum admissions per client key within one window
    pub rate_limit_capacity: u32,

    /// Duration of the fixed rate limiting window
    #[serde(with = "humantime_serde")]
    pub rate_limit_window: Duration,

    /// Time-to-live for cached responses
    #[serde(with = "humantime_serde")]
    pub cache_ttl: Duration,

    /// Name of the backend integration profile to dispatch to
    pub integration: String,

    /// Overall per-request deadline; an in-flight backend call past this is
    /// cancelled and surfaced as a `Timeout`
    #[serde(with = "humantime_serde")]
    pub per_request_timeout: Duration,

    /// Minimum credential length accepted by the built-in validator
    pub min_credential_length: usize,

    /// How many completed requests the observability history retains
    pub history_capacity: usize,

    /// Whether backend latency is slept or only recorded
    pub latency_mode: LatencyMode,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            auth_enabled: true,
            throttle_enabled: true,
            caching_enabled: true,
            rate_limit_capacity: 10,
            rate_limit_window: Duration::from_millis(1000),
            cache_ttl: Duration::from_secs(300),
            integration: "lambda".to_string(),
            per_request_timeout: Duration::from_secs(30),
            min_credential_length: 10,
            history_capacity: 100,
            latency_mode: LatencyMode::Wall,
        }
    }
}

impl GatewayConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> GatewayResult<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            GatewayError::config(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(content: &str) -> GatewayResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| GatewayError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, failing fast on values that would make
    /// the pipeline misbehave at runtime
    pub fn validate(&self) -> GatewayResult<()> {
        if self.rate_limit_capacity == 0 {
            return Err(GatewayError::config(
                "rate_limit_capacity must be greater than zero",
            ));
        }
        if self.rate_limit_window.is_zero() {
            return Err(GatewayError::config(
                "rate_limit_window must be greater than zero",
            ));
        }
        if self.cache_ttl.is_zero() {
            return Err(GatewayError::config("cache_ttl must be greater than zero"));
        }
        if self.per_request_timeout.is_zero() {
            return Err(GatewayError::config(
                "per_request_timeout must be greater than zero",
            ));
        }
        if self.integration.is_empty() {
            return Err(GatewayError::config("integration must not be empty"));
        }
        if self.history_capacity == 0 {
            return Err(GatewayError::config(
                "history_capacity must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = GatewayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.rate_limit_capacity, 10);
        assert_eq!(config.rate_limit_window, Duration::from_millis(1000));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.integration, "lambda");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = GatewayConfig {
            rate_limit_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), "Configuration");
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = GatewayConfig {
            rate_limit_window: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_round_trip_with_humantime() {
        let yaml = r#"
auth_enabled: false
throttle_enabled: true
rate_limit_capacity: 25
rate_limit_window: 1s
cache_ttl: 5m
integration: mock
per_request_timeout: 750ms
latency_mode: recorded
"#;
        let config = GatewayConfig::from_yaml(yaml).unwrap();
        assert!(!config.auth_enabled);
        assert_eq!(config.rate_limit_capacity, 25);
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert_eq!(config.per_request_timeout, Duration::from_millis(750));
        assert_eq!(config.integration, "mock");
        assert_eq!(config.latency_mode, LatencyMode::Recorded);
    }

    #[test]
    fn test_invalid_yaml_is_config_error() {
        let err = GatewayConfig::from_yaml("rate_limit_capacity: not-a-number").unwrap_err();
        assert_eq!(err.kind(), "Configuration");
    }
}

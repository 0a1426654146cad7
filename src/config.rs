//! Monitor configuration, sourced from the environment
//!
//! Environment variables:
//! - BOUNTY_HEALTH_API_URL: Base URL of the API to monitor (default: http://localhost:3000)
//! - BOUNTY_HEALTH_POLL_INTERVAL_MS: Milliseconds between check cycles (default: 60000)
//! - BOUNTY_HEALTH_HOST: Bind address (default: 0.0.0.0)
//! - BOUNTY_HEALTH_PORT: Port number (default: 3100)
//! - BOUNTY_HEALTH_HISTORY_FILE: Path of the persisted history (default: ./data/health-history.json)
//! - BOUNTY_HEALTH_WEBHOOK_URL: Alert webhook (optional)
//! - BOUNTY_HEALTH_ENDPOINTS: Comma-separated endpoint paths to probe

use std::path::PathBuf;
use std::time::Duration;

use crate::alerts::gate::{DEFAULT_COOLDOWN_SECS, DEFAULT_SLOW_THRESHOLD_MS};
use crate::probe::DEFAULT_PROBE_TIMEOUT;

pub const ENV_PREFIX: &str = "BOUNTY_HEALTH_";

/// Endpoints probed when none are configured: list, stats, single item
pub const DEFAULT_ENDPOINTS: [&str; 3] = ["/api/bounties", "/api/stats", "/api/bounties/1"];

#[derive(Debug, Clone)]
pub struct MonitorConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub host: String,
    pub port: u16,
    pub history_file: PathBuf,
    pub webhook_url: Option<String>,
    pub endpoints: Vec<String>,
    pub probe_timeout: Duration,
    pub slow_threshold_ms: u64,
    pub alert_cooldown: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            poll_interval: Duration::from_millis(60_000),
            host: "0.0.0.0".to_string(),
            port: 3100,
            history_file: PathBuf::from("./data/health-history.json"),
            webhook_url: None,
            endpoints: DEFAULT_ENDPOINTS.iter().map(|e| e.to_string()).collect(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            alert_cooldown: Duration::from_secs(DEFAULT_COOLDOWN_SECS as u64),
        }
    }
}

impl MonitorConfig {
    /// Read configuration from process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Unparseable values
    /// fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|v| !v.trim().is_empty())
        };
        let defaults = Self::default();

        let endpoints = var("ENDPOINTS")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(|s| {
                        if s.starts_with('/') {
                            s.to_string()
                        } else {
                            format!("/{}", s)
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or(defaults.endpoints);

        Self {
            base_url: var("API_URL").unwrap_or(defaults.base_url),
            poll_interval: var("POLL_INTERVAL_MS")
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.poll_interval),
            host: var("HOST").unwrap_or(defaults.host),
            port: var("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            history_file: var("HISTORY_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.history_file),
            webhook_url: var("WEBHOOK_URL"),
            endpoints,
            ..defaults
        }
    }

    /// Reject settings the monitor cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl(format!(
                "{}: unsupported scheme",
                self.base_url
            )));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }

        if self.endpoints.is_empty() {
            return Err(ConfigError::NoEndpoints);
        }

        if let Some(webhook) = &self.webhook_url {
            reqwest::Url::parse(webhook)
                .map_err(|e| ConfigError::InvalidWebhookUrl(format!("{}: {}", webhook, e)))?;
        }

        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error("Invalid webhook URL: {0}")]
    InvalidWebhookUrl(String),

    #[error("Poll interval must be greater than zero")]
    ZeroInterval,

    #[error("At least one endpoint must be configured")]
    NoEndpoints,
}

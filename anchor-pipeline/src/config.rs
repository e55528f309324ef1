//! Pipeline and daemon configuration
//!
//! The operating profile is part of the configuration on purpose:
//! simulation mode is a development convenience and a production profile
//! with absent ledger credentials must fail at startup, never silently
//! simulate.

use ledger_gateway::GatewayConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Operating profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Local development; simulation mode allowed
    Development,
    /// Production; ledger credentials required
    Production,
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Development
    }
}

/// Bounded retry with exponential backoff for transient submission errors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum submission attempts per item
    pub max_attempts: u32,

    /// First backoff (milliseconds)
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 2_000,
        }
    }
}

impl RetryConfig {
    /// Backoff before the given attempt (1-based): initial * 2^(n-1), capped
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }
}

/// Reconciliation job settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Fixed delay between items, to avoid resaturating the log (ms)
    pub inter_item_delay_ms: u64,

    /// Maximum unverified rows scanned per run
    pub scan_limit: usize,

    /// Daemon loop interval (seconds)
    pub interval_secs: u64,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            inter_item_delay_ms: 500,
            scan_limit: 100,
            interval_secs: 3_600,
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DaemonConfig {
    /// Operating profile
    pub profile: Profile,

    /// Anchoring core (store, rate limit, batching)
    pub core: anchor_core::Config,

    /// Ledger gateway (network, operator, mirror, fees)
    pub gateway: GatewayConfig,

    /// Submission retry policy
    pub retry: RetryConfig,

    /// Reconciliation cadence
    pub reconcile: ReconcileConfig,
}

impl DaemonConfig {
    /// Startup invariant check
    ///
    /// A production profile must carry ledger credentials; simulation mode
    /// is unreachable there.
    pub fn validate(&self) -> crate::Result<()> {
        if self.profile == Profile::Production && self.gateway.is_simulation() {
            return Err(crate::Error::Config(
                "production profile requires ledger operator credentials; \
                 simulation mode is not allowed"
                    .to_string(),
            ));
        }
        if self.core.topic_id.is_empty() {
            return Err(crate::Error::Config("topic_id must be set".to_string()));
        }
        Ok(())
    }

    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::Error::Config(format!("read config: {}", e)))?;
        toml::from_str(&content).map_err(|e| crate::Error::Config(format!("parse config: {}", e)))
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = DaemonConfig {
            core: anchor_core::Config::from_env()?,
            gateway: GatewayConfig::from_env()?,
            ..Default::default()
        };

        if let Ok(profile) = std::env::var("ANCHOR_PROFILE") {
            config.profile = match profile.as_str() {
                "development" => Profile::Development,
                "production" => Profile::Production,
                other => {
                    return Err(crate::Error::Config(format!("unknown profile: {}", other)))
                }
            };
        }

        Ok(config)
    }
}

//! Configuration for the anchoring core

use crate::batch::BatchConfig;
use crate::rate_limit::RateLimitConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Core configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Consensus topic all anchors go to
    pub topic_id: String,

    /// RocksDB tuning
    pub rocksdb: RocksDbConfig,

    /// Rate limiter
    pub rate_limit: RateLimitConfig,

    /// Batch aggregation
    pub batching: BatchConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/anchor"),
            service_name: "anchor-core".to_string(),
            topic_id: "0.0.5005".to_string(),
            rocksdb: RocksDbConfig::default(),
            rate_limit: RateLimitConfig::default(),
            batching: BatchConfig::default(),
        }
    }
}

/// RocksDB tuning knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_background_jobs: 2,
        }
    }
}

impl Config {
    /// Load from a TOML file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(dir) = std::env::var("ANCHOR_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(topic) = std::env::var("ANCHOR_TOPIC_ID") {
            config.topic_id = topic;
        }
        if let Ok(tps) = std::env::var("ANCHOR_MAX_TPS") {
            config.rate_limit.max_tps = tps
                .parse()
                .map_err(|e| crate::Error::Config(format!("ANCHOR_MAX_TPS: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "anchor-core");
        assert_eq!(config.topic_id, "0.0.5005");
        assert!(config.batching.enabled);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            data_dir = "/tmp/anchor"
            service_name = "anchor-core"
            topic_id = "0.0.9999"

            [rocksdb]
            write_buffer_size_mb = 32
            max_background_jobs = 1

            [rate_limit]
            max_tps = 5.0
            burst = 20

            [batching]
            max_items = 8
            window_ms = 2000
            compress_threshold_bytes = 2048
            enabled = false
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.topic_id, "0.0.9999");
        assert_eq!(config.batching.max_items, 8);
        assert!(!config.batching.enabled);
    }
}

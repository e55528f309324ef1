//! Gateway configuration

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Consensus network to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    /// Test network (default)
    Testnet,
    /// Production network
    Mainnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Testnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Testnet => write!(f, "testnet"),
            Network::Mainnet => write!(f, "mainnet"),
        }
    }
}

/// Operator credentials for the consensus log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    /// Operator account, `shard.realm.num`
    pub account_id: String,
    /// Operator private key (hex)
    pub private_key: String,
}

/// Fee estimation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    /// Display-currency price of one raw fee unit
    pub unit_price: Decimal,

    /// Fee units assumed for a submission when the log reports none
    pub default_fee_units: u64,
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            // 1e-8 currency units per raw fee unit
            unit_price: Decimal::new(1, 8),
            default_fee_units: 100_000,
        }
    }
}

/// Gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Target network
    pub network: Network,

    /// Consensus topic for anchor messages
    pub topic_id: String,

    /// Node gateway endpoint for submissions
    pub node_endpoint: String,

    /// Mirror base URL override; derived from `network` when absent
    pub mirror_base_url: Option<String>,

    /// Operator credentials; absent means simulation mode
    pub operator: Option<OperatorConfig>,

    /// HTTP timeout, seconds
    pub request_timeout_secs: u64,

    /// Fee estimation
    pub fee: FeeConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            topic_id: "0.0.5005".to_string(),
            node_endpoint: "https://testnet.node-gateway.example/api/v1/topics".to_string(),
            mirror_base_url: None,
            operator: None,
            request_timeout_secs: 30,
            fee: FeeConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Whether the gateway would run in simulation mode
    pub fn is_simulation(&self) -> bool {
        self.operator.is_none()
    }

    /// Mirror base URL, derived from the network unless overridden
    pub fn mirror_base(&self) -> String {
        self.mirror_base_url.clone().unwrap_or_else(|| {
            format!("https://{}.mirror-query-service.example/api/v1", self.network)
        })
    }

    /// Load defaults overridden by environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = GatewayConfig::default();

        if let Ok(network) = std::env::var("LEDGER_NETWORK") {
            config.network = match network.as_str() {
                "testnet" => Network::Testnet,
                "mainnet" => Network::Mainnet,
                other => {
                    return Err(crate::Error::Config(format!(
                        "Unknown network: {}",
                        other
                    )))
                }
            };
        }
        if let Ok(topic) = std::env::var("LEDGER_TOPIC_ID") {
            config.topic_id = topic;
        }
        if let Ok(endpoint) = std::env::var("LEDGER_NODE_ENDPOINT") {
            config.node_endpoint = endpoint;
        }
        if let (Ok(account_id), Ok(private_key)) = (
            std::env::var("LEDGER_OPERATOR_ID"),
            std::env::var("LEDGER_OPERATOR_KEY"),
        ) {
            config.operator = Some(OperatorConfig {
                account_id,
                private_key,
            });
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_simulation_on_testnet() {
        let config = GatewayConfig::default();
        assert!(config.is_simulation());
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(
            config.mirror_base(),
            "https://testnet.mirror-query-service.example/api/v1"
        );
    }

    #[test]
    fn test_mirror_base_override_wins() {
        let config = GatewayConfig {
            mirror_base_url: Some("http://localhost:5551/api/v1".into()),
            ..Default::default()
        };
        assert_eq!(config.mirror_base(), "http://localhost:5551/api/v1");
    }

    #[test]
    fn test_operator_disables_simulation() {
        let config = GatewayConfig {
            operator: Some(OperatorConfig {
                account_id: "0.0.6089195".into(),
                private_key: "302e0201".into(),
            }),
            ..Default::default()
        };
        assert!(!config.is_simulation());
    }
}

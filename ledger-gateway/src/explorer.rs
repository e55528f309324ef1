//! Explorer links and cost estimation
//!
//! Human-auditable references derived from a submission: explorer URLs
//! for the transaction, topic, and operator account, plus an approximate
//! fee-to-currency conversion. Observability and audit only, not
//! settlement-grade accounting.

use crate::config::{FeeConfig, Network};
use rust_decimal::Decimal;
use serde::Serialize;

const EXPLORER_BASE: &str = "https://explorer.example";

/// Explorer URLs for one anchored transaction
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ExplorerLinks {
    /// Transaction page
    pub transaction: String,
    /// Topic page
    pub topic: String,
    /// Operator account page
    pub account: String,
}

impl ExplorerLinks {
    /// Derive all links for one submission
    pub fn derive(network: Network, transaction_id: &str, topic_id: &str, account_id: &str) -> Self {
        Self {
            transaction: format!("{}/{}/transaction/{}", EXPLORER_BASE, network, transaction_id),
            topic: format!("{}/{}/topic/{}", EXPLORER_BASE, network, topic_id),
            account: format!("{}/{}/account/{}", EXPLORER_BASE, network, account_id),
        }
    }
}

/// Approximate fee-to-currency conversion
#[derive(Debug, Clone)]
pub struct CostEstimator {
    config: FeeConfig,
}

impl CostEstimator {
    /// Create from fee configuration
    pub fn new(config: FeeConfig) -> Self {
        Self { config }
    }

    /// Convert raw fee units to display currency
    pub fn estimate(&self, fee_units: u64) -> Decimal {
        (Decimal::from(fee_units) * self.config.unit_price).round_dp(8)
    }

    /// Estimate when the log reported no fee
    pub fn estimate_default(&self) -> Decimal {
        self.estimate(self.config.default_fee_units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_links_follow_network() {
        let links = ExplorerLinks::derive(
            Network::Testnet,
            "0.0.6089195@1758958633.731955949",
            "0.0.5005",
            "0.0.6089195",
        );
        assert_eq!(
            links.transaction,
            "https://explorer.example/testnet/transaction/0.0.6089195@1758958633.731955949"
        );
        assert_eq!(links.topic, "https://explorer.example/testnet/topic/0.0.5005");
        assert_eq!(
            links.account,
            "https://explorer.example/testnet/account/0.0.6089195"
        );

        let mainnet = ExplorerLinks::derive(Network::Mainnet, "t", "p", "a");
        assert!(mainnet.transaction.contains("/mainnet/"));
    }

    #[test]
    fn test_cost_estimate() {
        // 1e-8 per unit: 92337 units -> 0.00092337
        let estimator = CostEstimator::new(FeeConfig::default());
        assert_eq!(estimator.estimate(92_337), Decimal::new(92337, 8));
        assert_eq!(estimator.estimate(0), Decimal::ZERO);
        assert_eq!(estimator.estimate_default(), Decimal::new(100_000, 8));
    }
}

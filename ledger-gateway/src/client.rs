//! Consensus-log submission client
//!
//! Submits opaque message bytes to a named topic. When operator
//! credentials are absent the client runs in a **declared simulation
//! mode**: it returns synthetic but well-formed identifiers, marked
//! `simulated`, and logs the mode loudly at construction. Callers must
//! treat simulated receipts as non-authoritative and never mark rows
//! verified from them.
//!
//! The client performs no retry of its own; attempt counting and backoff
//! belong to the caller. Every outbound call records its response time.

use crate::config::GatewayConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Sentinel account used for simulated transaction ids
const SIMULATION_ACCOUNT: &str = "0.0.0";

/// Result of one submission call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    /// Ledger transaction id, `account@seconds.nanos`
    pub transaction_id: String,
    /// Topic the message was appended to
    pub topic_id: String,
    /// Sequence number assigned by the log
    pub sequence_number: u64,
    /// Consensus timestamp, `seconds.nanos`
    pub consensus_timestamp: String,
    /// Wall-clock duration of the call
    #[serde(skip)]
    pub response_time: Duration,
    /// True when produced without credentials; never authoritative
    pub simulated: bool,
}

/// Submission seam for the anchoring pipeline
#[async_trait]
pub trait TopicClient: Send + Sync {
    /// Submit message bytes to the configured topic
    async fn submit(&self, payload: &[u8]) -> Result<SubmitReceipt>;

    /// Whether this client produces simulated receipts
    fn is_simulated(&self) -> bool;
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    operator_id: &'a str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    status: String,
    transaction_id: String,
    topic_id: String,
    sequence_number: u64,
    consensus_timestamp: String,
}

enum Mode {
    Live {
        http: reqwest::Client,
        operator_id: String,
        operator_key: String,
    },
    Simulation {
        sequence: AtomicU64,
    },
}

/// Client for the external consensus log
pub struct ConsensusClient {
    config: GatewayConfig,
    mode: Mode,
}

impl ConsensusClient {
    /// Build from configuration, choosing the operating mode
    pub fn new(config: GatewayConfig) -> Result<Self> {
        let mode = match &config.operator {
            Some(operator) => {
                let http = reqwest::Client::builder()
                    .timeout(Duration::from_secs(config.request_timeout_secs))
                    .build()?;
                info!(
                    network = %config.network,
                    topic_id = %config.topic_id,
                    operator = %operator.account_id,
                    "Consensus client ready"
                );
                Mode::Live {
                    http,
                    operator_id: operator.account_id.clone(),
                    operator_key: operator.private_key.clone(),
                }
            }
            None => {
                warn!(
                    network = %config.network,
                    topic_id = %config.topic_id,
                    "Ledger credentials absent: running in SIMULATION mode, \
                     receipts are non-authoritative"
                );
                Mode::Simulation {
                    sequence: AtomicU64::new(1),
                }
            }
        };

        Ok(Self { config, mode })
    }

    async fn submit_live(
        &self,
        http: &reqwest::Client,
        operator_id: &str,
        operator_key: &str,
        payload: &[u8],
    ) -> Result<SubmitReceipt> {
        let url = format!(
            "{}/{}/messages",
            self.config.node_endpoint, self.config.topic_id
        );
        let body = SubmitBody {
            operator_id,
            message: hex::encode(payload),
        };

        let start = Instant::now();
        let response = http
            .post(&url)
            .bearer_auth(operator_key)
            .json(&body)
            .send()
            .await?;
        let response_time = start.elapsed();

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Submission(format!(
                "node gateway returned {}: {}",
                status, text
            )));
        }

        let parsed: SubmitResponse = response.json().await?;
        if parsed.status != "SUCCESS" {
            return Err(Error::Submission(format!(
                "transaction {} ended with status {}",
                parsed.transaction_id, parsed.status
            )));
        }

        debug!(
            transaction_id = %parsed.transaction_id,
            sequence_number = parsed.sequence_number,
            response_ms = response_time.as_millis() as u64,
            "Message submitted"
        );

        Ok(SubmitReceipt {
            transaction_id: parsed.transaction_id,
            topic_id: parsed.topic_id,
            sequence_number: parsed.sequence_number,
            consensus_timestamp: parsed.consensus_timestamp,
            response_time,
            simulated: false,
        })
    }

    fn submit_simulated(&self, sequence: &AtomicU64, payload: &[u8]) -> SubmitReceipt {
        let start = Instant::now();
        let now = Utc::now();
        let seconds = now.timestamp();
        let nanos = now.timestamp_subsec_nanos();
        let seq = sequence.fetch_add(1, Ordering::SeqCst);

        debug!(
            topic_id = %self.config.topic_id,
            sequence_number = seq,
            payload_len = payload.len(),
            "Simulated submission"
        );

        SubmitReceipt {
            transaction_id: format!("{}@{}.{}", SIMULATION_ACCOUNT, seconds, nanos),
            topic_id: self.config.topic_id.clone(),
            sequence_number: seq,
            consensus_timestamp: format!("{}.{:09}", seconds, nanos),
            response_time: start.elapsed(),
            simulated: true,
        }
    }
}

#[async_trait]
impl TopicClient for ConsensusClient {
    async fn submit(&self, payload: &[u8]) -> Result<SubmitReceipt> {
        match &self.mode {
            Mode::Live {
                http,
                operator_id,
                operator_key,
            } => {
                self.submit_live(http, operator_id, operator_key, payload)
                    .await
            }
            Mode::Simulation { sequence } => Ok(self.submit_simulated(sequence, payload)),
        }
    }

    fn is_simulated(&self) -> bool {
        matches!(self.mode, Mode::Simulation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OperatorConfig;
    use regex::Regex;

    fn simulated_client() -> ConsensusClient {
        ConsensusClient::new(GatewayConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn test_simulation_receipt_is_well_formed() {
        let client = simulated_client();
        assert!(client.is_simulated());

        let receipt = client.submit(b"{\"hash\":\"abc\"}").await.unwrap();
        assert!(receipt.simulated);
        assert_eq!(receipt.topic_id, "0.0.5005");

        let id_shape = Regex::new(r"^0\.0\.0@\d+\.\d+$").unwrap();
        assert!(id_shape.is_match(&receipt.transaction_id), "{}", receipt.transaction_id);

        let ts_shape = Regex::new(r"^\d+\.\d{9}$").unwrap();
        assert!(ts_shape.is_match(&receipt.consensus_timestamp));
    }

    #[tokio::test]
    async fn test_simulation_sequence_increments() {
        let client = simulated_client();
        let a = client.submit(b"one").await.unwrap();
        let b = client.submit(b"two").await.unwrap();
        assert_eq!(b.sequence_number, a.sequence_number + 1);
    }

    #[test]
    fn test_operator_selects_live_mode() {
        let config = GatewayConfig {
            operator: Some(OperatorConfig {
                account_id: "0.0.6089195".into(),
                private_key: "302e0201".into(),
            }),
            ..Default::default()
        };
        let client = ConsensusClient::new(config).unwrap();
        assert!(!client.is_simulated());
    }
}

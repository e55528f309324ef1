//! Verification against the mirror/query service
//!
//! The mirror is a read-only HTTP API that indexes consensus-log
//! transactions, independent of the write path. A transaction counts as
//! valid only when its reported `result` is SUCCESS **and** its operation
//! `name` is the log-submission operation; either alone is insufficient.
//!
//! Zero matching transactions is a hard error, never silently treated as
//! "unverified". The integrity re-check (stored payload still hashes to
//! the anchored value) is reported distinctly from consensus invalidity.

use crate::config::GatewayConfig;
use crate::{Error, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, info};

/// Operation name the log assigns to topic-message submissions
pub const EXPECTED_OPERATION: &str = "CONSENSUSSUBMITMESSAGE";

/// Result code of an accepted transaction
pub const RESULT_SUCCESS: &str = "SUCCESS";

/// Convert a ledger-native transaction id to the mirror's format
///
/// `accountId@seconds.nanos` becomes `accountId-seconds-nanos`. Ids
/// already in the target format, or not matching the expected shape, pass
/// through unchanged.
pub fn normalize_transaction_id(id: &str) -> String {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    let shape = SHAPE
        .get_or_init(|| Regex::new(r"^(\d+\.\d+\.\d+)@(\d+)\.(\d+)$").unwrap());

    match shape.captures(id) {
        Some(caps) => format!("{}-{}-{}", &caps[1], &caps[2], &caps[3]),
        None => id.to_string(),
    }
}

/// One transaction as reported by the mirror
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorTransaction {
    /// Mirror-format transaction id
    pub transaction_id: String,
    /// Result code, e.g. SUCCESS
    pub result: String,
    /// Operation name, e.g. CONSENSUSSUBMITMESSAGE
    pub name: String,
    /// Consensus timestamp, `seconds.nanos`
    pub consensus_timestamp: String,
    /// Fee charged, raw units
    #[serde(default)]
    pub charged_tx_fee: Option<u64>,
}

/// Mirror transactions listing
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorResponse {
    /// Matching transactions (possibly empty)
    #[serde(default)]
    pub transactions: Vec<MirrorTransaction>,
}

/// Outcome of a verification lookup
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    /// Both validity conditions held
    pub valid: bool,
    /// Reported result code
    pub result: String,
    /// Reported operation name
    pub name: String,
    /// Consensus timestamp
    pub consensus_timestamp: String,
    /// Fee charged, raw units
    pub charged_fee_units: Option<u64>,
}

/// Decide validity from a mirror listing
///
/// Errors with `TransactionNotFound` on an empty listing.
pub fn evaluate(transaction_id: &str, response: MirrorResponse) -> Result<VerificationOutcome> {
    let tx = response
        .transactions
        .into_iter()
        .next()
        .ok_or_else(|| Error::TransactionNotFound(transaction_id.to_string()))?;

    let valid = tx.result == RESULT_SUCCESS && tx.name == EXPECTED_OPERATION;

    Ok(VerificationOutcome {
        valid,
        result: tx.result,
        name: tx.name,
        consensus_timestamp: tx.consensus_timestamp,
        charged_fee_units: tx.charged_tx_fee,
    })
}

/// Integrity re-check: the payload stored today must still hash to the
/// value recorded at anchoring time
pub fn check_integrity(anchored_hash: &str, current_payload: &serde_json::Value) -> Result<()> {
    let actual = anchor_core::hash::content_hash(current_payload);
    if actual != anchored_hash {
        return Err(Error::IntegrityViolation {
            expected: anchored_hash.to_string(),
            actual,
        });
    }
    Ok(())
}

/// Read-side seam for verification
#[async_trait]
pub trait TransactionLookup: Send + Sync {
    /// Look one transaction up and evaluate its validity
    async fn lookup(&self, transaction_id: &str) -> Result<VerificationOutcome>;
}

/// HTTP client for the mirror/query service
pub struct MirrorClient {
    http: reqwest::Client,
    base: String,
}

impl MirrorClient {
    /// Build from configuration
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base: config.mirror_base(),
        })
    }

    /// URL the lookup hits for a transaction id (normalized)
    pub fn transaction_url(&self, transaction_id: &str) -> String {
        format!(
            "{}/transactions/{}",
            self.base,
            normalize_transaction_id(transaction_id)
        )
    }
}

#[async_trait]
impl TransactionLookup for MirrorClient {
    async fn lookup(&self, transaction_id: &str) -> Result<VerificationOutcome> {
        let url = self.transaction_url(transaction_id);
        debug!(%url, "Querying mirror");

        let response = self.http.get(&url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(Error::TransactionNotFound(transaction_id.to_string()));
        }
        if !response.status().is_success() {
            return Err(Error::InvalidResponse(format!(
                "mirror returned {}",
                response.status()
            )));
        }

        let listing: MirrorResponse = response.json().await?;
        let outcome = evaluate(transaction_id, listing)?;

        info!(
            transaction_id,
            valid = outcome.valid,
            result = %outcome.result,
            "Mirror verification"
        );

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_canonical_form() {
        assert_eq!(
            normalize_transaction_id("0.0.6089195@1758958633.731955949"),
            "0.0.6089195-1758958633-731955949"
        );
    }

    #[test]
    fn test_normalize_passthrough() {
        // Already converted
        assert_eq!(
            normalize_transaction_id("0.0.6089195-1758958633-731955949"),
            "0.0.6089195-1758958633-731955949"
        );
        // Malformed
        assert_eq!(normalize_transaction_id("not-an-id"), "not-an-id");
        assert_eq!(normalize_transaction_id("0.0.1@abc.def"), "0.0.1@abc.def");
    }

    fn listing(result: &str, name: &str) -> MirrorResponse {
        serde_json::from_value(json!({
            "transactions": [{
                "transaction_id": "0.0.6089195-1758958633-731955949",
                "result": result,
                "name": name,
                "consensus_timestamp": "1758958640.000000001",
                "charged_tx_fee": 92337
            }]
        }))
        .unwrap()
    }

    #[test]
    fn test_evaluate_requires_both_conditions() {
        let ok = evaluate("tx", listing("SUCCESS", "CONSENSUSSUBMITMESSAGE")).unwrap();
        assert!(ok.valid);
        assert_eq!(ok.charged_fee_units, Some(92337));

        let wrong_result = evaluate("tx", listing("DUPLICATE_TRANSACTION", "CONSENSUSSUBMITMESSAGE")).unwrap();
        assert!(!wrong_result.valid);

        let wrong_name = evaluate("tx", listing("SUCCESS", "CRYPTOTRANSFER")).unwrap();
        assert!(!wrong_name.valid);
    }

    #[test]
    fn test_empty_listing_is_hard_error() {
        let empty: MirrorResponse = serde_json::from_value(json!({"transactions": []})).unwrap();
        assert!(matches!(
            evaluate("0.0.1-2-3", empty),
            Err(Error::TransactionNotFound(_))
        ));

        let missing: MirrorResponse = serde_json::from_value(json!({})).unwrap();
        assert!(evaluate("0.0.1-2-3", missing).is_err());
    }

    #[test]
    fn test_integrity_check_distinguishes_tampering() {
        let payload = json!({"title": "Visit", "notes": "fever"});
        let hash = anchor_core::hash::content_hash(&payload);

        assert!(check_integrity(&hash, &payload).is_ok());

        let tampered = json!({"title": "Visit", "notes": "no symptoms"});
        let err = check_integrity(&hash, &tampered).unwrap_err();
        assert!(matches!(err, Error::IntegrityViolation { .. }));
    }

    #[test]
    fn test_transaction_url_normalizes() {
        let client = MirrorClient::new(&GatewayConfig::default()).unwrap();
        assert_eq!(
            client.transaction_url("0.0.6089195@1758958633.731955949"),
            "https://testnet.mirror-query-service.example/api/v1/transactions/0.0.6089195-1758958633-731955949"
        );
    }
}

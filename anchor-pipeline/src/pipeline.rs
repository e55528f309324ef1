//! The anchoring pipeline
//!
//! One logical pipeline per topic. Every submission path acquires the
//! rate limiter before touching the submission client; the measured wait
//! and response time land on the persisted row. Transient submission
//! failures are retried here with bounded exponential backoff; the client
//! itself never retries. After exhaustion the row is persisted FAILED
//! with the last error message verbatim, and the primary record workflow
//! is never blocked.

use crate::config::RetryConfig;
use crate::{Error, Result};
use anchor_core::batch::{BatchAggregator, BatchPayload};
use anchor_core::hash;
use anchor_core::merkle;
use anchor_core::message::MessageBuilder;
use anchor_core::metrics::Metrics;
use anchor_core::rate_limit::RateLimiter;
use anchor_core::types::{
    AnchorRequest, EntityType, LedgerTransactionRecord, RecordSnapshot, SealedBatch, TxStatus,
};
use anchor_core::TransactionStore;
use chrono::Utc;
use ledger_gateway::explorer::CostEstimator;
use ledger_gateway::mirror::{self, TransactionLookup, VerificationOutcome};
use ledger_gateway::{SubmitReceipt, TopicClient};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Row type tag for batch submissions
const TX_TYPE_BATCH: &str = "BATCH";

/// What happened to an anchoring call
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// Routed to the aggregator; the window is still open
    Queued {
        /// Requests now waiting in the window
        pending: usize,
    },
    /// Submission happened; one row per item
    Recorded(Vec<LedgerTransactionRecord>),
}

/// End-to-end anchoring pipeline
pub struct AnchorPipeline {
    store: Arc<TransactionStore>,
    client: Arc<dyn TopicClient>,
    limiter: RateLimiter,
    aggregator: BatchAggregator,
    builder: MessageBuilder,
    metrics: Metrics,
    retry: RetryConfig,
    estimator: CostEstimator,
    topic_id: String,
    batching_enabled: bool,
}

impl AnchorPipeline {
    /// Assemble the pipeline
    pub fn new(
        store: Arc<TransactionStore>,
        client: Arc<dyn TopicClient>,
        core: &anchor_core::Config,
        retry: RetryConfig,
        fee: ledger_gateway::config::FeeConfig,
    ) -> Self {
        Self {
            store,
            client,
            limiter: RateLimiter::new(&core.rate_limit),
            aggregator: BatchAggregator::new(core.batching.clone()),
            builder: MessageBuilder::new(),
            metrics: Metrics::default(),
            retry,
            estimator: CostEstimator::new(fee),
            topic_id: core.topic_id.clone(),
            batching_enabled: core.batching.enabled,
        }
    }

    /// Persisted bookkeeping store
    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Pipeline metrics
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Anchor one entity version, routing per configuration
    pub async fn anchor(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: &RecordSnapshot,
    ) -> Result<EnqueueOutcome> {
        if self.batching_enabled {
            self.enqueue(entity_type, entity_id, snapshot).await
        } else {
            let record = self.anchor_direct(entity_type, entity_id, snapshot).await?;
            Ok(EnqueueOutcome::Recorded(vec![record]))
        }
    }

    /// Anchor one entity version with a dedicated submission
    ///
    /// Always returns a persisted row; a FAILED row (not an error) is the
    /// outcome of exhausted attempts.
    pub async fn anchor_direct(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: &RecordSnapshot,
    ) -> Result<LedgerTransactionRecord> {
        let value = snapshot.to_value()?;
        let content_hash = hash::content_hash(&value);
        let payload = self
            .builder
            .build(entity_type, entity_id, snapshot, &content_hash);
        let bytes = payload.to_bytes()?;

        let waited = self.limiter.acquire(1.0).await;

        let record = match self.submit_with_retry(&bytes).await {
            Ok((receipt, attempts)) => {
                info!(
                    entity_type = %entity_type,
                    entity_id,
                    transaction_id = %receipt.transaction_id,
                    attempts,
                    "Anchored"
                );
                self.metrics
                    .record_submission(receipt.response_time.as_secs_f64(), waited.as_secs_f64());
                self.single_success_row(
                    entity_type,
                    entity_id,
                    &content_hash,
                    &receipt,
                    attempts,
                    waited,
                    bytes.len(),
                )
            }
            Err((last_error, attempts)) => {
                error!(
                    entity_type = %entity_type,
                    entity_id,
                    attempts,
                    error = %last_error,
                    "Anchoring failed after all attempts"
                );
                self.metrics.record_failure();
                self.failure_row(
                    entity_type,
                    entity_id,
                    &content_hash,
                    last_error,
                    attempts,
                    waited,
                    bytes.len(),
                    None,
                )
            }
        };

        self.store.put_transaction(&record)?;
        Ok(record)
    }

    /// Route one entity version through the batch aggregator
    pub async fn enqueue(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        snapshot: &RecordSnapshot,
    ) -> Result<EnqueueOutcome> {
        let value = snapshot.to_value()?;
        let content_hash = hash::content_hash(&value);
        let payload = self
            .builder
            .build(entity_type, entity_id, snapshot, &content_hash);
        let request = AnchorRequest::new(entity_type, entity_id, payload);

        // Crash-safe queue entry until the batch row lands
        self.store.put_request(&request)?;

        match self.aggregator.push(request)? {
            Some(batch) => Ok(EnqueueOutcome::Recorded(self.submit_batch(batch).await?)),
            None => Ok(EnqueueOutcome::Queued {
                pending: self.aggregator.pending(),
            }),
        }
    }

    /// Seal and submit the window if its time threshold elapsed
    pub async fn poll_batch_window(&self) -> Result<Option<Vec<LedgerTransactionRecord>>> {
        match self.aggregator.seal_if_due()? {
            Some(batch) => Ok(Some(self.submit_batch(batch).await?)),
            None => Ok(None),
        }
    }

    /// Seal and submit whatever is pending (shutdown path)
    pub async fn flush(&self) -> Result<Option<Vec<LedgerTransactionRecord>>> {
        match self.aggregator.flush()? {
            Some(batch) => Ok(Some(self.submit_batch(batch).await?)),
            None => Ok(None),
        }
    }

    /// Submit one sealed batch: a single on-ledger message carrying the
    /// Merkle root, one persisted row per member
    ///
    /// On failure every member transitions to FAILED so the reconciliation
    /// job can resubmit them, individually or in a new batch.
    pub async fn submit_batch(&self, batch: SealedBatch) -> Result<Vec<LedgerTransactionRecord>> {
        self.metrics.record_batch(batch.items.len());

        let payload = BatchPayload {
            version: anchor_core::message::SCHEMA_VERSION.to_string(),
            batch_id: batch.batch_id,
            merkle_root: batch.merkle_root.clone(),
            item_count: batch.items.len(),
            sealed_at: batch.sealed_at,
        };
        let bytes = payload.to_bytes()?;

        let waited = self.limiter.acquire(1.0).await;
        let outcome = self.submit_with_retry(&bytes).await;

        let mut rows = Vec::with_capacity(batch.items.len());
        match outcome {
            Ok((receipt, attempts)) => {
                info!(
                    batch_id = %batch.batch_id,
                    items = batch.items.len(),
                    transaction_id = %receipt.transaction_id,
                    "Batch anchored"
                );
                self.metrics
                    .record_submission(receipt.response_time.as_secs_f64(), waited.as_secs_f64());
                for item in &batch.items {
                    let row = self.batch_member_row(&batch, item, &receipt, attempts, waited);
                    self.store.put_transaction(&row)?;
                    self.store
                        .delete_request(item.request.entity_type, &item.request.entity_id)?;
                    rows.push(row);
                }
            }
            Err((last_error, attempts)) => {
                error!(
                    batch_id = %batch.batch_id,
                    items = batch.items.len(),
                    error = %last_error,
                    "Batch submission failed; marking every member FAILED"
                );
                self.metrics.record_failure();
                for item in &batch.items {
                    let row = self.failure_row(
                        item.request.entity_type,
                        &item.request.entity_id,
                        &item.request.content_hash,
                        last_error.clone(),
                        attempts,
                        waited,
                        batch.message_size,
                        Some((&batch, item.merkle_index, &item.merkle_proof)),
                    );
                    self.store.put_transaction(&row)?;
                    self.store
                        .delete_request(item.request.entity_type, &item.request.entity_id)?;
                    rows.push(row);
                }
            }
        }
        Ok(rows)
    }

    /// Confirm one row against the mirror and flip its verified flag
    ///
    /// Simulated rows are refused outright: their receipts are
    /// non-authoritative by construction. When `current_payload` is given
    /// the integrity re-check runs too, and a divergence is reported as an
    /// integrity violation distinct from consensus invalidity.
    pub async fn verify_and_mark(
        &self,
        record: &LedgerTransactionRecord,
        lookup: &dyn TransactionLookup,
        current_payload: Option<&serde_json::Value>,
    ) -> Result<VerificationOutcome> {
        if record.status == TxStatus::Simulated {
            return Err(Error::SimulatedReceipt(record.transaction_id.clone()));
        }

        let outcome = lookup.lookup(record.base_transaction_id()).await?;
        if !outcome.valid {
            return Err(Error::Gateway(ledger_gateway::Error::ConsensusInvalid {
                transaction_id: record.transaction_id.clone(),
                result: outcome.result.clone(),
                name: outcome.name.clone(),
            }));
        }

        if let Some(payload) = current_payload {
            mirror::check_integrity(&record.hash, payload).map_err(Error::Gateway)?;
        }

        self.store.mark_verified(&record.transaction_id, Utc::now())?;
        Ok(outcome)
    }

    // Submission with bounded retry; the Err side carries the last error
    // verbatim plus the attempts consumed.
    async fn submit_with_retry(
        &self,
        payload: &[u8],
    ) -> std::result::Result<(SubmitReceipt, u32), (String, u32)> {
        let mut last_error = String::new();
        for attempt in 1..=self.retry.max_attempts {
            match self.client.submit(payload).await {
                Ok(receipt) => return Ok((receipt, attempt)),
                Err(e) => {
                    last_error = e.to_string();
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        backoff_ms = backoff.as_millis() as u64,
                        error = %last_error,
                        "Submission attempt failed"
                    );
                    if attempt < self.retry.max_attempts {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
        Err((last_error, self.retry.max_attempts))
    }

    #[allow(clippy::too_many_arguments)]
    fn single_success_row(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        content_hash: &str,
        receipt: &SubmitReceipt,
        attempts: u32,
        waited: Duration,
        message_size: usize,
    ) -> LedgerTransactionRecord {
        LedgerTransactionRecord {
            tx_type: entity_type.as_str().to_string(),
            entity_type,
            entity_id: entity_id.to_string(),
            hash: content_hash.to_string(),
            transaction_id: receipt.transaction_id.clone(),
            topic_id: receipt.topic_id.clone(),
            sequence_number: Some(receipt.sequence_number),
            consensus_timestamp: Some(receipt.consensus_timestamp.clone()),
            is_batch: false,
            batch_id: None,
            merkle_root: None,
            merkle_proof: None,
            merkle_index: None,
            compressed: false,
            message_size,
            compression_ratio: None,
            response_time_ms: receipt.response_time.as_millis() as u64,
            attempts,
            rate_limit_wait_ms: waited.as_millis() as u64,
            status: if receipt.simulated {
                TxStatus::Simulated
            } else {
                TxStatus::Success
            },
            error: None,
            estimated_cost: Some(self.estimator.estimate_default()),
            verified: false,
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    fn batch_member_row(
        &self,
        batch: &SealedBatch,
        item: &anchor_core::types::BatchItem,
        receipt: &SubmitReceipt,
        attempts: u32,
        waited: Duration,
    ) -> LedgerTransactionRecord {
        LedgerTransactionRecord {
            tx_type: TX_TYPE_BATCH.to_string(),
            entity_type: item.request.entity_type,
            entity_id: item.request.entity_id.clone(),
            hash: item.request.content_hash.clone(),
            // Members share one on-ledger transaction; the fragment keeps
            // the unique index while base_transaction_id() recovers the
            // queryable id.
            transaction_id: format!("{}#{}", receipt.transaction_id, item.merkle_index),
            topic_id: receipt.topic_id.clone(),
            sequence_number: Some(receipt.sequence_number),
            consensus_timestamp: Some(receipt.consensus_timestamp.clone()),
            is_batch: true,
            batch_id: Some(batch.batch_id),
            merkle_root: Some(batch.merkle_root.clone()),
            merkle_proof: Some(item.merkle_proof.clone()),
            merkle_index: Some(item.merkle_index),
            compressed: batch.compressed,
            message_size: batch.message_size,
            compression_ratio: Some(batch.compression_ratio),
            response_time_ms: receipt.response_time.as_millis() as u64,
            attempts,
            rate_limit_wait_ms: waited.as_millis() as u64,
            status: if receipt.simulated {
                TxStatus::Simulated
            } else {
                TxStatus::Success
            },
            error: None,
            estimated_cost: Some(self.estimator.estimate_default()),
            verified: false,
            verified_at: None,
            created_at: Utc::now(),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn failure_row(
        &self,
        entity_type: EntityType,
        entity_id: &str,
        content_hash: &str,
        last_error: String,
        attempts: u32,
        waited: Duration,
        message_size: usize,
        batch_ctx: Option<(&SealedBatch, usize, &merkle::MerkleProof)>,
    ) -> LedgerTransactionRecord {
        let (is_batch, batch_id, merkle_root, merkle_proof, merkle_index, tx_type) =
            match batch_ctx {
                Some((batch, index, proof)) => (
                    true,
                    Some(batch.batch_id),
                    Some(batch.merkle_root.clone()),
                    Some(proof.clone()),
                    Some(index),
                    TX_TYPE_BATCH.to_string(),
                ),
                None => (false, None, None, None, None, entity_type.as_str().to_string()),
            };

        LedgerTransactionRecord {
            tx_type,
            entity_type,
            entity_id: entity_id.to_string(),
            hash: content_hash.to_string(),
            // No on-ledger id exists for a failed submission; a local id
            // keeps the row addressable and the unique index intact.
            transaction_id: format!("local-{}", Uuid::new_v4()),
            topic_id: self.topic_id.clone(),
            sequence_number: None,
            consensus_timestamp: None,
            is_batch,
            batch_id,
            merkle_root,
            merkle_proof,
            merkle_index,
            compressed: false,
            message_size,
            compression_ratio: None,
            response_time_ms: 0,
            attempts,
            rate_limit_wait_ms: waited.as_millis() as u64,
            status: TxStatus::Failed,
            error: Some(last_error),
            estimated_cost: None,
            verified: false,
            verified_at: None,
            created_at: Utc::now(),
        }
    }
}

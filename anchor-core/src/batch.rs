//! Merkle batch aggregation
//!
//! Collects pending anchor requests over a window (size threshold OR time
//! threshold, whichever fires first) and seals them into a batch: a Merkle
//! tree over the ordered content hashes, one membership proof per item,
//! and a compact on-ledger payload carrying only the root plus metadata.
//!
//! Item order is fixed at aggregation time and must not change before
//! proof computation.

use crate::merkle::MerkleTree;
use crate::types::{AnchorRequest, AnchorStatus, BatchItem, SealedBatch};
use crate::Result;
use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Seal when this many requests are pending
    pub max_items: usize,

    /// Seal when the oldest pending request is this old (milliseconds)
    pub window_ms: u64,

    /// Flag batches whose raw aggregate payload exceeds this size
    pub compress_threshold_bytes: usize,

    /// Route submissions through batching at all
    pub enabled: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_items: 10,
            window_ms: 5_000,
            compress_threshold_bytes: 4_096,
            enabled: true,
        }
    }
}

/// The compact payload actually submitted to the consensus log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchPayload {
    /// Payload schema version
    pub version: String,
    /// Batch identifier
    pub batch_id: Uuid,
    /// Merkle root over member hashes
    pub merkle_root: String,
    /// Number of members
    pub item_count: usize,
    /// Seal timestamp
    pub sealed_at: chrono::DateTime<Utc>,
}

impl BatchPayload {
    /// Wire bytes for submission
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

struct PendingWindow {
    requests: Vec<AnchorRequest>,
    opened_at: Option<Instant>,
}

/// Windowed batch aggregator
pub struct BatchAggregator {
    config: BatchConfig,
    window: Mutex<PendingWindow>,
}

impl BatchAggregator {
    /// Create from configuration
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            window: Mutex::new(PendingWindow {
                requests: Vec::new(),
                opened_at: None,
            }),
        }
    }

    /// Number of requests waiting in the current window
    pub fn pending(&self) -> usize {
        self.window.lock().requests.len()
    }

    /// Add a request to the current window
    ///
    /// Returns the sealed batch when this push crossed the size threshold.
    pub fn push(&self, mut request: AnchorRequest) -> Result<Option<SealedBatch>> {
        let mut window = self.window.lock();
        request.status = AnchorStatus::Batched;
        if window.requests.is_empty() {
            window.opened_at = Some(Instant::now());
        }
        window.requests.push(request);

        if window.requests.len() >= self.config.max_items {
            let drained = Self::drain(&mut window);
            drop(window);
            return Ok(Some(self.seal(drained)?));
        }
        Ok(None)
    }

    /// Seal the window if its time threshold elapsed
    pub fn seal_if_due(&self) -> Result<Option<SealedBatch>> {
        let mut window = self.window.lock();
        let due = match window.opened_at {
            Some(opened) if !window.requests.is_empty() => {
                opened.elapsed() >= Duration::from_millis(self.config.window_ms)
            }
            _ => false,
        };
        if !due {
            return Ok(None);
        }
        let drained = Self::drain(&mut window);
        drop(window);
        Ok(Some(self.seal(drained)?))
    }

    /// Seal whatever is pending, regardless of thresholds
    pub fn flush(&self) -> Result<Option<SealedBatch>> {
        let mut window = self.window.lock();
        if window.requests.is_empty() {
            return Ok(None);
        }
        let drained = Self::drain(&mut window);
        drop(window);
        Ok(Some(self.seal(drained)?))
    }

    fn drain(window: &mut PendingWindow) -> Vec<AnchorRequest> {
        window.opened_at = None;
        std::mem::take(&mut window.requests)
    }

    fn seal(&self, requests: Vec<AnchorRequest>) -> Result<SealedBatch> {
        let hashes: Vec<&str> = requests.iter().map(|r| r.content_hash.as_str()).collect();
        let tree = MerkleTree::from_hashes(&hashes)?;
        let merkle_root = tree.root();

        let raw_size: usize = requests
            .iter()
            .map(|r| serde_json::to_vec(&r.payload).map(|b| b.len()).unwrap_or(0))
            .sum();

        let batch_id = Uuid::new_v4();
        let sealed_at = Utc::now();

        let items = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| {
                Ok(BatchItem {
                    merkle_proof: tree.proof(index)?,
                    merkle_index: index,
                    request,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let payload = BatchPayload {
            version: crate::message::SCHEMA_VERSION.to_string(),
            batch_id,
            merkle_root: merkle_root.clone(),
            item_count: items.len(),
            sealed_at,
        };
        let message_size = payload.to_bytes()?.len();

        let compression_ratio = if raw_size > 0 {
            message_size as f64 / raw_size as f64
        } else {
            1.0
        };

        tracing::info!(
            batch_id = %batch_id,
            items = items.len(),
            merkle_root = %merkle_root,
            message_size,
            "Sealed anchor batch"
        );

        Ok(SealedBatch {
            batch_id,
            merkle_root,
            items,
            compressed: raw_size > self.config.compress_threshold_bytes,
            message_size,
            compression_ratio,
            sealed_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merkle::verify_proof;
    use crate::message::MessageBuilder;
    use crate::types::{EntityType, RecordSnapshot};

    fn request(i: usize) -> AnchorRequest {
        let snapshot = RecordSnapshot {
            title: Some(format!("Consultation {}", i)),
            notes: Some("fatigue".into()),
            ..Default::default()
        };
        let hash = crate::hash::hash_serializable(&snapshot).unwrap();
        let payload = MessageBuilder::new().build(
            EntityType::MedicalRecord,
            &format!("REC-{}", i),
            &snapshot,
            &hash,
        );
        AnchorRequest::new(EntityType::MedicalRecord, format!("REC-{}", i), payload)
    }

    fn aggregator(max_items: usize, window_ms: u64) -> BatchAggregator {
        BatchAggregator::new(BatchConfig {
            max_items,
            window_ms,
            ..Default::default()
        })
    }

    #[test]
    fn test_seals_on_size_threshold() {
        let agg = aggregator(3, 60_000);

        assert!(agg.push(request(0)).unwrap().is_none());
        assert!(agg.push(request(1)).unwrap().is_none());
        let batch = agg.push(request(2)).unwrap().expect("third push seals");

        assert_eq!(batch.items.len(), 3);
        assert_eq!(agg.pending(), 0);
    }

    #[test]
    fn test_seals_on_time_threshold() {
        let agg = aggregator(100, 10);

        agg.push(request(0)).unwrap();
        assert!(agg.seal_if_due().unwrap().is_none());

        std::thread::sleep(Duration::from_millis(20));
        let batch = agg.seal_if_due().unwrap().expect("window elapsed");
        assert_eq!(batch.items.len(), 1);
    }

    #[test]
    fn test_items_keep_push_order_and_proofs_verify() {
        let agg = aggregator(4, 60_000);
        for i in 0..3 {
            agg.push(request(i)).unwrap();
        }
        let batch = agg.push(request(3)).unwrap().unwrap();

        for (i, item) in batch.items.iter().enumerate() {
            assert_eq!(item.merkle_index, i);
            assert_eq!(item.request.entity_id, format!("REC-{}", i));
            assert_eq!(item.request.status, AnchorStatus::Batched);
            assert!(verify_proof(
                &item.request.content_hash,
                &item.merkle_proof,
                &batch.merkle_root
            ));
        }
    }

    #[test]
    fn test_payload_carries_root_not_items() {
        let agg = aggregator(2, 60_000);
        agg.push(request(0)).unwrap();
        let batch = agg.push(request(1)).unwrap().unwrap();

        let payload = BatchPayload {
            version: crate::message::SCHEMA_VERSION.to_string(),
            batch_id: batch.batch_id,
            merkle_root: batch.merkle_root.clone(),
            item_count: batch.items.len(),
            sealed_at: batch.sealed_at,
        };
        let bytes = payload.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.contains(&batch.merkle_root));
        // The members' own hashes never ride on the wire
        for item in &batch.items {
            assert!(!text.contains(&item.request.content_hash));
        }
        assert_eq!(batch.message_size, text.len());
    }

    #[test]
    fn test_flush_drains_partial_window() {
        let agg = aggregator(10, 60_000);
        agg.push(request(0)).unwrap();
        agg.push(request(1)).unwrap();

        let batch = agg.flush().unwrap().unwrap();
        assert_eq!(batch.items.len(), 2);
        assert!(agg.flush().unwrap().is_none());
    }
}

//! Core types for the anchoring subsystem
//!
//! All persisted types are designed for:
//! - Deterministic serialization (bincode for storage, canonical JSON for
//!   hashing)
//! - Memory safety (no unsafe code)
//! - Recomputability: every content hash can be rebuilt from the same
//!   canonical payload at any later time

use crate::merkle::MerkleProof;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Kind of domain entity being anchored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    /// Patient medical record
    MedicalRecord,
    /// Issued prescription
    Prescription,
    /// Prescription delivery confirmation
    PrescriptionDelivery,
    /// Access-audit log entry
    AccessLog,
}

impl EntityType {
    /// Wire / display form
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::MedicalRecord => "MEDICAL_RECORD",
            EntityType::Prescription => "PRESCRIPTION",
            EntityType::PrescriptionDelivery => "PRESCRIPTION_DELIVERY",
            EntityType::AccessLog => "ACCESS_LOG",
        }
    }

    /// Parse from wire form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MEDICAL_RECORD" => Some(EntityType::MedicalRecord),
            "PRESCRIPTION" => Some(EntityType::Prescription),
            "PRESCRIPTION_DELIVERY" => Some(EntityType::PrescriptionDelivery),
            "ACCESS_LOG" => Some(EntityType::AccessLog),
            _ => None,
        }
    }

    /// Stable single-byte tag used in index keys
    pub fn index_byte(&self) -> u8 {
        match self {
            EntityType::MedicalRecord => 1,
            EntityType::Prescription => 2,
            EntityType::PrescriptionDelivery => 3,
            EntityType::AccessLog => 4,
        }
    }

    /// All known entity types, in index-byte order
    pub fn all() -> [EntityType; 4] {
        [
            EntityType::MedicalRecord,
            EntityType::Prescription,
            EntityType::PrescriptionDelivery,
            EntityType::AccessLog,
        ]
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle of an anchor request
///
/// `Pending → Batched → Submitted → Verified | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum AnchorStatus {
    /// Created, not yet routed
    Pending = 1,
    /// Collected into a Merkle batch awaiting seal
    Batched = 2,
    /// Sent to the consensus log
    Submitted = 3,
    /// Confirmed against the mirror/query service
    Verified = 4,
    /// Submission exhausted its attempts
    Failed = 5,
}

impl fmt::Display for AnchorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AnchorStatus::Pending => "PENDING",
            AnchorStatus::Batched => "BATCHED",
            AnchorStatus::Submitted => "SUBMITTED",
            AnchorStatus::Verified => "VERIFIED",
            AnchorStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Outcome recorded on a persisted transaction row
///
/// `Simulated` is the sentinel for receipts produced without ledger
/// credentials; such rows are never marked verified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum TxStatus {
    /// Accepted by the consensus log
    Success = 1,
    /// Submission failed after all attempts
    Failed = 2,
    /// Submitted, consensus outcome not yet known
    Pending = 3,
    /// Produced in simulation mode, non-authoritative
    Simulated = 4,
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Success => "SUCCESS",
            TxStatus::Failed => "FAILED",
            TxStatus::Pending => "PENDING",
            TxStatus::Simulated => "SIMULATED",
        };
        write!(f, "{}", s)
    }
}

/// Vital signs captured on a record snapshot
///
/// Absent readings serialize as nulls: rows travel through bincode, which
/// cannot round-trip skipped fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    /// Blood pressure, e.g. "120/80"
    pub blood_pressure: Option<String>,
    /// Heart rate (bpm)
    pub heart_rate: Option<u32>,
    /// Body temperature (Celsius)
    pub temperature: Option<f64>,
    /// Weight (kg)
    pub weight: Option<f64>,
}

/// Snapshot of a domain record at anchoring time
///
/// This is the boundary type handed over by the (out-of-scope) storage
/// layer. Missing optional fields degrade to empty containers downstream,
/// never an error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSnapshot {
    /// Free-text title, drives classification
    #[serde(default)]
    pub title: Option<String>,
    /// Patient matricule
    #[serde(default)]
    pub patient_id: Option<String>,
    /// Practitioner matricule or id
    #[serde(default)]
    pub practitioner_id: Option<String>,
    /// Clinical notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Prescription free text (comma-separated treatments)
    #[serde(default)]
    pub prescription: Option<String>,
    /// Vital signs at capture time
    #[serde(default)]
    pub vitals: Option<VitalSigns>,
}

impl RecordSnapshot {
    /// JSON value used for canonical hashing
    pub fn to_value(&self) -> crate::Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Enriched anchor payload derived from a snapshot
///
/// This is what gets hashed into the content hash and (for single
/// submissions) serialized onto the consensus log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorMessage {
    /// Payload schema version
    pub version: String,
    /// Entity kind
    pub entity_type: EntityType,
    /// Entity identifier (matricule or storage id)
    pub entity_id: String,
    /// SHA-256 of the canonical snapshot, lowercase hex
    pub content_hash: String,
    /// Heuristic classification label
    pub classification: String,
    /// Symptom keywords extracted from notes
    pub symptoms: Vec<String>,
    /// Treatments split out of the prescription text
    pub treatments: Vec<String>,
    /// Vital signs snapshot, if present
    pub vitals: Option<VitalSigns>,
    /// Participant identifiers (patient, practitioner)
    pub participants: Vec<String>,
    /// Anchoring timestamp (RFC 3339)
    pub anchored_at: DateTime<Utc>,
}

impl AnchorMessage {
    /// Serialized wire bytes for a single (non-batched) submission
    pub fn to_bytes(&self) -> crate::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// One pending anchoring unit, one per domain entity version
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRequest {
    /// Entity kind
    pub entity_type: EntityType,
    /// Entity identifier
    pub entity_id: String,
    /// SHA-256 of the canonical snapshot, 64 lowercase hex chars
    pub content_hash: String,
    /// Enriched payload snapshot
    pub payload: AnchorMessage,
    /// Lifecycle status
    pub status: AnchorStatus,
    /// Submission attempts so far
    pub attempts: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl AnchorRequest {
    /// Create a fresh pending request
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>, payload: AnchorMessage) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            content_hash: payload.content_hash.clone(),
            payload,
            status: AnchorStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
        }
    }
}

/// One member of a sealed batch, with its membership proof
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    /// The underlying request
    pub request: AnchorRequest,
    /// Position in the leaf sequence, fixed at aggregation time
    pub merkle_index: usize,
    /// Sibling path from this leaf to the root
    pub merkle_proof: MerkleProof,
}

/// A sealed group of anchor requests behind a single Merkle root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedBatch {
    /// Batch identifier
    pub batch_id: Uuid,
    /// Merkle root over item hashes in index order, lowercase hex
    pub merkle_root: String,
    /// Ordered members with proofs
    pub items: Vec<BatchItem>,
    /// Whether the aggregate payload crossed the compression threshold
    pub compressed: bool,
    /// Size of the on-ledger message (root + metadata), bytes
    pub message_size: usize,
    /// message_size / raw aggregate payload size
    pub compression_ratio: f64,
    /// Seal time
    pub sealed_at: DateTime<Utc>,
}

/// Persisted bookkeeping row, one per submission outcome
///
/// Owned exclusively by the anchoring subsystem; domain entities keep only
/// a denormalized copy of the latest transaction id / hash / verified flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerTransactionRecord {
    /// Submission kind: entity type string or "BATCH"
    pub tx_type: String,
    /// Entity kind
    pub entity_type: EntityType,
    /// Entity identifier
    pub entity_id: String,
    /// Content hash anchored by this submission
    pub hash: String,
    /// External ledger transaction id (unique). Batch members carry
    /// `<ledger-txid>#<merkle-index>`; see `base_transaction_id`.
    pub transaction_id: String,
    /// Consensus topic the message went to
    pub topic_id: String,
    /// Sequence number assigned by the log
    pub sequence_number: Option<u64>,
    /// Consensus timestamp as reported by the log
    pub consensus_timestamp: Option<String>,
    /// True when this row belongs to a batch submission
    pub is_batch: bool,
    /// Batch identifier, if batched
    pub batch_id: Option<Uuid>,
    /// Merkle root, if batched
    pub merkle_root: Option<String>,
    /// Membership proof, if batched
    pub merkle_proof: Option<MerkleProof>,
    /// Leaf position, if batched
    pub merkle_index: Option<usize>,
    /// Compression flag copied from the batch
    pub compressed: bool,
    /// On-ledger message size, bytes
    pub message_size: usize,
    /// Compression ratio, if batched
    pub compression_ratio: Option<f64>,
    /// Wall-clock duration of the submission call, milliseconds
    pub response_time_ms: u64,
    /// Attempts consumed (1 = first try succeeded)
    pub attempts: u32,
    /// Total time spent waiting on the rate limiter, milliseconds
    pub rate_limit_wait_ms: u64,
    /// Submission outcome
    pub status: TxStatus,
    /// Last error message, verbatim, when status is FAILED
    pub error: Option<String>,
    /// Approximate submission cost in the display currency
    pub estimated_cost: Option<Decimal>,
    /// Confirmed against the mirror/query service
    pub verified: bool,
    /// Confirmation time
    pub verified_at: Option<DateTime<Utc>>,
    /// Row creation time
    pub created_at: DateTime<Utc>,
}

impl LedgerTransactionRecord {
    /// On-ledger transaction id with any batch-member fragment removed
    pub fn base_transaction_id(&self) -> &str {
        base_transaction_id(&self.transaction_id)
    }

    /// Whether the reconciliation sweep should re-drive this row
    ///
    /// True for simulation fallbacks and anything not yet verified.
    pub fn needs_reconciliation(&self) -> bool {
        self.status == TxStatus::Simulated || !self.verified
    }
}

/// Strip the `#<index>` fragment a batch member carries
pub fn base_transaction_id(id: &str) -> &str {
    match id.split_once('#') {
        Some((base, _)) => base,
        None => id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_type_roundtrip() {
        for et in EntityType::all() {
            assert_eq!(EntityType::parse(et.as_str()), Some(et));
        }
        assert_eq!(EntityType::parse("NOT_A_TYPE"), None);
    }

    #[test]
    fn base_transaction_id_strips_fragment() {
        assert_eq!(
            base_transaction_id("0.0.6089195@1758958633.731955949#4"),
            "0.0.6089195@1758958633.731955949"
        );
        assert_eq!(base_transaction_id("0.0.1@2.3"), "0.0.1@2.3");
    }

    #[test]
    fn tx_status_display() {
        assert_eq!(TxStatus::Simulated.to_string(), "SIMULATED");
        assert_eq!(TxStatus::Success.to_string(), "SUCCESS");
    }
}

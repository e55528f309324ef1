//! VeriMed Anchor Core
//!
//! Anchoring primitives for medical-record integrity proofs:
//! canonical hashing, enriched anchor messages, Merkle batching,
//! rate limiting, and persisted transaction bookkeeping.
//!
//! # Architecture
//!
//! - **Canonical hashing**: sorted-key JSON + SHA-256, recomputable at any
//!   time for integrity re-verification
//! - **Merkle batching**: one on-ledger message per batch, per-item
//!   membership proofs
//! - **Token-bucket admission**: bounds sustained submissions to the
//!   external consensus log
//! - **Append-mostly bookkeeping**: one persisted record per submission
//!   outcome, single-row verification updates

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

pub mod batch;
pub mod config;
pub mod error;
pub mod hash;
pub mod matricule;
pub mod merkle;
pub mod message;
pub mod metrics;
pub mod rate_limit;
pub mod store;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use store::TransactionStore;
pub use types::{
    AnchorMessage, AnchorRequest, AnchorStatus, EntityType, LedgerTransactionRecord,
    RecordSnapshot, TxStatus,
};

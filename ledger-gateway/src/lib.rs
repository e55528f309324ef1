//! Ledger Gateway
//!
//! External interfaces of the anchoring pipeline:
//! - Submission of anchor messages to the consensus log, with a declared
//!   simulation mode when credentials are absent
//! - Verification of anchored transactions against the read-only
//!   mirror/query service
//! - Explorer link derivation and approximate cost estimation

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod client;
pub mod config;
pub mod error;
pub mod explorer;
pub mod mirror;

pub use client::{ConsensusClient, SubmitReceipt, TopicClient};
pub use config::{GatewayConfig, Network};
pub use error::{Error, Result};
pub use mirror::{normalize_transaction_id, MirrorClient, TransactionLookup, VerificationOutcome};

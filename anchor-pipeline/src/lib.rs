//! VeriMed Anchor Pipeline
//!
//! Orchestrates the anchoring flow end to end:
//!
//! 1. **Anchor**: hash + enrich a domain snapshot, pass the rate limiter,
//!    submit directly or through the Merkle batch aggregator, persist the
//!    submission outcome
//! 2. **Verify**: confirm anchored transactions against the mirror and
//!    flip the per-row `verified` flag
//! 3. **Reconcile**: sweep unanchored / failed / unverified entities and
//!    re-drive them through the same pipeline
//!
//! Anchoring is asynchronous with respect to the primary record workflow:
//! failures become persisted FAILED rows for reconciliation, never a
//! blocked caller.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod pipeline;
pub mod reconcile;
pub mod reminders;

pub use config::{DaemonConfig, Profile, ReconcileConfig, RetryConfig};
pub use error::{Error, Result};
pub use pipeline::{AnchorPipeline, EnqueueOutcome};
pub use reconcile::{EntitySource, ReconciliationJob, ReconciliationReport};

//! Error types for the anchoring pipeline

use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Error, Debug)]
pub enum Error {
    /// Anchoring core error
    #[error("Core error: {0}")]
    Core(#[from] anchor_core::Error),

    /// Gateway error
    #[error("Gateway error: {0}")]
    Gateway(#[from] ledger_gateway::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// A simulated receipt cannot be verified
    #[error("Simulated receipt is non-authoritative: {0}")]
    SimulatedReceipt(String),

    /// The entity snapshot could not be loaded from the domain store
    #[error("Snapshot unavailable for {0}")]
    SnapshotUnavailable(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

//! Error types for the ledger gateway

use thiserror::Error;

/// Result type for gateway operations
pub type Result<T> = std::result::Result<T, Error>;

/// Gateway errors
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The consensus log rejected or failed the submission
    #[error("Submission failed: {0}")]
    Submission(String),

    /// The mirror returned zero matching transactions
    #[error("No transaction found: {0}")]
    TransactionNotFound(String),

    /// Consensus result present but not valid
    /// (non-SUCCESS result or wrong operation type)
    #[error("Consensus invalid for {transaction_id}: result={result}, name={name}")]
    ConsensusInvalid {
        /// Transaction queried
        transaction_id: String,
        /// Reported result code
        result: String,
        /// Reported operation name
        name: String,
    },

    /// The stored payload no longer hashes to the anchored value
    #[error("Integrity violation: anchored {expected}, recomputed {actual}")]
    IntegrityViolation {
        /// Hash recorded at anchoring time
        expected: String,
        /// Hash of the payload as stored today
        actual: String,
    },

    /// Mirror response could not be interpreted
    #[error("Invalid mirror response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

//! Error types for the anchoring core

use thiserror::Error;

/// Result type for anchoring operations
pub type Result<T> = std::result::Result<T, Error>;

/// Anchoring errors
#[derive(Error, Debug)]
pub enum Error {
    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Content hash is not 64 hex characters
    #[error("Invalid content hash: {0}")]
    InvalidHash(String),

    /// Merkle proof invalid or unbuildable
    #[error("Merkle error: {0}")]
    Merkle(String),

    /// Batch aggregation error
    #[error("Batch error: {0}")]
    Batch(String),

    /// Transaction id already persisted
    #[error("Transaction already recorded: {0}")]
    TransactionExists(String),

    /// Transaction record not found
    #[error("Transaction not found: {0}")]
    TransactionNotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

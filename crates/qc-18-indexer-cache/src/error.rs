//! Error types for the Indexer Cache
//!
//! Every variant is retryable: the cache loop logs it, backs off and runs the
//! next pass. Nothing here terminates the process.

use thiserror::Error;

/// Indexer cache errors
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Store query failed
    #[error("Storage error: {reason}")]
    Storage { reason: String },

    /// Could not open a store transaction
    #[error("Failed to begin transaction: {reason}")]
    TransactionBegin { reason: String },

    /// Store transaction failed to commit
    #[error("Failed to commit transaction: {reason}")]
    TransactionCommit { reason: String },

    /// Stored header could not be encoded or decoded
    #[error("Header codec error: {0}")]
    HeaderCodec(#[from] serde_json::Error),

    /// Only one cache loop may run per cache instance
    #[error("Cache loop already started")]
    LoopAlreadyStarted,

    /// Validator loading limiter was shut down
    #[error("Validator loading limiter closed")]
    ValidatorLoadingClosed,

    /// Finalization must advance one epoch at a time
    #[error("Epoch out of order: expected {expected}, got {actual}")]
    EpochOutOfOrder { expected: i64, actual: u64 },
}

/// Result type for indexer cache operations
pub type IndexerResult<T> = Result<T, IndexerError>;

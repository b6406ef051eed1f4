//! Error types for NestKV
//!
//! Provides a unified error type for all operations.
//!
//! Queue-level push/pop failures are *not* represented here: they are
//! ordinary control flow (backpressure, contention, empty queue) and live as
//! typed results in [`crate::queue`], carrying the rejected element back to
//! the caller.

use thiserror::Error;

/// Result type alias using NestError
pub type Result<T> = std::result::Result<T, NestError>;

/// Unified error type for NestKV operations
#[derive(Debug, Error)]
pub enum NestError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Index Errors
    // -------------------------------------------------------------------------
    /// A rehash could not place every existing key at the doubled capacity.
    ///
    /// Fatal storage fault: the index refuses to commit a partially-rehashed
    /// table. The pre-rehash state is preserved and the error propagates.
    #[error("rehash overflow: key set unplaceable at capacity {capacity}")]
    RehashOverflow { capacity: usize },

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

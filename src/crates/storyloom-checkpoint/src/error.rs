//! Error types for snapshot store operations

use thiserror::Error;

/// Result type for snapshot store operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur while persisting or loading snapshots
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No snapshot exists for the requested thread
    #[error("Snapshot not found for thread: {0}")]
    NotFound(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// A snapshot violated the store's sequencing contract
    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

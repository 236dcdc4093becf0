//! Pipeline-level errors

use storyloom_checkpoint::CheckpointError;
use storyloom_core::EngineError;
use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the engine facade
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The submission itself is unusable
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Engine-level failure
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Snapshot store failure outside the engine (status reads, sweeping)
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),
}

//! Provider error model: transient vs. permanent
//!
//! Every port call can fail. A *transient* failure (timeout, rate limit,
//! service blip) is retried by the adapter layer; a *permanent* failure
//! (schema mismatch, invalid request, retries exhausted) propagates to the
//! calling handler and from there short-circuits the workflow thread.

use storyloom_core::EngineError;
use thiserror::Error;

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors returned by provider ports
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Retryable failure: timeouts, rate limits, transient upstream errors
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Non-retryable failure
    #[error("Permanent provider error: {0}")]
    Permanent(String),

    /// Structured output failed schema validation — always permanent
    #[error("Schema validation failed: {0}")]
    Schema(String),
}

impl ProviderError {
    /// Whether the adapter layer may retry this failure
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transient(_))
    }

    /// Convert retry exhaustion into a permanent error
    pub fn into_permanent(self) -> ProviderError {
        match self {
            ProviderError::Transient(msg) => {
                ProviderError::Permanent(format!("retries exhausted: {}", msg))
            }
            other => other,
        }
    }
}

impl From<ProviderError> for EngineError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Schema(msg) => EngineError::permanent("schema_validation", msg),
            ProviderError::Permanent(msg) => EngineError::permanent("provider", msg),
            ProviderError::Transient(msg) => {
                // A transient error that escapes the adapter layer is treated
                // as exhausted.
                EngineError::permanent("provider", format!("retries exhausted: {}", msg))
            }
        }
    }
}

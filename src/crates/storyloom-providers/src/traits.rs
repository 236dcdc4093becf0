//! Provider port traits
//!
//! Abstract capabilities the workflow consumes, expressed in terms of inputs
//! and guarantees rather than transport. The engine is an orchestration
//! framework, not a model client library: concrete providers (hosted LLM
//! APIs, local models, image/video services, moderation endpoints) implement
//! these traits and are injected at engine construction as
//! `Arc<dyn ...>` trait objects.
//!
//! Design rules:
//!
//! - Ports never leak transport detail (HTTP status codes, SDK types).
//! - Every method can fail; failures are retryable unless the implementation
//!   marks them [`ProviderError::Permanent`]. Retry/backoff lives in the
//!   adapter layer ([`crate::retrying`]), not here and not in the engine.
//! - Structured-output methods take a JSON Schema; a return value that does
//!   not validate is a permanent [`ProviderError::Schema`] failure.
//! - Implementations must be `Send + Sync` — ports are shared across
//!   concurrently executing threads without coordination.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Opaque reference to a stored media artifact (image or video)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MediaRef(pub String);

impl MediaRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text generation model
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Generate free text from a system and user prompt
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;

    /// Generate a structured value conforming to `schema`
    ///
    /// Implementations produce the value; callers (or the retrying adapter)
    /// validate it against the schema and raise a permanent error on
    /// mismatch.
    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
    ) -> Result<Value>;
}

/// Vision analysis model
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Analyze an image and return a structured value conforming to `schema`
    async fn analyze(&self, image: &MediaRef, system_prompt: &str, schema: &Value)
        -> Result<Value>;
}

/// Image generation
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate an image for the prompt and return its reference
    async fn generate(&self, prompt: &str) -> Result<MediaRef>;
}

/// Video generation
///
/// Implementations may poll an upstream job internally; the port hides it.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    /// Generate a video for the prompt and return its reference
    async fn generate(&self, prompt: &str) -> Result<MediaRef>;
}

/// Content moderation
#[async_trait]
pub trait ModerationProvider: Send + Sync {
    /// Return the flagged categories for the text (empty = clean)
    async fn moderate(&self, text: &str) -> Result<Vec<String>>;
}

/// One PII finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiHit {
    /// Kind of PII, e.g. `email`, `phone`
    pub kind: String,
    /// The matched text
    pub matched: String,
}

/// Deterministic PII detection
#[async_trait]
pub trait PiiDetector: Send + Sync {
    /// Return every PII hit in the text; must be deterministic
    async fn scan(&self, text: &str) -> Result<Vec<PiiHit>>;
}

/// Opaque blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key and return the resulting reference
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<MediaRef>;

    /// Fetch the bytes behind a reference
    async fn get(&self, reference: &MediaRef) -> Result<Vec<u8>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    struct EchoModel;

    #[async_trait]
    impl TextModel for EchoModel {
        async fn generate(&self, _system: &str, user: &str) -> Result<String> {
            Ok(user.to_string())
        }

        async fn generate_structured(
            &self,
            _system: &str,
            user: &str,
            _schema: &Value,
        ) -> Result<Value> {
            Ok(serde_json::json!({"echo": user}))
        }
    }

    #[tokio::test]
    async fn test_trait_object_usage() {
        let model: Arc<dyn TextModel> = Arc::new(EchoModel);
        assert_eq!(model.generate("s", "hello").await.unwrap(), "hello");
    }

    #[test]
    fn test_media_ref_display() {
        let reference = MediaRef::new("img://abc");
        assert_eq!(reference.to_string(), "img://abc");
        assert_eq!(reference.as_str(), "img://abc");
    }
}

//! Retrying adapters around provider ports
//!
//! [`Retrying<P>`] decorates any port implementation with bounded
//! exponential-backoff retries for transient failures. Exhausted retries
//! become permanent errors; permanent errors pass through untouched on the
//! first occurrence. Structured-output calls additionally validate the
//! returned value against the requested schema, so a conforming value is the
//! only thing that ever leaves this layer.
//!
//! The engine never retries: by the time an error reaches a node handler it
//! is permanent by definition.
//!
//! ```rust,ignore
//! use storyloom_core::RetryPolicy;
//! use storyloom_providers::retrying::Retrying;
//!
//! let model = Retrying::new(my_model, RetryPolicy::new(3).with_initial_interval(0.2));
//! let text = model.generate("system", "user").await?;
//! ```

use crate::error::Result;
use crate::schema::validate_structured;
use crate::traits::{
    BlobStore, ImageGenerator, MediaRef, ModerationProvider, PiiDetector, PiiHit, TextModel,
    VideoGenerator, VisionModel,
};
use async_trait::async_trait;
use serde_json::Value;
use std::future::Future;
use storyloom_core::RetryPolicy;

/// Decorates a port with transient-failure retries
#[derive(Debug, Clone)]
pub struct Retrying<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P> Retrying<P> {
    /// Wrap a port with the given retry policy
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// The wrapped port
    pub fn inner(&self) -> &P {
        &self.inner
    }
}

/// Run `op` with retries on transient failures per `policy`
async fn retry_call<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && policy.should_retry(attempt + 1) => {
                let delay = policy.calculate_delay(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient provider failure, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err.into_permanent()),
        }
    }
}

#[async_trait]
impl<P: TextModel> TextModel for Retrying<P> {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        retry_call(&self.policy, "text.generate", || {
            self.inner.generate(system_prompt, user_prompt)
        })
        .await
    }

    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        schema: &Value,
    ) -> Result<Value> {
        let value = retry_call(&self.policy, "text.generate_structured", || {
            self.inner
                .generate_structured(system_prompt, user_prompt, schema)
        })
        .await?;
        validate_structured(schema, &value)?;
        Ok(value)
    }
}

#[async_trait]
impl<P: VisionModel> VisionModel for Retrying<P> {
    async fn analyze(
        &self,
        image: &MediaRef,
        system_prompt: &str,
        schema: &Value,
    ) -> Result<Value> {
        let value = retry_call(&self.policy, "vision.analyze", || {
            self.inner.analyze(image, system_prompt, schema)
        })
        .await?;
        validate_structured(schema, &value)?;
        Ok(value)
    }
}

#[async_trait]
impl<P: ImageGenerator> ImageGenerator for Retrying<P> {
    async fn generate(&self, prompt: &str) -> Result<MediaRef> {
        retry_call(&self.policy, "image.generate", || self.inner.generate(prompt)).await
    }
}

#[async_trait]
impl<P: VideoGenerator> VideoGenerator for Retrying<P> {
    async fn generate(&self, prompt: &str) -> Result<MediaRef> {
        retry_call(&self.policy, "video.generate", || self.inner.generate(prompt)).await
    }
}

#[async_trait]
impl<P: ModerationProvider> ModerationProvider for Retrying<P> {
    async fn moderate(&self, text: &str) -> Result<Vec<String>> {
        retry_call(&self.policy, "moderation.moderate", || {
            self.inner.moderate(text)
        })
        .await
    }
}

#[async_trait]
impl<P: PiiDetector> PiiDetector for Retrying<P> {
    async fn scan(&self, text: &str) -> Result<Vec<PiiHit>> {
        retry_call(&self.policy, "pii.scan", || self.inner.scan(text)).await
    }
}

#[async_trait]
impl<P: BlobStore> BlobStore for Retrying<P> {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<MediaRef> {
        retry_call(&self.policy, "blob.put", || {
            self.inner.put(key, bytes.clone())
        })
        .await
    }

    async fn get(&self, reference: &MediaRef) -> Result<Vec<u8>> {
        retry_call(&self.policy, "blob.get", || self.inner.get(reference)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fails with transient errors `failures` times, then succeeds.
    struct Flaky {
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextModel for Flaky {
        async fn generate(&self, _system: &str, _user: &str) -> Result<String> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(ProviderError::Transient("blip".into()))
            } else {
                Ok("ok".into())
            }
        }

        async fn generate_structured(
            &self,
            _system: &str,
            _user: &str,
            _schema: &Value,
        ) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"wrong": true}))
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .with_initial_interval(0.001)
            .with_jitter(false)
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = Retrying::new(
            Flaky {
                failures: 2,
                calls: calls.clone(),
            },
            fast_policy(3),
        );

        assert_eq!(model.generate("s", "u").await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_permanent() {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = Retrying::new(
            Flaky {
                failures: 10,
                calls: calls.clone(),
            },
            fast_policy(2),
        );

        let err = model.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        struct AlwaysPermanent {
            calls: Arc<AtomicUsize>,
        }

        #[async_trait]
        impl ModerationProvider for AlwaysPermanent {
            async fn moderate(&self, _text: &str) -> Result<Vec<String>> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(ProviderError::Permanent("bad request".into()))
            }
        }

        let calls = Arc::new(AtomicUsize::new(0));
        let provider = Retrying::new(
            AlwaysPermanent {
                calls: calls.clone(),
            },
            fast_policy(5),
        );

        assert!(provider.moderate("text").await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_structured_output_is_schema_validated() {
        let model = Retrying::new(
            Flaky {
                failures: 0,
                calls: Arc::new(AtomicUsize::new(0)),
            },
            fast_policy(1),
        );

        let schema = json!({
            "type": "object",
            "required": ["story_text"],
            "properties": {"story_text": {"type": "string"}}
        });
        let err = model.generate_structured("s", "u", &schema).await.unwrap_err();
        assert!(matches!(err, ProviderError::Schema(_)));
    }
}

//! # storyloom-providers — provider ports and adapters
//!
//! The abstract capabilities the story workflow consumes: text and vision
//! models, image and video generation, moderation, PII detection, and blob
//! storage. Concrete providers implement the [`traits`] and are injected at
//! engine construction; the workflow never sees transport detail.
//!
//! The [`retrying`] module supplies the adapter layer: bounded
//! exponential-backoff retries for transient failures and JSON Schema
//! validation of structured output, so handlers only ever observe permanent
//! errors and conforming values. [`testing`] ships deterministic scripted
//! providers for integration tests.

pub mod error;
pub mod pii;
pub mod retrying;
pub mod schema;
pub mod testing;
pub mod traits;

pub use error::{ProviderError, Result};
pub use pii::RegexPiiDetector;
pub use retrying::Retrying;
pub use schema::validate_structured;
pub use traits::{
    BlobStore, ImageGenerator, MediaRef, ModerationProvider, PiiDetector, PiiHit, TextModel,
    VideoGenerator, VisionModel,
};

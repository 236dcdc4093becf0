//! The injected provider bundle
//!
//! All seven ports the workflow consumes, gathered into one struct so node
//! constructors take a single `Arc<Providers>`. Wrap individual ports with
//! [`storyloom_providers::Retrying`] before bundling to give them
//! transient-failure retries.

use std::sync::Arc;
use storyloom_providers::{
    BlobStore, ImageGenerator, ModerationProvider, PiiDetector, TextModel, VideoGenerator,
    VisionModel,
};

/// Every capability the story workflow calls out to
#[derive(Clone)]
pub struct Providers {
    pub text: Arc<dyn TextModel>,
    pub vision: Arc<dyn VisionModel>,
    pub image: Arc<dyn ImageGenerator>,
    pub video: Arc<dyn VideoGenerator>,
    pub moderation: Arc<dyn ModerationProvider>,
    pub pii: Arc<dyn PiiDetector>,
    pub blobs: Arc<dyn BlobStore>,
}

//! # storyloom-pipeline — the illustrated story workflow
//!
//! The fixed workflow that turns a prompt into a reviewed, published
//! children's story: input moderation, story writing, parallel media
//! prompting and generation, the multi-layer guardrail cascade with
//! regenerate-once retries, aggregation, human-review suspension, and
//! terminal publication — all executed on the `storyloom-core` engine with
//! durable snapshots in a `storyloom-checkpoint` store.
//!
//! Entry point is [`StoryEngine`]:
//!
//! ```rust,ignore
//! use storyloom_pipeline::{JobOutcome, PipelineConfig, Providers, ReviewDecision, StoryEngine};
//! use storyloom_pipeline::state::StoryRequest;
//! use storyloom_checkpoint::InMemorySnapshotStore;
//! use std::sync::Arc;
//!
//! let engine = StoryEngine::new(providers, Arc::new(InMemorySnapshotStore::new()),
//!     PipelineConfig::default());
//!
//! match engine.submit("job-42", &request).await? {
//!     JobOutcome::AwaitingReview { payload } => {
//!         // hand payload to the review UI, later:
//!         engine.resume("job-42", &ReviewDecision::approved("reviewer-1")).await?;
//!     }
//!     other => println!("{:?}", other),
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod guardrail;
pub mod nodes;
pub mod providers;
pub mod state;
pub mod workflow;

pub use config::{AgeGroup, PipelineConfig};
pub use engine::{JobOutcome, JobStatus, ReviewDecision, StoryEngine};
pub use error::{PipelineError, Result};
pub use guardrail::{AggregateOutcome, MediaBinding, Severity, Violation};
pub use providers::Providers;
pub use state::StoryRequest;
pub use workflow::build_story_graph;

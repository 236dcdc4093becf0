//! Story workflow state: field names, merge schema, and the submission shape
//!
//! Scalar fields are last-writer-wins and each is written by exactly one
//! node. Reducer fields collect contributions from parallel workers; every
//! record they hold carries its own `index` so downstream consumers sort
//! explicitly instead of relying on arrival order.

use crate::config::AgeGroup;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use storyloom_core::state::{AppendReducer, StateSchema};

// Scalar fields
pub const JOB_ID: &str = "job_id";
pub const PROMPT: &str = "prompt";
pub const AGE_GROUP: &str = "age_group";
pub const NUM_ILLUSTRATIONS: &str = "num_illustrations";
pub const NUM_VIDEOS: &str = "num_videos";
pub const STORY_TEXT: &str = "story_text";
pub const STORY_TITLE: &str = "story_title";
pub const IMAGE_PROMPTS: &str = "image_prompts";
pub const VIDEO_PROMPTS: &str = "video_prompts";
pub const EVALUATION_SCORES: &str = "evaluation_scores";
pub const GUARDRAIL_PASSED: &str = "guardrail_passed";
pub const GUARDRAIL_SUMMARY: &str = "guardrail_summary";
pub const HARD_VIOLATIONS: &str = "hard_violations";
pub const SOFT_VIOLATIONS: &str = "soft_violations";
pub const INPUT_FLAGGED: &str = "input_flagged";
pub const REVIEW_DECISION: &str = "review_decision";
pub const JOB_STATUS: &str = "job_status";

// Canonical media url lists (scalar; written by assembler, finalized by the
// aggregator)
pub const IMAGE_URLS: &str = "image_urls";
pub const VIDEO_URLS: &str = "video_urls";

// Reducer fields (append-only)
pub const IMAGE_METADATA: &str = "image_metadata";
pub const VIDEO_METADATA: &str = "video_metadata";
pub const GUARDRAIL_VIOLATIONS: &str = "guardrail_violations";
pub const MEDIA_BINDINGS: &str = "media_bindings";

// Transient per-dispatch fields (overlay-only, never persisted)
pub const T_INDEX: &str = "_index";
pub const T_PROMPT: &str = "_prompt";
pub const T_URL: &str = "_url";

/// Build the merge schema for the story workflow
///
/// The canonical url lists are scalars: they have single sequential writers
/// (the assembler, then the aggregator finalizing post-retry refs). Fan-out
/// contributions arrive through the metadata/bindings/violations reducers.
pub fn story_schema() -> StateSchema {
    let mut schema = StateSchema::new();
    for field in [
        IMAGE_METADATA,
        VIDEO_METADATA,
        GUARDRAIL_VIOLATIONS,
        MEDIA_BINDINGS,
    ] {
        schema.add_field(field, Box::new(AppendReducer));
    }
    // Scalars use the default overwrite rule.
    schema
}

/// One story generation submission
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryRequest {
    pub job_id: String,
    pub prompt: String,
    pub age_group: AgeGroup,
    pub num_illustrations: u32,
    #[serde(default)]
    pub num_videos: u32,
}

impl StoryRequest {
    /// The initial workflow state for this submission
    pub fn initial_state(&self) -> Value {
        json!({
            JOB_ID: self.job_id,
            PROMPT: self.prompt,
            AGE_GROUP: self.age_group,
            NUM_ILLUSTRATIONS: self.num_illustrations,
            NUM_VIDEOS: self.num_videos,
            JOB_STATUS: "QUEUED",
            IMAGE_URLS: [],
            VIDEO_URLS: [],
            IMAGE_METADATA: [],
            VIDEO_METADATA: [],
            GUARDRAIL_VIOLATIONS: [],
            MEDIA_BINDINGS: [],
        })
    }
}

/// Read the age group out of workflow state, defaulting conservatively to
/// the youngest band when absent or malformed
pub fn age_group_of(state: &Value) -> AgeGroup {
    state[AGE_GROUP]
        .as_str()
        .and_then(AgeGroup::parse)
        .unwrap_or(AgeGroup::Preschool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_shape() {
        let request = StoryRequest {
            job_id: "job-1".to_string(),
            prompt: "a mouse finds cheese".to_string(),
            age_group: AgeGroup::EarlyReader,
            num_illustrations: 2,
            num_videos: 0,
        };
        let state = request.initial_state();

        assert_eq!(state[PROMPT], json!("a mouse finds cheese"));
        assert_eq!(state[AGE_GROUP], json!("6-8"));
        assert_eq!(state[JOB_STATUS], json!("QUEUED"));
        assert_eq!(state[GUARDRAIL_VIOLATIONS], json!([]));
    }

    #[test]
    fn test_schema_reducer_fields() {
        let schema = story_schema();
        assert!(schema.is_reducer_field(GUARDRAIL_VIOLATIONS));
        assert!(schema.is_reducer_field(MEDIA_BINDINGS));
        assert!(schema.is_reducer_field(IMAGE_METADATA));
        assert!(!schema.is_reducer_field(STORY_TEXT));
        assert!(!schema.is_reducer_field(IMAGE_URLS));
    }

    #[test]
    fn test_age_group_of_defaults_to_youngest() {
        assert_eq!(age_group_of(&json!({AGE_GROUP: "9-12"})), AgeGroup::MiddleGrade);
        assert_eq!(age_group_of(&json!({})), AgeGroup::Preschool);
        assert_eq!(age_group_of(&json!({AGE_GROUP: "unknown"})), AgeGroup::Preschool);
    }
}

//! Node handlers for the story workflow
//!
//! Each constructor closes over the injected [`Providers`] and
//! [`PipelineConfig`] and returns a [`NodeSpec`] for the graph. Handlers are
//! pure with respect to state: they read their context view and return a
//! patch; routing decisions live in the workflow's edges, not here.

use crate::config::PipelineConfig;
use crate::guardrail::{self, media, text};
use crate::providers::Providers;
use crate::state::{self, age_group_of};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use storyloom_core::node::{NodeKind, NodeOutput, NodeSpec};
use storyloom_core::{EngineError, Result};
use storyloom_providers::{BlobStore, ImageGenerator, TextModel, VideoGenerator};

// Node names
pub const INPUT_MODERATOR: &str = "input_moderator";
pub const STORY_WRITER: &str = "story_writer";
pub const IMAGE_PROMPTER: &str = "image_prompter";
pub const VIDEO_PROMPTER: &str = "video_prompter";
pub const GENERATE_SINGLE_IMAGE: &str = "generate_single_image";
pub const GENERATE_SINGLE_VIDEO: &str = "generate_single_video";
pub const ASSEMBLER: &str = "assembler";
pub const STORY_EVALUATOR: &str = "story_evaluator";
pub const STORY_GUARDRAIL: &str = "story_guardrail";
pub const IMAGE_GUARDRAIL: &str = "image_guardrail";
pub const VIDEO_GUARDRAIL: &str = "video_guardrail";
pub const GUARDRAIL_AGGREGATOR: &str = "guardrail_aggregator";
pub const HUMAN_REVIEW_GATE: &str = "human_review_gate";
pub const PUBLISHER: &str = "publisher";
pub const MARK_REJECTED: &str = "mark_rejected";
pub const MARK_AUTO_REJECTED: &str = "mark_auto_rejected";

const STORY_WRITER_SYSTEM: &str = "You are a children's story writer. Write a warm, \
    age-appropriate story with a clear arc and a title. Answer in the requested JSON shape.";

const IMAGE_PROMPTER_SYSTEM: &str = "You are an illustration prompt writer for children's \
    books. Produce one self-contained illustration prompt per requested scene.";

const VIDEO_PROMPTER_SYSTEM: &str = "You are a video prompt writer for short children's \
    story clips. Produce one self-contained video prompt per requested clip.";

const STORY_EVALUATOR_SYSTEM: &str = "You are a children's story evaluator. Score the story \
    from 0 to 10 on moral clarity, theme fit, emotional resonance, age appropriateness, and \
    educational value.";

fn story_response_schema() -> Value {
    json!({
        "type": "object",
        "required": ["story_text", "story_title"],
        "properties": {
            "story_text": {"type": "string", "minLength": 1},
            "story_title": {"type": "string", "minLength": 1}
        }
    })
}

fn prompt_list_schema() -> Value {
    json!({
        "type": "object",
        "required": ["prompts"],
        "properties": {
            "prompts": {"type": "array", "items": {"type": "string"}}
        }
    })
}

fn evaluation_schema() -> Value {
    json!({
        "type": "object",
        "required": ["moral", "theme", "emotional", "age", "educational"],
        "properties": {
            "moral": {"type": "number"},
            "theme": {"type": "number"},
            "emotional": {"type": "number"},
            "age": {"type": "number"},
            "educational": {"type": "number"}
        }
    })
}

fn encode<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| EngineError::Execution(format!("state serialization failed: {}", e)))
}

fn str_field(state: &Value, field: &str) -> String {
    state[field].as_str().unwrap_or_default().to_string()
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Runs the moderation layer on the raw user prompt
///
/// A flagged prompt is a normal routing outcome (auto-rejection), not an
/// error, so the finding lands in state for the router to read.
pub fn input_moderator(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(INPUT_MODERATOR, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let prompt = str_field(&ctx.state, state::PROMPT);
            let violations =
                text::moderation_layer(&providers, &prompt, INPUT_MODERATOR).await?;
            let flagged = !violations.is_empty();
            Ok(NodeOutput::Patch(json!({
                "input_flagged": flagged,
                "guardrail_violations": encode(&violations)?,
                "job_status": "RUNNING",
            })))
        })
    })
}

pub fn story_writer(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(STORY_WRITER, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let prompt = str_field(&ctx.state, state::PROMPT);
            let age = age_group_of(&ctx.state);
            let user = format!("Ages {}. Story idea: {}", age.as_str(), prompt);
            let story = providers
                .text
                .generate_structured(STORY_WRITER_SYSTEM, &user, &story_response_schema())
                .await?;
            Ok(NodeOutput::Patch(json!({
                "story_text": story["story_text"],
                "story_title": story["story_title"],
            })))
        })
    })
}

pub fn image_prompter(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(IMAGE_PROMPTER, NodeKind::FanOutSource, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let count = ctx.state[state::NUM_ILLUSTRATIONS].as_u64().unwrap_or(0);
            if count == 0 {
                return Ok(NodeOutput::Patch(json!({"image_prompts": []})));
            }
            let story = str_field(&ctx.state, state::STORY_TEXT);
            let user = format!("Story:\n{}\n\nWrite {} illustration prompts.", story, count);
            let value = providers
                .text
                .generate_structured(IMAGE_PROMPTER_SYSTEM, &user, &prompt_list_schema())
                .await?;
            Ok(NodeOutput::Patch(json!({
                "image_prompts": value["prompts"],
            })))
        })
    })
}

pub fn video_prompter(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(VIDEO_PROMPTER, NodeKind::FanOutSource, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let count = ctx.state[state::NUM_VIDEOS].as_u64().unwrap_or(0);
            if count == 0 {
                return Ok(NodeOutput::Patch(json!({"video_prompts": []})));
            }
            let story = str_field(&ctx.state, state::STORY_TEXT);
            let user = format!("Story:\n{}\n\nWrite {} video prompts.", story, count);
            let value = providers
                .text
                .generate_structured(VIDEO_PROMPTER_SYSTEM, &user, &prompt_list_schema())
                .await?;
            Ok(NodeOutput::Patch(json!({
                "video_prompts": value["prompts"],
            })))
        })
    })
}

/// One fan-out dispatch unit: generates a single image and appends its
/// metadata record
pub fn generate_single_image(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(GENERATE_SINGLE_IMAGE, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let index = ctx.state[state::T_INDEX].as_u64().unwrap_or(0);
            let prompt = str_field(&ctx.state, state::T_PROMPT);
            let reference = providers.image.generate(&prompt).await?;
            Ok(NodeOutput::Patch(json!({
                "image_metadata": [{
                    "index": index,
                    "prompt": prompt,
                    "url": reference.as_str(),
                }],
            })))
        })
    })
}

pub fn generate_single_video(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(GENERATE_SINGLE_VIDEO, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let index = ctx.state[state::T_INDEX].as_u64().unwrap_or(0);
            let prompt = str_field(&ctx.state, state::T_PROMPT);
            let reference = providers.video.generate(&prompt).await?;
            Ok(NodeOutput::Patch(json!({
                "video_metadata": [{
                    "index": index,
                    "prompt": prompt,
                    "url": reference.as_str(),
                }],
            })))
        })
    })
}

fn ordered_urls(metadata: &Value, expected: usize, kind: &str) -> Result<Vec<String>> {
    let mut entries: Vec<Value> = metadata.as_array().cloned().unwrap_or_default();
    if entries.len() != expected {
        return Err(EngineError::permanent(
            "assembler_count_mismatch",
            format!(
                "expected {} {} artifacts, found {}",
                expected,
                kind,
                entries.len()
            ),
        ));
    }
    entries.sort_by_key(|e| e["index"].as_u64().unwrap_or(0));
    Ok(entries
        .iter()
        .map(|e| e["url"].as_str().unwrap_or_default().to_string())
        .collect())
}

/// Fan-in of all media generators: validates counts, orders artifacts by
/// index, copies the canonical url lists, and persists the media manifest
pub fn assembler(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(ASSEMBLER, NodeKind::FanInSink, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let image_expected = string_list(&ctx.state[state::IMAGE_PROMPTS]).len();
            let video_expected = string_list(&ctx.state[state::VIDEO_PROMPTS]).len();

            let image_urls =
                ordered_urls(&ctx.state[state::IMAGE_METADATA], image_expected, "image")?;
            let video_urls =
                ordered_urls(&ctx.state[state::VIDEO_METADATA], video_expected, "video")?;

            let job_id = str_field(&ctx.state, state::JOB_ID);
            let manifest = json!({
                "job_id": job_id,
                "images": image_urls,
                "videos": video_urls,
            });
            let bytes = serde_json::to_vec(&manifest)
                .map_err(|e| EngineError::Execution(format!("manifest encoding failed: {}", e)))?;
            providers
                .blobs
                .put(&format!("manifest/{}", job_id), bytes)
                .await?;

            Ok(NodeOutput::Patch(json!({
                "image_urls": image_urls,
                "video_urls": video_urls,
            })))
        })
    })
}

pub fn story_evaluator(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(STORY_EVALUATOR, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let story = str_field(&ctx.state, state::STORY_TEXT);
            let age = age_group_of(&ctx.state);
            let user = format!("Ages {}.\n\n{}", age.as_str(), story);
            let scores = providers
                .text
                .generate_structured(STORY_EVALUATOR_SYSTEM, &user, &evaluation_schema())
                .await?;
            Ok(NodeOutput::Patch(json!({"evaluation_scores": scores})))
        })
    })
}

pub fn story_guardrail(providers: Arc<Providers>, config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(STORY_GUARDRAIL, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        let config = config.clone();
        Box::pin(async move {
            let story = str_field(&ctx.state, state::STORY_TEXT);
            let age = age_group_of(&ctx.state);
            let violations =
                text::run_text_cascade(&providers, &config, age, &story, STORY_GUARDRAIL).await?;
            Ok(NodeOutput::Patch(json!({
                "guardrail_violations": encode(&violations)?,
            })))
        })
    })
}

/// Per-image guardrail dispatch unit; applies the regenerate-once retry
pub fn image_guardrail(providers: Arc<Providers>, config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(IMAGE_GUARDRAIL, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        let config = config.clone();
        Box::pin(async move {
            let index = ctx.state[state::T_INDEX].as_u64().unwrap_or(0);
            let prompt = str_field(&ctx.state, state::T_PROMPT);
            let url = str_field(&ctx.state, state::T_URL);
            let (violations, binding) =
                media::image_guardrail(&providers, &config, index, &prompt, &url).await?;
            Ok(NodeOutput::Patch(json!({
                "guardrail_violations": encode(&violations)?,
                "media_bindings": [encode(&binding)?],
            })))
        })
    })
}

/// Per-video guardrail dispatch unit; prompt-only text cascade with one
/// re-run
pub fn video_guardrail(providers: Arc<Providers>, config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(VIDEO_GUARDRAIL, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        let config = config.clone();
        Box::pin(async move {
            let index = ctx.state[state::T_INDEX].as_u64().unwrap_or(0);
            let prompt = str_field(&ctx.state, state::T_PROMPT);
            let url = str_field(&ctx.state, state::T_URL);
            let age = age_group_of(&ctx.state);
            let (violations, binding) =
                media::video_guardrail(&providers, &config, age, index, &prompt, &url).await?;
            Ok(NodeOutput::Patch(json!({
                "guardrail_violations": encode(&violations)?,
                "media_bindings": [encode(&binding)?],
            })))
        })
    })
}

fn finalize_urls(current: &Value, bindings: &[guardrail::MediaBinding], kind: &str) -> Vec<String> {
    let mut urls = string_list(current);
    for binding in bindings.iter().filter(|b| b.kind == kind) {
        if let Some(slot) = urls.get_mut(binding.index as usize) {
            *slot = binding.url.clone();
        }
    }
    urls
}

/// Fan-in of the evaluation cluster: derives the aggregate pass flag,
/// summary, and hard/soft partitions from the accumulated history, and
/// finalizes the canonical url lists with any regenerated artifacts
pub fn guardrail_aggregator(_providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(GUARDRAIL_AGGREGATOR, NodeKind::FanInSink, move |ctx| {
        Box::pin(async move {
            let violations =
                guardrail::violations_from_state(&ctx.state[state::GUARDRAIL_VIOLATIONS]);
            let bindings = guardrail::bindings_from_state(&ctx.state[state::MEDIA_BINDINGS]);
            let outcome = guardrail::aggregate(&violations, &bindings);

            let image_urls = finalize_urls(&ctx.state[state::IMAGE_URLS], &bindings, "image");
            let video_urls = finalize_urls(&ctx.state[state::VIDEO_URLS], &bindings, "video");

            Ok(NodeOutput::Patch(json!({
                "guardrail_passed": outcome.guardrail_passed,
                "guardrail_summary": outcome.guardrail_summary,
                "hard_violations": encode(&outcome.hard)?,
                "soft_violations": encode(&outcome.soft)?,
                "image_urls": image_urls,
                "video_urls": video_urls,
            })))
        })
    })
}

/// Suspension-enabled review gate
///
/// First entry builds the review payload and suspends; the resumed entry
/// records the decision value for the router.
pub fn human_review_gate(_providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    NodeSpec::new(HUMAN_REVIEW_GATE, NodeKind::Linear, move |ctx| {
        Box::pin(async move {
            match ctx.resume {
                None => {
                    let payload = json!({
                        "job_id": ctx.state[state::JOB_ID],
                        "prompt": ctx.state[state::PROMPT],
                        "age_group": ctx.state[state::AGE_GROUP],
                        "story_title": ctx.state[state::STORY_TITLE],
                        "story_text": ctx.state[state::STORY_TEXT],
                        "evaluation_scores": ctx.state[state::EVALUATION_SCORES],
                        "guardrail_summary": ctx.state[state::GUARDRAIL_SUMMARY],
                        "violations": ctx.state[state::GUARDRAIL_VIOLATIONS],
                        "image_urls": ctx.state[state::IMAGE_URLS],
                        "video_urls": ctx.state[state::VIDEO_URLS],
                    });
                    Ok(NodeOutput::Suspend(payload))
                }
                Some(decision) => Ok(NodeOutput::Patch(json!({
                    "job_status": "RUNNING",
                    "review_decision": decision,
                }))),
            }
        })
    })
}

fn terminal_node(name: &'static str, status: &'static str, providers: Arc<Providers>) -> NodeSpec {
    NodeSpec::new(name, NodeKind::Linear, move |ctx| {
        let providers = providers.clone();
        Box::pin(async move {
            let job_id = str_field(&ctx.state, state::JOB_ID);
            let record = json!({
                "job_id": job_id,
                "status": status,
                "review_decision": ctx.state[state::REVIEW_DECISION],
                "guardrail_summary": ctx.state[state::GUARDRAIL_SUMMARY],
            });
            let bytes = serde_json::to_vec(&record)
                .map_err(|e| EngineError::Execution(format!("status encoding failed: {}", e)))?;
            providers
                .blobs
                .put(&format!("jobs/{}/status", job_id), bytes)
                .await?;
            Ok(NodeOutput::Patch(json!({"job_status": status})))
        })
    })
}

/// Terminal: the approved story is published
pub fn publisher(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    terminal_node(PUBLISHER, "COMPLETED", providers)
}

/// Terminal: the reviewer declined the story
pub fn mark_rejected(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    terminal_node(MARK_REJECTED, "REJECTED", providers)
}

/// Terminal: guardrails rejected the story without review
pub fn mark_auto_rejected(providers: Arc<Providers>, _config: Arc<PipelineConfig>) -> NodeSpec {
    terminal_node(MARK_AUTO_REJECTED, "AUTO_REJECTED", providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyloom_core::cancel::cancel_pair;
    use storyloom_core::node::NodeContext;
    use storyloom_providers::testing::{
        MemoryBlobStore, ScriptedImageGenerator, ScriptedModeration, ScriptedTextModel,
        ScriptedVideoGenerator, ScriptedVisionModel,
    };
    use storyloom_providers::RegexPiiDetector;

    fn test_providers() -> Arc<Providers> {
        Arc::new(Providers {
            text: Arc::new(ScriptedTextModel::new()),
            vision: Arc::new(ScriptedVisionModel::new()),
            image: Arc::new(ScriptedImageGenerator::new()),
            video: Arc::new(ScriptedVideoGenerator::new()),
            moderation: Arc::new(ScriptedModeration::new()),
            pii: Arc::new(RegexPiiDetector::build().expect("patterns compile")),
            blobs: Arc::new(MemoryBlobStore::new()),
        })
    }

    fn ctx(state: Value, resume: Option<Value>) -> NodeContext {
        let (_handle, cancel) = cancel_pair();
        NodeContext {
            state,
            resume,
            cancel,
        }
    }

    #[tokio::test]
    async fn test_review_gate_suspends_then_records_decision() {
        let spec = human_review_gate(test_providers(), Arc::new(PipelineConfig::default()));

        let first = (spec.handler)(ctx(
            json!({"job_id": "j", "story_title": "T", "guardrail_violations": []}),
            None,
        ))
        .await
        .unwrap();
        let NodeOutput::Suspend(payload) = first else {
            panic!("expected suspension on first entry");
        };
        assert_eq!(payload["story_title"], json!("T"));

        let second = (spec.handler)(ctx(
            json!({"job_id": "j"}),
            Some(json!({"decision": "approved", "reviewer_id": "r-1"})),
        ))
        .await
        .unwrap();
        let NodeOutput::Patch(patch) = second else {
            panic!("expected patch on resumed entry");
        };
        assert_eq!(patch["review_decision"]["decision"], json!("approved"));
    }

    #[tokio::test]
    async fn test_assembler_orders_by_index_and_writes_manifest() {
        let providers = test_providers();
        let spec = assembler(providers.clone(), Arc::new(PipelineConfig::default()));

        // Metadata arrives in reverse completion order.
        let state = json!({
            "job_id": "j-1",
            "image_prompts": ["p0", "p1"],
            "video_prompts": [],
            "image_metadata": [
                {"index": 1, "prompt": "p1", "url": "img://p1#0"},
                {"index": 0, "prompt": "p0", "url": "img://p0#0"},
            ],
            "video_metadata": [],
        });

        let output = (spec.handler)(ctx(state, None)).await.unwrap();
        let NodeOutput::Patch(patch) = output else {
            panic!("expected patch");
        };
        assert_eq!(patch["image_urls"], json!(["img://p0#0", "img://p1#0"]));
    }

    #[tokio::test]
    async fn test_assembler_count_mismatch_is_permanent() {
        let spec = assembler(test_providers(), Arc::new(PipelineConfig::default()));
        let state = json!({
            "job_id": "j-1",
            "image_prompts": ["p0", "p1"],
            "video_prompts": [],
            "image_metadata": [{"index": 0, "prompt": "p0", "url": "img://p0#0"}],
            "video_metadata": [],
        });

        let err = (spec.handler)(ctx(state, None)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Permanent { ref kind, .. } if kind == "assembler_count_mismatch"
        ));
    }

    #[tokio::test]
    async fn test_prompters_skip_model_for_zero_count() {
        let providers = test_providers();
        let spec = video_prompter(providers.clone(), Arc::new(PipelineConfig::default()));

        let output = (spec.handler)(ctx(json!({"num_videos": 0}), None))
            .await
            .unwrap();
        let NodeOutput::Patch(patch) = output else {
            panic!("expected patch");
        };
        assert_eq!(patch["video_prompts"], json!([]));
    }
}

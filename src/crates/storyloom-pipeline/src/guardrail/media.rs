//! Media guardrails: vision checks with a regenerate-once retry
//!
//! Images get a single-stage vision check over four category confidences; a
//! confidence at or above the configured threshold is a hard violation.
//! Videos are checked through the text cascade over their generation prompt
//! only (frame sampling is a declared extension point, not implemented).
//!
//! Retry rule: on any hard violation the artifact is regenerated **once**
//! from the original prompt and re-checked (for videos, the cascade is
//! re-run — the analysis layer is a model call and can flip). A second hard
//! failure raises the permanent `media_guardrail_exhausted` error, which
//! terminates the whole thread through the failure path. All attempts'
//! violations stay in the history; the returned [`MediaBinding`] records the
//! final artifact and outcome.

use super::{media_source, text::run_text_cascade, MediaBinding, Severity, Violation};
use crate::config::{AgeGroup, PipelineConfig};
use crate::providers::Providers;
use serde_json::{json, Value};
use storyloom_core::{EngineError, Result};
use storyloom_providers::{ImageGenerator, MediaRef, VisionModel};

/// System prompt for the image safety check
pub const IMAGE_CHECK_SYSTEM: &str = "You are an illustration safety checker for children's \
    books. For the given image, report your confidence from 0 to 1 that it contains nsfw \
    content, a weapon, a photorealistic child, or horror elements.";

/// Response schema for the image safety check
pub fn image_check_schema() -> Value {
    json!({
        "type": "object",
        "required": ["nsfw", "weapon", "realistic_child", "horror_elements"],
        "properties": {
            "nsfw": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "weapon": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "realistic_child": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "horror_elements": {"type": "number", "minimum": 0.0, "maximum": 1.0}
        }
    })
}

const IMAGE_CATEGORIES: [&str; 4] = ["nsfw", "weapon", "realistic_child", "horror_elements"];

/// Run the vision check on one image; any category at or above the
/// confidence threshold yields a hard violation
pub async fn check_image(
    providers: &Providers,
    config: &PipelineConfig,
    image: &MediaRef,
    source: &str,
) -> Result<Vec<Violation>> {
    let report = providers
        .vision
        .analyze(image, IMAGE_CHECK_SYSTEM, &image_check_schema())
        .await?;

    let mut violations = Vec::new();
    for category in IMAGE_CATEGORIES {
        let confidence = report[category].as_f64().unwrap_or(0.0);
        if confidence >= config.vision_confidence_threshold {
            violations.push(Violation::hard(
                category,
                format!("{} confidence {:.2} in {}", category, confidence, image),
                source,
            ));
        }
    }
    Ok(violations)
}

/// Image guardrail with the regenerate-once retry
///
/// Returns the full violation history across attempts plus the final
/// binding. Raises `media_guardrail_exhausted` when the retry budget is
/// spent and the last attempt still has hard violations.
pub async fn image_guardrail(
    providers: &Providers,
    config: &PipelineConfig,
    index: u64,
    prompt: &str,
    url: &str,
) -> Result<(Vec<Violation>, MediaBinding)> {
    let source = media_source("image", index);
    let mut current = MediaRef::new(url);
    let mut history = Vec::new();
    let mut attempts: u32 = 0;

    loop {
        let found = check_image(providers, config, &current, &source).await?;
        attempts += 1;
        let clean = !found.iter().any(|v| v.severity == Severity::Hard);
        history.extend(found);

        if clean {
            return Ok((
                history,
                MediaBinding {
                    kind: "image".to_string(),
                    index,
                    url: current.as_str().to_string(),
                    attempts,
                    passed: true,
                },
            ));
        }

        if attempts > config.media_retry_max {
            return Err(EngineError::permanent(
                "media_guardrail_exhausted",
                format!(
                    "image {} still has hard violations after {} attempts",
                    index, attempts
                ),
            ));
        }

        // Regenerate from the original prompt and re-check.
        tracing::info!(index, prompt, "regenerating flagged image");
        current = providers.image.generate(prompt).await?;
    }
}

/// Video guardrail: the text cascade over the generation prompt, re-run once
/// on hard violations
pub async fn video_guardrail(
    providers: &Providers,
    config: &PipelineConfig,
    age: AgeGroup,
    index: u64,
    prompt: &str,
    url: &str,
) -> Result<(Vec<Violation>, MediaBinding)> {
    let source = media_source("video", index);
    let mut history = Vec::new();
    let mut attempts: u32 = 0;

    loop {
        let found = run_text_cascade(providers, config, age, prompt, &source).await?;
        attempts += 1;
        let clean = !found.iter().any(|v| v.severity == Severity::Hard);
        history.extend(found);

        if clean {
            return Ok((
                history,
                MediaBinding {
                    kind: "video".to_string(),
                    index,
                    url: url.to_string(),
                    attempts,
                    passed: true,
                },
            ));
        }

        if attempts > config.media_retry_max {
            return Err(EngineError::permanent(
                "media_guardrail_exhausted",
                format!(
                    "video prompt {} still has hard violations after {} attempts",
                    index, attempts
                ),
            ));
        }
    }
}

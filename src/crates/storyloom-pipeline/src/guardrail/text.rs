//! The three-layer text cascade
//!
//! L0 consults the moderation port (any flagged category is a hard
//! violation), L1 runs the deterministic PII detector (any hit is a hard
//! `pii_<kind>` violation), and L2 asks the text model for a structured
//! content analysis that is scored against the age group's thresholds:
//! violence at or above the hard threshold blocks; fear at or above its
//! threshold, brand mentions, and political/religious content are soft
//! findings surfaced to the reviewer.

use super::Violation;
use crate::config::{AgeGroup, PipelineConfig};
use crate::providers::Providers;
use serde_json::{json, Value};
use storyloom_core::Result;
use storyloom_providers::{ModerationProvider, PiiDetector, TextModel};

/// System prompt for the L2 content analysis call
pub const CONTENT_ANALYSIS_SYSTEM: &str = "You are a children's content analyst. Score the \
    text for violence severity and fear intensity on a 0 to 1 scale, list any brand \
    mentions, and flag political or religious content. Answer in the requested JSON shape.";

/// Response schema for the L2 content analysis call
pub fn content_analysis_schema() -> Value {
    json!({
        "type": "object",
        "required": [
            "violence_severity",
            "fear_intensity",
            "brand_mentions",
            "political_detected",
            "religious_detected",
            "explanation"
        ],
        "properties": {
            "violence_severity": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "fear_intensity": {"type": "number", "minimum": 0.0, "maximum": 1.0},
            "brand_mentions": {"type": "array", "items": {"type": "string"}},
            "political_detected": {"type": "boolean"},
            "religious_detected": {"type": "boolean"},
            "explanation": {"type": "string"}
        }
    })
}

/// L0: moderation port, hard violation per flagged category
pub async fn moderation_layer(
    providers: &Providers,
    text: &str,
    source: &str,
) -> Result<Vec<Violation>> {
    let flagged = providers.moderation.moderate(text).await?;
    Ok(flagged
        .into_iter()
        .map(|category| {
            Violation::hard(
                category.clone(),
                format!("moderation flagged '{}'", category),
                source,
            )
        })
        .collect())
}

/// L1: PII detection, hard `pii_<kind>` violation per hit
pub async fn pii_layer(
    providers: &Providers,
    text: &str,
    source: &str,
) -> Result<Vec<Violation>> {
    let hits = providers.pii.scan(text).await?;
    Ok(hits
        .into_iter()
        .map(|hit| {
            Violation::hard(
                format!("pii_{}", hit.kind),
                format!("detected {}: {}", hit.kind, hit.matched),
                source,
            )
        })
        .collect())
}

/// L2: model-based content analysis scored against age thresholds
pub async fn analysis_layer(
    providers: &Providers,
    config: &PipelineConfig,
    age: AgeGroup,
    text: &str,
    source: &str,
) -> Result<Vec<Violation>> {
    let analysis = providers
        .text
        .generate_structured(CONTENT_ANALYSIS_SYSTEM, text, &content_analysis_schema())
        .await?;

    let mut violations = Vec::new();

    let violence = analysis["violence_severity"].as_f64().unwrap_or(0.0);
    if violence >= config.violence_hard_threshold(age) {
        violations.push(Violation::hard(
            "violence",
            format!(
                "violence severity {:.2} at or above {:.2} for ages {}",
                violence,
                config.violence_hard_threshold(age),
                age.as_str()
            ),
            source,
        ));
    }

    let fear = analysis["fear_intensity"].as_f64().unwrap_or(0.0);
    if fear >= config.fear_threshold(age) {
        violations.push(Violation::soft(
            "fear",
            format!(
                "fear intensity {:.2} at or above {:.2} for ages {}",
                fear,
                config.fear_threshold(age),
                age.as_str()
            ),
            source,
        ));
    }

    if let Some(brands) = analysis["brand_mentions"].as_array() {
        if !brands.is_empty() {
            let names: Vec<String> = brands
                .iter()
                .filter_map(|b| b.as_str().map(str::to_string))
                .collect();
            violations.push(Violation::soft(
                "brand_mentions",
                format!("brands mentioned: {}", names.join(", ")),
                source,
            ));
        }
    }

    if analysis["political_detected"].as_bool().unwrap_or(false) {
        violations.push(Violation::soft("political", "political content detected", source));
    }
    if analysis["religious_detected"].as_bool().unwrap_or(false) {
        violations.push(Violation::soft("religious", "religious content detected", source));
    }

    Ok(violations)
}

/// Run all three layers and concatenate their findings
pub async fn run_text_cascade(
    providers: &Providers,
    config: &PipelineConfig,
    age: AgeGroup,
    text: &str,
    source: &str,
) -> Result<Vec<Violation>> {
    let mut violations = moderation_layer(providers, text, source).await?;
    violations.extend(pii_layer(providers, text, source).await?);
    violations.extend(analysis_layer(providers, config, age, text, source).await?);
    Ok(violations)
}

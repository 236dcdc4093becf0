//! Multi-layer content guardrails
//!
//! Three cascades feed one aggregation:
//!
//! - **Text** ([`text`]): L0 moderation → L1 PII → L2 model-based content
//!   analysis scored against age-group thresholds. Used for the user prompt
//!   (L0 only), the story, and every video prompt.
//! - **Images** ([`media`]): single-stage vision check over
//!   `{nsfw, weapon, realistic_child, horror_elements}` confidences, with a
//!   regenerate-once retry on hard violations.
//! - **Videos** ([`media`]): the text cascade over the generation prompt,
//!   re-run once on hard violations (the artifact itself is not sampled).
//!
//! Every finding is a [`Violation`] appended to the `guardrail_violations`
//! reducer — the full history survives for audit. Media guardrails
//! additionally record a final [`MediaBinding`] per artifact; the
//! [`aggregate`] step computes `guardrail_passed` from *final-pass* hard
//! violations only, so a first attempt cured by regeneration is remembered
//! but does not block.

pub mod media;
pub mod text;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Violation severity: only hard violations prevent progression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Hard,
    Soft,
}

/// One guardrail finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub severity: Severity,
    /// Category slug, e.g. `violence`, `pii_email`, `weapon`
    pub category: String,
    /// Human-readable detail
    pub detail: String,
    /// Producing node, e.g. `story_guardrail` or `image_guardrail[1]`
    pub source: String,
}

impl Violation {
    pub fn hard(
        category: impl Into<String>,
        detail: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Hard,
            category: category.into(),
            detail: detail.into(),
            source: source.into(),
        }
    }

    pub fn soft(
        category: impl Into<String>,
        detail: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            severity: Severity::Soft,
            category: category.into(),
            detail: detail.into(),
            source: source.into(),
        }
    }
}

/// Final per-artifact guardrail outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaBinding {
    /// `image` or `video`
    pub kind: String,
    /// Position within its fan-out, matching the prompt list
    pub index: u64,
    /// The artifact that passed (for a cured retry, the regenerated one)
    pub url: String,
    /// How many check attempts were made
    pub attempts: u32,
    /// Whether the final attempt was free of hard violations
    pub passed: bool,
}

/// Result of aggregating all accumulated guardrail outcomes
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateOutcome {
    /// True iff zero *blocking* hard violations remain
    pub guardrail_passed: bool,
    /// Human-readable summary for the reviewer
    pub guardrail_summary: String,
    /// Hard violations that count against the final outcome
    pub hard: Vec<Violation>,
    /// Soft violations, surfaced but not blocking
    pub soft: Vec<Violation>,
}

/// Source tag for a media guardrail attempt
pub fn media_source(kind: &str, index: u64) -> String {
    format!("{}_guardrail[{}]", kind, index)
}

fn media_source_parts(source: &str) -> Option<(String, u64)> {
    let (kind, rest) = source.split_once("_guardrail[")?;
    if !matches!(kind, "image" | "video") {
        return None;
    }
    let index = rest.strip_suffix(']')?.parse().ok()?;
    Some((kind.to_string(), index))
}

/// Derive the aggregate outcome from the accumulated violation history and
/// per-media bindings
///
/// A hard violation from a media guardrail source is excluded when its
/// binding shows the artifact ultimately passed (cured by regeneration);
/// every other hard violation blocks. Soft violations never block.
pub fn aggregate(violations: &[Violation], bindings: &[MediaBinding]) -> AggregateOutcome {
    let cured = |violation: &Violation| -> bool {
        match media_source_parts(&violation.source) {
            Some((kind, index)) => bindings
                .iter()
                .any(|b| b.kind == kind && b.index == index && b.passed),
            None => false,
        }
    };

    let mut hard = Vec::new();
    let mut soft = Vec::new();
    for violation in violations {
        match violation.severity {
            Severity::Hard => {
                if !cured(violation) {
                    hard.push(violation.clone());
                }
            }
            Severity::Soft => soft.push(violation.clone()),
        }
    }

    let guardrail_passed = hard.is_empty();
    let guardrail_summary = if guardrail_passed && soft.is_empty() {
        "all guardrail checks passed".to_string()
    } else {
        let mut parts = Vec::new();
        if !hard.is_empty() {
            let categories: Vec<&str> = hard.iter().map(|v| v.category.as_str()).collect();
            parts.push(format!("{} hard ({})", hard.len(), categories.join(", ")));
        }
        if !soft.is_empty() {
            let categories: Vec<&str> = soft.iter().map(|v| v.category.as_str()).collect();
            parts.push(format!("{} soft ({})", soft.len(), categories.join(", ")));
        }
        format!("violations: {}", parts.join("; "))
    };

    AggregateOutcome {
        guardrail_passed,
        guardrail_summary,
        hard,
        soft,
    }
}

/// Deserialize a state list into violations, ignoring malformed entries
pub fn violations_from_state(list: &Value) -> Vec<Violation> {
    list.as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Deserialize a state list into media bindings, ignoring malformed entries
pub fn bindings_from_state(list: &Value) -> Vec<MediaBinding> {
    list.as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect()
        })
        .unwrap_or_default()
}

//! Pipeline configuration
//!
//! Age-group threshold bundles, the auto-reject policy, media retry budget,
//! review deadline, and worker pool sizing. Defaults match the documented
//! engine contract; override individual knobs with the builder methods.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Reader age group; selects guardrail threshold bundles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgeGroup {
    #[serde(rename = "3-5")]
    Preschool,
    #[serde(rename = "6-8")]
    EarlyReader,
    #[serde(rename = "9-12")]
    MiddleGrade,
}

impl AgeGroup {
    /// The wire label for this age group
    pub fn as_str(&self) -> &'static str {
        match self {
            AgeGroup::Preschool => "3-5",
            AgeGroup::EarlyReader => "6-8",
            AgeGroup::MiddleGrade => "9-12",
        }
    }

    /// Parse a wire label
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "3-5" => Some(AgeGroup::Preschool),
            "6-8" => Some(AgeGroup::EarlyReader),
            "9-12" => Some(AgeGroup::MiddleGrade),
            _ => None,
        }
    }
}

/// Configuration for one engine instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Route to auto-rejection when aggregated hard violations exist
    pub auto_reject_on_hard_fail: bool,

    /// Media regeneration budget per guardrail (values above 1 are allowed
    /// but strongly discouraged)
    pub media_retry_max: u32,

    /// Fear-intensity threshold per age group (at or above → soft violation)
    pub fear_threshold_by_age: HashMap<AgeGroup, f64>,

    /// Violence-severity hard threshold per age group
    pub violence_hard_threshold_by_age: HashMap<AgeGroup, f64>,

    /// Confidence at or above which a vision category counts as a hit
    pub vision_confidence_threshold: f64,

    /// Wall-clock deadline for a reviewer decision
    pub review_deadline: chrono::Duration,

    /// Bound on concurrently executing handlers per thread
    pub worker_pool_size: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            auto_reject_on_hard_fail: true,
            media_retry_max: 1,
            fear_threshold_by_age: HashMap::from([
                (AgeGroup::Preschool, 0.3),
                (AgeGroup::EarlyReader, 0.4),
                (AgeGroup::MiddleGrade, 0.5),
            ]),
            violence_hard_threshold_by_age: HashMap::from([
                (AgeGroup::Preschool, 0.4),
                (AgeGroup::EarlyReader, 0.6),
                (AgeGroup::MiddleGrade, 0.7),
            ]),
            vision_confidence_threshold: 0.5,
            review_deadline: chrono::Duration::days(3),
            worker_pool_size: storyloom_core::DEFAULT_POOL_SIZE,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_reject_on_hard_fail(mut self, enabled: bool) -> Self {
        self.auto_reject_on_hard_fail = enabled;
        self
    }

    pub fn with_media_retry_max(mut self, max: u32) -> Self {
        self.media_retry_max = max;
        self
    }

    pub fn with_review_deadline(mut self, deadline: chrono::Duration) -> Self {
        self.review_deadline = deadline;
        self
    }

    pub fn with_worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size.max(1);
        self
    }

    /// Fear threshold for an age group
    pub fn fear_threshold(&self, age: AgeGroup) -> f64 {
        self.fear_threshold_by_age.get(&age).copied().unwrap_or(0.4)
    }

    /// Violence hard threshold for an age group
    pub fn violence_hard_threshold(&self, age: AgeGroup) -> f64 {
        self.violence_hard_threshold_by_age
            .get(&age)
            .copied()
            .unwrap_or(0.6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_thresholds() {
        let config = PipelineConfig::default();
        assert!(config.auto_reject_on_hard_fail);
        assert_eq!(config.media_retry_max, 1);
        assert_eq!(config.fear_threshold(AgeGroup::Preschool), 0.3);
        assert_eq!(config.fear_threshold(AgeGroup::EarlyReader), 0.4);
        assert_eq!(config.fear_threshold(AgeGroup::MiddleGrade), 0.5);
        assert_eq!(config.violence_hard_threshold(AgeGroup::Preschool), 0.4);
        assert_eq!(config.violence_hard_threshold(AgeGroup::EarlyReader), 0.6);
        assert_eq!(config.violence_hard_threshold(AgeGroup::MiddleGrade), 0.7);
        assert_eq!(config.review_deadline, chrono::Duration::days(3));
    }

    #[test]
    fn test_age_group_labels() {
        assert_eq!(AgeGroup::EarlyReader.as_str(), "6-8");
        assert_eq!(AgeGroup::parse("9-12"), Some(AgeGroup::MiddleGrade));
        assert_eq!(AgeGroup::parse("adult"), None);

        let encoded = serde_json::to_string(&AgeGroup::Preschool).unwrap();
        assert_eq!(encoded, "\"3-5\"");
    }

    #[test]
    fn test_builder_overrides() {
        let config = PipelineConfig::new()
            .with_auto_reject_on_hard_fail(false)
            .with_media_retry_max(2)
            .with_worker_pool_size(0);
        assert!(!config.auto_reject_on_hard_fail);
        assert_eq!(config.media_retry_max, 2);
        assert_eq!(config.worker_pool_size, 1);
    }
}

//! Deterministic regex-based PII detection
//!
//! The default [`PiiDetector`] implementation. Pattern-based and fully
//! deterministic: the same text always yields the same hits, which the
//! guardrail layer depends on for replay-stable violations.

use crate::error::{ProviderError, Result};
use crate::traits::{PiiDetector, PiiHit};
use async_trait::async_trait;
use regex::Regex;

/// Regex PII detector covering emails, phone numbers, and SSN-shaped ids
pub struct RegexPiiDetector {
    patterns: Vec<(String, Regex)>,
}

impl RegexPiiDetector {
    /// Create a detector with the built-in pattern set
    pub fn new() -> std::result::Result<Self, regex::Error> {
        let patterns = vec![
            (
                "email".to_string(),
                Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}")?,
            ),
            (
                "phone".to_string(),
                Regex::new(r"\+?\d{1,3}[-. ]?\(?\d{3}\)?[-. ]?\d{3}[-. ]?\d{4}")?,
            ),
            (
                "ssn".to_string(),
                Regex::new(r"\b\d{3}-\d{2}-\d{4}\b")?,
            ),
        ];
        Ok(Self { patterns })
    }
}

#[async_trait]
impl PiiDetector for RegexPiiDetector {
    async fn scan(&self, text: &str) -> Result<Vec<PiiHit>> {
        let mut hits = Vec::new();
        for (kind, pattern) in &self.patterns {
            for found in pattern.find_iter(text) {
                hits.push(PiiHit {
                    kind: kind.clone(),
                    matched: found.as_str().to_string(),
                });
            }
        }
        Ok(hits)
    }
}

impl RegexPiiDetector {
    /// Build the detector, mapping pattern errors to a permanent provider
    /// error
    pub fn build() -> Result<Self> {
        Self::new().map_err(|e| ProviderError::Permanent(format!("invalid PII pattern: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detects_email() {
        let detector = RegexPiiDetector::build().unwrap();
        let hits = detector
            .scan("write to alice@example.com for details")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, "email");
        assert_eq!(hits[0].matched, "alice@example.com");
    }

    #[tokio::test]
    async fn test_detects_ssn_shape() {
        let detector = RegexPiiDetector::build().unwrap();
        let hits = detector.scan("id 123-45-6789 on file").await.unwrap();
        assert!(hits.iter().any(|h| h.kind == "ssn"));
    }

    #[tokio::test]
    async fn test_clean_text_has_no_hits() {
        let detector = RegexPiiDetector::build().unwrap();
        let hits = detector
            .scan("a mouse finds cheese in the garden")
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_deterministic_across_calls() {
        let detector = RegexPiiDetector::build().unwrap();
        let text = "call 555-123-4567 or mail bob@site.org";
        let first = detector.scan(text).await.unwrap();
        let second = detector.scan(text).await.unwrap();
        assert_eq!(first, second);
    }
}

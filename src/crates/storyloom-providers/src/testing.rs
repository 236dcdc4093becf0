//! Scripted in-memory providers for tests
//!
//! Deterministic implementations of every port, driven by substring-matched
//! rules rather than call order: parallel workflow nodes call providers in a
//! nondeterministic order, so scripting by queue position would make tests
//! flaky. Every provider records its calls so tests can assert what was (and
//! was not) invoked.

use crate::error::{ProviderError, Result};
use crate::traits::{
    BlobStore, ImageGenerator, MediaRef, ModerationProvider, TextModel, VideoGenerator,
    VisionModel,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Text model answering by the first rule whose substring appears in the
/// system or user prompt
#[derive(Default)]
pub struct ScriptedTextModel {
    rules: Mutex<Vec<(String, Value)>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTextModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `value` whenever `needle` appears in the system or user
    /// prompt
    pub fn respond(self, needle: impl Into<String>, value: Value) -> Self {
        self.rules
            .lock()
            .expect("rules poisoned")
            .push((needle.into(), value));
        self
    }

    /// All `(system_prompt, user_prompt)` pairs seen so far
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    fn lookup(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push((system_prompt.to_string(), user_prompt.to_string()));
        let rules = self.rules.lock().expect("rules poisoned");
        for (needle, value) in rules.iter() {
            if system_prompt.contains(needle.as_str()) || user_prompt.contains(needle.as_str()) {
                return Ok(value.clone());
            }
        }
        Err(ProviderError::Permanent(format!(
            "no scripted response matches prompt: {}",
            system_prompt
        )))
    }
}

#[async_trait]
impl TextModel for ScriptedTextModel {
    async fn generate(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        let value = self.lookup(system_prompt, user_prompt)?;
        Ok(value
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| value.to_string()))
    }

    async fn generate_structured(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        _schema: &Value,
    ) -> Result<Value> {
        self.lookup(system_prompt, user_prompt)
    }
}

/// Vision model answering by the first rule whose substring appears in the
/// image url
#[derive(Default)]
pub struct ScriptedVisionModel {
    rules: Mutex<Vec<(String, Value)>>,
    default: Mutex<Option<Value>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedVisionModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond with `value` for any image whose url contains `needle`
    pub fn respond(self, needle: impl Into<String>, value: Value) -> Self {
        self.rules
            .lock()
            .expect("rules poisoned")
            .push((needle.into(), value));
        self
    }

    /// Fallback response for urls no rule matches
    pub fn default_response(self, value: Value) -> Self {
        *self.default.lock().expect("default poisoned") = Some(value);
        self
    }

    /// All analyzed image urls, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl VisionModel for ScriptedVisionModel {
    async fn analyze(
        &self,
        image: &MediaRef,
        _system_prompt: &str,
        _schema: &Value,
    ) -> Result<Value> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(image.as_str().to_string());
        let rules = self.rules.lock().expect("rules poisoned");
        for (needle, value) in rules.iter() {
            if image.as_str().contains(needle.as_str()) {
                return Ok(value.clone());
            }
        }
        self.default
            .lock()
            .expect("default poisoned")
            .clone()
            .ok_or_else(|| {
                ProviderError::Permanent(format!("no scripted vision response for {}", image))
            })
    }
}

/// Image generator producing `img://<prompt>#<n>`, where `n` counts
/// generations *per prompt*
///
/// Per-prompt counting keeps urls deterministic under parallel dispatch: the
/// first generation for a prompt is always `#0` and its retry `#1`,
/// regardless of how units interleave.
#[derive(Default)]
pub struct ScriptedImageGenerator {
    per_prompt: Mutex<HashMap<String, u64>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedImageGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// All prompts seen so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedImageGenerator {
    async fn generate(&self, prompt: &str) -> Result<MediaRef> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(prompt.to_string());
        let mut per_prompt = self.per_prompt.lock().expect("counter poisoned");
        let n = per_prompt.entry(prompt.to_string()).or_insert(0);
        let reference = MediaRef::new(format!("img://{}#{}", prompt, n));
        *n += 1;
        Ok(reference)
    }
}

/// Video generator producing `vid://<prompt>#<n>` with per-prompt counting
#[derive(Default)]
pub struct ScriptedVideoGenerator {
    per_prompt: Mutex<HashMap<String, u64>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedVideoGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl VideoGenerator for ScriptedVideoGenerator {
    async fn generate(&self, prompt: &str) -> Result<MediaRef> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(prompt.to_string());
        let mut per_prompt = self.per_prompt.lock().expect("counter poisoned");
        let n = per_prompt.entry(prompt.to_string()).or_insert(0);
        let reference = MediaRef::new(format!("vid://{}#{}", prompt, n));
        *n += 1;
        Ok(reference)
    }
}

/// Moderation provider flagging categories by text substring
#[derive(Default)]
pub struct ScriptedModeration {
    rules: Mutex<Vec<(String, Vec<String>)>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedModeration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Flag `categories` for any text containing `needle`
    pub fn flag(self, needle: impl Into<String>, categories: Vec<&str>) -> Self {
        self.rules.lock().expect("rules poisoned").push((
            needle.into(),
            categories.into_iter().map(str::to_string).collect(),
        ));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls poisoned").clone()
    }
}

#[async_trait]
impl ModerationProvider for ScriptedModeration {
    async fn moderate(&self, text: &str) -> Result<Vec<String>> {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(text.to_string());
        let rules = self.rules.lock().expect("rules poisoned");
        let mut flagged = Vec::new();
        for (needle, categories) in rules.iter() {
            if text.contains(needle.as_str()) {
                flagged.extend(categories.iter().cloned());
            }
        }
        Ok(flagged)
    }
}

/// In-memory blob store
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keys stored so far
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .blobs
            .lock()
            .expect("blobs poisoned")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<MediaRef> {
        self.blobs
            .lock()
            .expect("blobs poisoned")
            .insert(key.to_string(), bytes);
        Ok(MediaRef::new(format!("blob://{}", key)))
    }

    async fn get(&self, reference: &MediaRef) -> Result<Vec<u8>> {
        let key = reference
            .as_str()
            .strip_prefix("blob://")
            .unwrap_or(reference.as_str());
        self.blobs
            .lock()
            .expect("blobs poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| ProviderError::Permanent(format!("blob not found: {}", reference)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_scripted_text_matches_by_substring() {
        let model = ScriptedTextModel::new()
            .respond("story writer", json!({"story_text": "Once", "story_title": "T"}));

        let value = model
            .generate_structured("You are a story writer.", "a mouse", &json!({}))
            .await
            .unwrap();
        assert_eq!(value["story_title"], json!("T"));
        assert_eq!(model.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unmatched_prompt_is_permanent_error() {
        let model = ScriptedTextModel::new();
        let err = model.generate("unknown", "prompt").await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
    }

    #[tokio::test]
    async fn test_image_urls_count_per_prompt() {
        let generator = ScriptedImageGenerator::new();
        let a0 = generator.generate("mouse").await.unwrap();
        let b0 = generator.generate("cheese").await.unwrap();
        let a1 = generator.generate("mouse").await.unwrap();

        assert_eq!(a0.as_str(), "img://mouse#0");
        assert_eq!(b0.as_str(), "img://cheese#0");
        assert_eq!(a1.as_str(), "img://mouse#1");
    }

    #[tokio::test]
    async fn test_vision_rules_and_default() {
        let vision = ScriptedVisionModel::new()
            .respond("mouse#0", json!({"weapon": 0.9}))
            .default_response(json!({"weapon": 0.0}));

        let flagged = vision
            .analyze(&MediaRef::new("img://mouse#0"), "check", &json!({}))
            .await
            .unwrap();
        assert_eq!(flagged["weapon"], json!(0.9));

        let clean = vision
            .analyze(&MediaRef::new("img://mouse#1"), "check", &json!({}))
            .await
            .unwrap();
        assert_eq!(clean["weapon"], json!(0.0));
    }

    #[tokio::test]
    async fn test_moderation_flags_by_substring() {
        let moderation = ScriptedModeration::new().flag("fight", vec!["violence"]);
        assert_eq!(
            moderation.moderate("a big fight").await.unwrap(),
            vec!["violence".to_string()]
        );
        assert!(moderation.moderate("a nice day").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blob_store_roundtrip() {
        let store = MemoryBlobStore::new();
        let reference = store.put("manifest/job-1", b"data".to_vec()).await.unwrap();
        assert_eq!(store.get(&reference).await.unwrap(), b"data".to_vec());
        assert_eq!(store.keys(), vec!["manifest/job-1".to_string()]);
    }
}

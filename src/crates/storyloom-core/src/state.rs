//! State schema and reducer system for workflow state
//!
//! Workflow state is a JSON object merged through a declared schema. Every
//! field has a merge rule: *scalar* fields are last-writer-wins, *reducer*
//! fields are append-only lists whose contributions from parallel handlers
//! are concatenated. Unspecified fields in a patch never clear existing
//! state.
//!
//! # Merge model
//!
//! | Rule | Behavior | Use case |
//! |------|----------|----------|
//! | [`OverwriteReducer`] | Last write wins | Story text, scores, flags |
//! | [`AppendReducer`] | Concatenate lists | Media urls, violations, bindings |
//!
//! Append merging is associative and commutative up to multiset equality, so
//! parallel completions merge into the same multiset regardless of completion
//! order. The price is that nothing may rely on list *order* across parallel
//! contributors; records carry their own `index` and consumers sort
//! explicitly.
//!
//! Scalar fields written by more than one parallel sibling are a programming
//! error in the workflow definition — the schema cannot detect intent, so the
//! convention is enforced by the workflow author (each scalar has exactly one
//! writing node).
//!
//! # Transient fields
//!
//! Fields whose name starts with `_` are per-dispatch transients: a router
//! places them in a dispatch unit's overlay, the invoked handler sees them,
//! and the executor strips them from both patches and persisted state. Use
//! them for the unit index, the prompt for this unit, and similar
//! invocation-scoped values.
//!
//! # Example
//!
//! ```rust
//! use storyloom_core::state::{AppendReducer, OverwriteReducer, StateSchema};
//! use serde_json::json;
//!
//! let mut schema = StateSchema::new();
//! schema.add_field("story_text", Box::new(OverwriteReducer));
//! schema.add_field("image_urls", Box::new(AppendReducer));
//!
//! let mut state = json!({"image_urls": ["img://a"]});
//!
//! // Two parallel workers each contribute one url
//! schema.apply(&mut state, &json!({"image_urls": ["img://b"]})).unwrap();
//! schema.apply(&mut state, &json!({"image_urls": ["img://c"]})).unwrap();
//!
//! assert_eq!(state["image_urls"].as_array().unwrap().len(), 3);
//! ```

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Prefix marking per-dispatch transient fields
pub const TRANSIENT_PREFIX: &str = "_";

/// Errors that can occur during state operations
#[derive(Debug, Error)]
pub enum StateError {
    /// State structure is invalid (e.g. not an object)
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Reducer encountered incompatible types
    #[error("Reducer error: {0}")]
    ReducerError(String),
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Trait for merging a patch value into the current value of one field
pub trait Reducer: Send + Sync {
    /// Merge `update` into `current` (which may be null for an unset field)
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value>;

    /// Human-readable name for this reducer
    fn name(&self) -> &str;
}

/// Last-writer-wins reducer for scalar fields
///
/// This is also the default for fields not declared in the schema.
#[derive(Debug, Clone)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> Result<Value> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Append reducer for list fields
///
/// Concatenates the incoming list onto the existing one. A non-list update is
/// appended as a single element, which lets a handler contribute one record
/// without wrapping it.
#[derive(Debug, Clone)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> Result<Value> {
        match (current, update) {
            (Value::Array(curr), Value::Array(upd)) => {
                let mut merged = curr.clone();
                merged.extend_from_slice(upd);
                Ok(Value::Array(merged))
            }
            (Value::Null, Value::Array(upd)) => Ok(Value::Array(upd.clone())),
            (Value::Array(curr), single) => {
                let mut merged = curr.clone();
                merged.push(single.clone());
                Ok(Value::Array(merged))
            }
            (Value::Null, single) => Ok(Value::Array(vec![single.clone()])),
            _ => Err(StateError::ReducerError(
                "AppendReducer requires array values".to_string(),
            )),
        }
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Declares each field's merge rule
///
/// Undeclared fields default to overwrite, matching the scalar rule.
#[derive(Default)]
pub struct StateSchema {
    fields: HashMap<String, Box<dyn Reducer>>,
}

impl StateSchema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field with a specific reducer
    pub fn add_field(&mut self, field_name: impl Into<String>, reducer: Box<dyn Reducer>) {
        self.fields.insert(field_name.into(), reducer);
    }

    /// Whether the field merges by appending
    pub fn is_reducer_field(&self, field_name: &str) -> bool {
        self.fields
            .get(field_name)
            .map(|r| r.name() == "append")
            .unwrap_or(false)
    }

    /// Apply a patch to state according to the declared merge rules
    ///
    /// Transient (`_`-prefixed) fields in the patch are skipped: they never
    /// reach canonical state.
    pub fn apply(&self, state: &mut Value, patch: &Value) -> Result<()> {
        let state_obj = state
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;

        let patch_obj = patch
            .as_object()
            .ok_or_else(|| StateError::InvalidState("patch must be an object".to_string()))?;

        for (field, update) in patch_obj {
            if field.starts_with(TRANSIENT_PREFIX) {
                continue;
            }

            let current = state_obj.get(field).cloned().unwrap_or(Value::Null);
            let merged = match self.fields.get(field) {
                Some(reducer) => reducer.reduce(&current, update)?,
                None => update.clone(),
            };
            state_obj.insert(field.clone(), merged);
        }

        Ok(())
    }

    /// Declared field names
    pub fn fields(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }
}

/// Overlay `overlay` on top of a clone of `state` for one dispatch-unit
/// invocation
///
/// Plain key-level overwrite; transient keys stay visible here because the
/// result is the handler's view, not canonical state.
pub fn overlay_view(state: &Value, overlay: Option<&Value>) -> Result<Value> {
    let mut view = state.clone();
    if let Some(overlay) = overlay {
        let view_obj = view
            .as_object_mut()
            .ok_or_else(|| StateError::InvalidState("state must be an object".to_string()))?;
        let overlay_obj = overlay
            .as_object()
            .ok_or_else(|| StateError::InvalidState("overlay must be an object".to_string()))?;
        for (key, value) in overlay_obj {
            view_obj.insert(key.clone(), value.clone());
        }
    }
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_overwrite_reducer() {
        let reducer = OverwriteReducer;
        let result = reducer.reduce(&json!("old"), &json!("new")).unwrap();
        assert_eq!(result, json!("new"));
    }

    #[test]
    fn test_append_reducer_arrays() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!([1, 2]), &json!([3])).unwrap();
        assert_eq!(result, json!([1, 2, 3]));
    }

    #[test]
    fn test_append_reducer_null_current() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&Value::Null, &json!([1])).unwrap();
        assert_eq!(result, json!([1]));
    }

    #[test]
    fn test_append_reducer_single_value() {
        let reducer = AppendReducer;
        let result = reducer
            .reduce(&json!([{"index": 0}]), &json!({"index": 1}))
            .unwrap();
        assert_eq!(result, json!([{"index": 0}, {"index": 1}]));
    }

    #[test]
    fn test_append_reducer_type_mismatch() {
        let reducer = AppendReducer;
        let result = reducer.reduce(&json!("not a list"), &json!([1]));
        assert!(matches!(result, Err(StateError::ReducerError(_))));
    }

    #[test]
    fn test_schema_apply_mixed_fields() {
        let mut schema = StateSchema::new();
        schema.add_field("story_text", Box::new(OverwriteReducer));
        schema.add_field("image_urls", Box::new(AppendReducer));

        let mut state = json!({"story_text": "draft", "image_urls": ["a"]});
        schema
            .apply(&mut state, &json!({"story_text": "final", "image_urls": ["b"]}))
            .unwrap();

        assert_eq!(state["story_text"], json!("final"));
        assert_eq!(state["image_urls"], json!(["a", "b"]));
    }

    #[test]
    fn test_unspecified_fields_do_not_clear() {
        let schema = StateSchema::new();
        let mut state = json!({"kept": 1});
        schema.apply(&mut state, &json!({"other": 2})).unwrap();
        assert_eq!(state["kept"], json!(1));
        assert_eq!(state["other"], json!(2));
    }

    #[test]
    fn test_transient_fields_stripped_from_patch() {
        let schema = StateSchema::new();
        let mut state = json!({});
        schema
            .apply(&mut state, &json!({"_index": 3, "visible": true}))
            .unwrap();
        assert!(state.get("_index").is_none());
        assert_eq!(state["visible"], json!(true));
    }

    #[test]
    fn test_overlay_view_keeps_transients() {
        let state = json!({"prompt": "p"});
        let view = overlay_view(&state, Some(&json!({"_index": 1, "_prompt": "x"}))).unwrap();
        assert_eq!(view["_index"], json!(1));
        assert_eq!(view["prompt"], json!("p"));
    }

    #[test]
    fn test_overlay_view_none() {
        let state = json!({"prompt": "p"});
        assert_eq!(overlay_view(&state, None).unwrap(), state);
    }

    proptest! {
        /// Append merging is order-insensitive up to multiset equality: any
        /// permutation of the same contributions yields the same multiset.
        #[test]
        fn prop_append_merge_is_permutation_invariant(
            contributions in proptest::collection::vec(0u32..1000, 0..8),
            seed in 0u64..1000,
        ) {
            let mut schema = StateSchema::new();
            schema.add_field("items", Box::new(AppendReducer));

            let patches: Vec<Value> = contributions
                .iter()
                .map(|n| json!({"items": [n]}))
                .collect();

            // Deterministic pseudo-shuffle driven by the seed
            let mut shuffled = patches.clone();
            let len = shuffled.len();
            if len > 1 {
                let mut s = seed;
                for i in (1..len).rev() {
                    s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                    shuffled.swap(i, (s % (i as u64 + 1)) as usize);
                }
            }

            let mut a = json!({});
            let mut b = json!({});
            for p in &patches {
                schema.apply(&mut a, p).unwrap();
            }
            for p in &shuffled {
                schema.apply(&mut b, p).unwrap();
            }

            let mut items_a: Vec<u64> = a["items"]
                .as_array().map(|v| v.iter().filter_map(|x| x.as_u64()).collect()).unwrap_or_default();
            let mut items_b: Vec<u64> = b["items"]
                .as_array().map(|v| v.iter().filter_map(|x| x.as_u64()).collect()).unwrap_or_default();
            items_a.sort_unstable();
            items_b.sort_unstable();
            prop_assert_eq!(items_a, items_b);
        }
    }
}

//! JSON Schema validation for structured provider output
//!
//! A structured-output port call that returns a value not conforming to the
//! requested schema is a permanent failure: the model contract is broken and
//! retrying the same request cannot be expected to fix a shape mismatch
//! deterministically, so the error surfaces immediately.

use crate::error::{ProviderError, Result};
use jsonschema::JSONSchema;
use serde_json::Value;

/// Validate `value` against `schema`, collecting every violation
pub fn validate_structured(schema: &Value, value: &Value) -> Result<()> {
    let compiled = JSONSchema::compile(schema)
        .map_err(|e| ProviderError::Schema(format!("invalid schema: {}", e)))?;

    if let Err(errors) = compiled.validate(value) {
        let details: Vec<String> = errors.map(|e| e.to_string()).collect();
        return Err(ProviderError::Schema(details.join("; ")));
    }
    Ok(())
}

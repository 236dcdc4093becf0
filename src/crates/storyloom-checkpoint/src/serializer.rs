//! Serialization protocol for snapshot blobs
//!
//! Snapshots carry arbitrary JSON state, so the blob encoding must be
//! self-describing; JSON is the default and currently only implementation.
//! Backends with their own column types can bypass this entirely and store
//! the snapshot fields natively.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Protocol for serializing and deserializing snapshot data
pub trait SerializerProtocol: Send + Sync {
    /// Serialize a value to bytes
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>>;

    /// Deserialize a value from bytes
    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T>;
}

/// JSON-based serializer (default)
#[derive(Debug, Clone, Default)]
pub struct JsonSerializer;

impl JsonSerializer {
    pub fn new() -> Self {
        Self
    }
}

impl SerializerProtocol for JsonSerializer {
    fn dumps<T: Serialize>(&self, value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn loads<T: for<'de> Deserialize<'de>>(&self, data: &[u8]) -> Result<T> {
        Ok(serde_json::from_slice(data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{PendingTask, Snapshot};
    use serde_json::json;

    #[test]
    fn test_json_roundtrip() {
        let serializer = JsonSerializer::new();
        let snap = Snapshot::initial(json!({"prompt": "p"}), vec![PendingTask::new("entry")]);

        let bytes = serializer.dumps(&snap).unwrap();
        let restored: Snapshot = serializer.loads(&bytes).unwrap();
        assert_eq!(restored.seq, snap.seq);
        assert_eq!(restored.state, snap.state);
    }

    #[test]
    fn test_json_roundtrip_with_overlay() {
        let serializer = JsonSerializer::new();
        let task = PendingTask::unit("generate_single_image", 1, json!({"_index": 1}));

        let bytes = serializer.dumps(&task).unwrap();
        let restored: PendingTask = serializer.loads(&bytes).unwrap();
        assert_eq!(restored, task);
    }
}

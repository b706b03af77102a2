//! Chunk and search result types persisted in the vector store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Namespace for deriving stable point ids from chunk coordinates.
const POINT_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6b, 0x1f, 0x42, 0x9a, 0x3d, 0x5c, 0x4e, 0x81, 0xb2, 0x07, 0x9e, 0x64, 0x2a, 0xd8, 0x11, 0x3f,
]);

/// A contiguous, semantically meaningful slice of a source file.
///
/// Produced by a chunk source, embedded once, and persisted as the payload of
/// a single vector store point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeChunk {
    pub file_path: String,
    pub content: String,
    /// 1-based, inclusive.
    pub start_line: u32,
    /// 1-based, inclusive; always `>= start_line`.
    pub end_line: u32,
    /// Free-form classification, e.g. `function`, `class`, `block`.
    pub kind: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl CodeChunk {
    /// Deterministic point id for this chunk.
    ///
    /// Derived from `file_path:start_line:end_line`, so re-indexing the same
    /// region overwrites the prior point instead of duplicating it.
    #[must_use]
    pub fn point_id(&self) -> String {
        let key = format!("{}:{}:{}", self.file_path, self.start_line, self.end_line);
        uuid::Uuid::new_v5(&POINT_NAMESPACE, key.as_bytes()).to_string()
    }

    /// Qdrant-ready payload: all chunk fields plus a content hash for
    /// provenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the chunk fails to serialize to a JSON object.
    pub fn to_payload(&self) -> Result<HashMap<String, serde_json::Value>, serde_json::Error> {
        let mut map: HashMap<String, serde_json::Value> =
            serde_json::from_value(serde_json::to_value(self)?)?;
        map.insert(
            "content_hash".into(),
            serde_json::Value::String(blake3::hash(self.content.as_bytes()).to_hex().to_string()),
        );
        Ok(map)
    }

    /// Decode a chunk from a stored payload. Unknown payload fields (such as
    /// `content_hash`) are ignored.
    #[must_use]
    pub fn from_payload(payload: &HashMap<String, serde_json::Value>) -> Option<Self> {
        let value = serde_json::Value::Object(payload.clone().into_iter().collect());
        serde_json::from_value(value).ok()
    }
}

/// A single similarity search hit. Ephemeral, never persisted.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub id: String,
    /// Provider-defined similarity, higher is better.
    pub score: f32,
    pub chunk: CodeChunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(path: &str, start: u32, end: u32) -> CodeChunk {
        CodeChunk {
            file_path: path.into(),
            content: "fn main() {}".into(),
            start_line: start,
            end_line: end,
            kind: "function".into(),
            language: "rust".into(),
            name: Some("main".into()),
            signature: None,
        }
    }

    #[test]
    fn point_id_deterministic() {
        let a = chunk("src/main.rs", 1, 5);
        let b = chunk("src/main.rs", 1, 5);
        assert_eq!(a.point_id(), b.point_id());
    }

    #[test]
    fn point_id_distinguishes_coordinates() {
        assert_ne!(
            chunk("src/main.rs", 1, 5).point_id(),
            chunk("src/main.rs", 1, 6).point_id()
        );
        assert_ne!(
            chunk("src/main.rs", 1, 5).point_id(),
            chunk("src/lib.rs", 1, 5).point_id()
        );
    }

    #[test]
    fn point_id_stable_across_content_edits() {
        let mut a = chunk("src/main.rs", 1, 5);
        a.content = "fn main() { println!(); }".into();
        let b = chunk("src/main.rs", 1, 5);
        assert_eq!(a.point_id(), b.point_id());
    }

    #[test]
    fn payload_round_trip() {
        let original = chunk("src/lib.rs", 10, 42);
        let payload = original.to_payload().unwrap();
        assert!(payload.contains_key("content_hash"));

        let decoded = CodeChunk::from_payload(&payload).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn from_payload_missing_required_field() {
        let mut payload = chunk("src/lib.rs", 1, 2).to_payload().unwrap();
        payload.remove("file_path");
        assert!(CodeChunk::from_payload(&payload).is_none());
    }

    #[test]
    fn namespace_not_nil() {
        assert!(!POINT_NAMESPACE.is_nil());
    }
}

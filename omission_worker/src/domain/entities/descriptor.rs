use std::collections::HashMap;

use serde_json::Value as JsonValue;

pub type Embeddings = Vec<f32>;

/// Free-form metadata attached to one stored descriptor.
///
/// String keys, JSON values (strings, numbers, string lists).
pub type DescriptorPayload = HashMap<String, JsonValue>;

/// One nearest-neighbor hit returned by the vector store.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    /// Application-assigned descriptor id, as given at ingestion time.
    pub id: String,
    pub label: String,
    /// Similarity score under the collection metric.
    pub score: f32,
    pub payload: DescriptorPayload,
    /// Raw image bytes, fetched for `image`-labeled hits on demand.
    pub image: Option<Vec<u8>>,
}

impl QueryMatch {
    /// The text this descriptor was built from, falling back to the whole
    /// payload when the `text` field is absent (image descriptors).
    pub fn document_text(&self) -> String {
        match self.payload.get("text").and_then(JsonValue::as_str) {
            Some(text) => text.to_string(),
            None => serde_json::to_string(&self.payload).unwrap_or_default(),
        }
    }
}

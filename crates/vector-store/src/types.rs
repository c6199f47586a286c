use sage_protocol::Metadata;
use serde::{Deserialize, Serialize};

/// Number of leading characters used by the legacy prefix identity.
pub const PREFIX_KEY_CHARS: usize = 100;

/// An immutable rules passage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: Metadata::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// First [`PREFIX_KEY_CHARS`] characters of the content.
    #[must_use]
    pub fn prefix_key(&self) -> &str {
        match self.content.char_indices().nth(PREFIX_KEY_CHARS) {
            Some((byte_idx, _)) => &self.content[..byte_idx],
            None => &self.content,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    pub document: Document,
    pub score: f64,
}

impl ScoredDocument {
    #[must_use]
    pub const fn new(document: Document, score: f64) -> Self {
        Self { document, score }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredDocument {
    pub document: Document,
    pub vector: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_key_counts_characters_not_bytes() {
        let content = "é".repeat(150);
        let doc = Document::new(content);
        assert_eq!(doc.prefix_key().chars().count(), PREFIX_KEY_CHARS);
    }

    #[test]
    fn prefix_key_keeps_short_content_whole() {
        let doc = Document::new("601.2. To cast a spell");
        assert_eq!(doc.prefix_key(), "601.2. To cast a spell");
    }
}

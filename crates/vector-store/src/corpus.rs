use crate::error::{Result, VectorStoreError};
use crate::rules::extract_rule_number;
use crate::source::DocumentSource;
use crate::types::Document;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const RULES_CORPUS_SCHEMA_VERSION: u32 = 1;

/// The full rules corpus in load order. Position is the passage id.
#[derive(Debug, Clone, Default)]
pub struct RulesCorpus {
    documents: Vec<Document>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedRulesCorpus {
    schema_version: u32,
    documents: Vec<Document>,
}

impl RulesCorpus {
    #[must_use]
    pub const fn from_documents(documents: Vec<Document>) -> Self {
        Self { documents }
    }

    /// Splits plain rules text into passages at blank lines.
    ///
    /// Each passage carries `source`, its 0-based `passage` index and, when the
    /// passage cites one, the first `rule` number.
    #[must_use]
    pub fn from_rules_text(source: &str, text: &str) -> Self {
        let mut documents = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                push_passage(source, &mut current, &mut documents);
            } else {
                current.push(trimmed);
            }
        }
        push_passage(source, &mut current, &mut documents);

        log::debug!("Split '{source}' into {} passages", documents.len());
        Self { documents }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedRulesCorpus = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != RULES_CORPUS_SCHEMA_VERSION {
            return Err(VectorStoreError::SchemaMismatch {
                what: "rules corpus",
                found: persisted.schema_version,
                expected: RULES_CORPUS_SCHEMA_VERSION,
            });
        }
        Ok(Self {
            documents: persisted.documents,
        })
    }

    /// Loads a JSON corpus, or imports any other file as plain rules text.
    pub async fn import(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            return Self::load(path).await;
        }

        let text = tokio::fs::read_to_string(path).await?;
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("rules");
        Ok(Self::from_rules_text(source, &text))
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedRulesCorpus {
            schema_version: RULES_CORPUS_SCHEMA_VERSION,
            documents: self.documents.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    /// BLAKE3 over every passage's content and metadata, in order.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for doc in &self.documents {
            hasher.update(&(doc.content.len() as u64).to_le_bytes());
            hasher.update(doc.content.as_bytes());
            let metadata = serde_json::Value::Object(doc.metadata.clone()).to_string();
            hasher.update(&(metadata.len() as u64).to_le_bytes());
            hasher.update(metadata.as_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn into_documents(self) -> Vec<Document> {
        self.documents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

fn push_passage(source: &str, lines: &mut Vec<&str>, documents: &mut Vec<Document>) {
    if lines.is_empty() {
        return;
    }
    let content = lines.join("\n");
    lines.clear();
    let passage = documents.len();
    let mut doc = Document::new(content)
        .with_metadata("source", source)
        .with_metadata("passage", passage);
    if let Some(rule) = extract_rule_number(&doc.content) {
        doc = doc.with_metadata("rule", rule);
    }
    documents.push(doc);
}

#[async_trait]
impl DocumentSource for RulesCorpus {
    async fn list_all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const RULES: &str = "\
405.1. When a spell is cast, the physical card is put on the stack.

405.2. The stack keeps track of the order that spells were added.
It resolves last in, first out.


117.3a The active player receives priority at the beginning of most steps.
";

    #[test]
    fn splits_passages_on_blank_lines() {
        let corpus = RulesCorpus::from_rules_text("rules.txt", RULES);
        assert_eq!(corpus.len(), 3);
        assert_eq!(
            corpus.documents()[1].content,
            "405.2. The stack keeps track of the order that spells were added.\nIt resolves last in, first out."
        );
        let meta = &corpus.documents()[2].metadata;
        assert_eq!(meta["source"], "rules.txt");
        assert_eq!(meta["passage"], 2);
        assert_eq!(meta["rule"], "117.3a");
    }

    #[test]
    fn fingerprint_tracks_content() {
        let a = RulesCorpus::from_rules_text("rules.txt", RULES);
        let b = RulesCorpus::from_rules_text("rules.txt", RULES);
        let c = RulesCorpus::from_rules_text("rules.txt", "601.2. Casting a spell.");
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[tokio::test]
    async fn corpus_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("corpus.json");

        let corpus = RulesCorpus::from_rules_text("rules.txt", RULES);
        corpus.save(&path).await.unwrap();

        let loaded = RulesCorpus::load(&path).await.unwrap();
        assert_eq!(loaded.documents(), corpus.documents());
        assert_eq!(loaded.list_all_documents().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn rejects_unknown_schema_version() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("corpus.json");
        tokio::fs::write(&path, br#"{"schema_version": 99, "documents": []}"#)
            .await
            .unwrap();

        let err = RulesCorpus::load(&path).await.unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::SchemaMismatch { found: 99, .. }
        ));
    }

    #[tokio::test]
    async fn import_reads_plain_text() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("MagicCompRules.txt");
        tokio::fs::write(&path, RULES).await.unwrap();

        let corpus = RulesCorpus::import(&path).await.unwrap();
        assert_eq!(corpus.len(), 3);
        assert_eq!(corpus.documents()[0].metadata["source"], "MagicCompRules.txt");
    }
}

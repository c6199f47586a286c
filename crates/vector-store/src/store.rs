use crate::embeddings::Embedder;
use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::source::{DocumentSource, SimilaritySource};
use crate::types::{Document, ScoredDocument, StoredDocument};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const VECTOR_STORE_SCHEMA_VERSION: u32 = 1;

/// In-process embedding store answering semantic queries by exhaustive cosine search.
pub struct VectorStore {
    documents: Vec<StoredDocument>,
    index: FlatIndex,
    embedder: Arc<dyn Embedder>,
    path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct PersistedVectorStore {
    schema_version: u32,
    embedder_id: String,
    dimension: usize,
    documents: Vec<StoredDocument>,
}

impl VectorStore {
    pub fn new(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Self {
        log::info!("Initializing VectorStore at {:?}", path.as_ref());
        let index = FlatIndex::new(embedder.dimension());
        Self {
            documents: Vec::new(),
            index,
            embedder,
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Embeds and appends documents in one batch.
    pub fn add_documents(&mut self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        log::info!("Adding {} documents to store", documents.len());

        let contents: Vec<&str> = documents.iter().map(|d| d.content.as_str()).collect();
        let vectors = self.embedder.embed_batch(&contents)?;
        if vectors.len() != documents.len() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                documents.len()
            )));
        }

        let added = documents.len();
        for (document, vector) in documents.into_iter().zip(vectors) {
            self.index.add(&vector)?;
            self.documents.push(StoredDocument { document, vector });
        }

        log::info!("Successfully added documents. Total: {}", self.documents.len());
        Ok(added)
    }

    /// Top `limit` documents by cosine similarity to the query, best first.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<ScoredDocument>> {
        log::debug!("Searching for: '{}' (limit: {})", query, limit);
        if limit == 0 || self.index.is_empty() {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed(query)?;
        let neighbors = self.index.search(&query_vector, limit)?;

        let results: Vec<ScoredDocument> = neighbors
            .into_iter()
            .filter_map(|(id, score)| {
                self.documents
                    .get(id)
                    .map(|stored| ScoredDocument::new(stored.document.clone(), f64::from(score)))
            })
            .collect();

        log::debug!("Found {} results", results.len());
        Ok(results)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.iter().map(|stored| &stored.document)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn save(&self) -> Result<()> {
        log::info!("Saving VectorStore to {:?}", self.path);
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedVectorStore {
            schema_version: VECTOR_STORE_SCHEMA_VERSION,
            embedder_id: self.embedder.id().to_string(),
            dimension: self.embedder.dimension(),
            documents: self.documents.clone(),
        };
        let data = serde_json::to_vec(&persisted)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        log::info!("VectorStore saved successfully");
        Ok(())
    }

    /// Restores a saved store. Vectors produced by a different embedder are rejected.
    pub async fn load(path: impl AsRef<Path>, embedder: Arc<dyn Embedder>) -> Result<Self> {
        log::info!("Loading VectorStore from {:?}", path.as_ref());
        let data = tokio::fs::read(&path).await?;
        let persisted: PersistedVectorStore = serde_json::from_slice(&data)?;

        if persisted.schema_version != VECTOR_STORE_SCHEMA_VERSION {
            return Err(VectorStoreError::SchemaMismatch {
                what: "vector store",
                found: persisted.schema_version,
                expected: VECTOR_STORE_SCHEMA_VERSION,
            });
        }
        if persisted.embedder_id != embedder.id() {
            return Err(VectorStoreError::EmbeddingError(format!(
                "store was embedded with '{}', current embedder is '{}'",
                persisted.embedder_id,
                embedder.id()
            )));
        }
        if persisted.dimension != embedder.dimension() {
            return Err(VectorStoreError::InvalidDimension {
                expected: embedder.dimension(),
                actual: persisted.dimension,
            });
        }

        let mut index = FlatIndex::new(embedder.dimension());
        for stored in &persisted.documents {
            index.add(&stored.vector)?;
        }

        log::info!("Loaded {} documents", persisted.documents.len());

        Ok(Self {
            documents: persisted.documents,
            index,
            embedder,
            path: path.as_ref().to_path_buf(),
        })
    }
}

#[async_trait]
impl DocumentSource for VectorStore {
    async fn list_all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents().cloned().collect())
    }
}

#[async_trait]
impl SimilaritySource for VectorStore {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>> {
        self.search(query, k)
    }
}

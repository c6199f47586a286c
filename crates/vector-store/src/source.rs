use crate::error::Result;
use crate::types::{Document, ScoredDocument};
use async_trait::async_trait;

/// Materializes the full corpus once, at BM25 build time.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn list_all_documents(&self) -> Result<Vec<Document>>;
}

/// Semantic nearest-neighbour lookup. Higher scores mean more similar.
#[async_trait]
pub trait SimilaritySource: Send + Sync {
    async fn similarity_search(&self, query: &str, k: usize) -> Result<Vec<ScoredDocument>>;
}

/// Fixed in-memory document listing.
#[derive(Debug, Clone, Default)]
pub struct StaticDocuments {
    documents: Vec<Document>,
}

impl StaticDocuments {
    #[must_use]
    pub const fn new(documents: Vec<Document>) -> Self {
        Self { documents }
    }
}

#[async_trait]
impl DocumentSource for StaticDocuments {
    async fn list_all_documents(&self) -> Result<Vec<Document>> {
        Ok(self.documents.clone())
    }
}

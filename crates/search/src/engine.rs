use crate::config::RetrievalConfig;
use crate::hybrid::HybridRetriever;
use crate::retriever::Bm25Retriever;
use sage_protocol::{SearchHit, SearchMode, SearchResponse};
use sage_vector_store::{extract_rule_number, ScoredDocument, SimilaritySource};
use std::sync::Arc;

/// Entry point for callers: one BM25 retriever and one hybrid retriever
/// sharing it, built once and passed around by reference.
pub struct RetrievalEngine {
    config: RetrievalConfig,
    bm25: Arc<Bm25Retriever>,
    hybrid: HybridRetriever,
}

impl RetrievalEngine {
    pub fn new(
        config: RetrievalConfig,
        bm25: Arc<Bm25Retriever>,
        vectors: Arc<dyn SimilaritySource>,
    ) -> Self {
        let hybrid = HybridRetriever::from_config(Arc::clone(&bm25), vectors, &config.hybrid);
        Self {
            config,
            bm25,
            hybrid,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Loads or builds the BM25 index ahead of the first query. Returns the
    /// number of indexed documents.
    pub async fn warm_up(&self) -> usize {
        self.bm25.initialize(false).await.len()
    }

    /// Rebuilds the BM25 index from the document source, ignoring the cache.
    pub async fn rebuild(&self) -> usize {
        self.bm25.rebuild().await.len()
    }

    pub async fn bm25_search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        to_hits(self.bm25.search(query, k).await)
    }

    pub async fn hybrid_search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        to_hits(self.hybrid.search(query, k).await)
    }

    pub async fn adaptive_search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        to_hits(self.hybrid.search_adaptive(query, k).await)
    }

    pub async fn vector_search(
        &self,
        query: &str,
        k: usize,
        min_score: Option<f64>,
    ) -> Vec<SearchHit> {
        to_hits(self.hybrid.search_vector(query, k, min_score).await)
    }

    pub async fn search(&self, query: &str, k: usize, mode: SearchMode) -> SearchResponse {
        let hits = match mode {
            SearchMode::Hybrid => self.hybrid_search(query, k).await,
            SearchMode::Adaptive => self.adaptive_search(query, k).await,
            SearchMode::Bm25 => self.bm25_search(query, k).await,
            SearchMode::Vector => self.vector_search(query, k, None).await,
        };
        log::info!("{mode} search '{query}': {} hits", hits.len());
        SearchResponse::new(query, mode, k, hits)
    }
}

/// Ranked hits, 1-based, with the cited rule number when one is known.
#[must_use]
pub fn to_hits(results: Vec<ScoredDocument>) -> Vec<SearchHit> {
    results
        .into_iter()
        .enumerate()
        .map(|(idx, scored)| {
            let document = scored.document;
            let rule = document
                .metadata
                .get("rule")
                .and_then(|value| value.as_str())
                .map(str::to_string)
                .or_else(|| extract_rule_number(&document.content));
            SearchHit {
                rank: idx + 1,
                content: document.content,
                metadata: document.metadata,
                score: scored.score,
                rule,
            }
        })
        .collect()
}

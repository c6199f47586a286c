use crate::config::HybridConfig;
use crate::fusion::{fuse, DocumentIdentity, FusionWeights};
use crate::query_classifier::{QueryClassifier, QueryType};
use crate::query_expansion::{cites_rule, prioritize, QueryExpander, RULE_PRIORITY_LIMIT};
use crate::retriever::Bm25Retriever;
use sage_vector_store::{ScoredDocument, SimilaritySource};
use std::sync::Arc;

/// BM25 hits scanned for passages citing a requested rule.
const RULE_CANDIDATE_POOL: usize = 32;

/// Hybrid search combining semantic similarity and BM25 by normalized
/// weighted fusion.
///
/// Never fails: a source that errors contributes no candidates and the
/// other source alone decides the ranking.
pub struct HybridRetriever {
    bm25: Arc<Bm25Retriever>,
    vectors: Arc<dyn SimilaritySource>,
    weights: FusionWeights,
    rule_reference_weights: FusionWeights,
    identity: DocumentIdentity,
    expander: QueryExpander,
}

impl HybridRetriever {
    pub fn new(bm25: Arc<Bm25Retriever>, vectors: Arc<dyn SimilaritySource>) -> Self {
        Self::from_config(bm25, vectors, &HybridConfig::default())
    }

    pub fn from_config(
        bm25: Arc<Bm25Retriever>,
        vectors: Arc<dyn SimilaritySource>,
        config: &HybridConfig,
    ) -> Self {
        Self {
            bm25,
            vectors,
            weights: config.weights(),
            rule_reference_weights: config.rule_reference_weights(),
            identity: config.identity,
            expander: QueryExpander::new(),
        }
    }

    #[must_use]
    pub fn with_weights(mut self, weights: FusionWeights) -> Self {
        self.weights = weights;
        self
    }

    #[must_use]
    pub const fn weights(&self) -> FusionWeights {
        self.weights
    }

    #[must_use]
    pub const fn rule_reference_weights(&self) -> FusionWeights {
        self.rule_reference_weights
    }

    /// Top `k` documents by fused score with the configured weights.
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        self.search_with_weights(query, k, self.weights).await
    }

    /// Like [`search`](Self::search), tuned for rules questions.
    ///
    /// The query is expanded with the section numbers and phrasings of the
    /// game concepts it mentions. Queries citing a rule number lean on exact
    /// term matching, and up to three passages citing that rule lead the
    /// results.
    pub async fn search_adaptive(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        let weights = match QueryClassifier::classify(query) {
            QueryType::RuleReference => self.rule_reference_weights,
            QueryType::Conceptual => self.weights,
        };
        let expanded = self.expander.expand(query);
        log::debug!(
            "Adaptive search '{}' -> '{}': vector={:.1}%, bm25={:.1}%",
            query,
            expanded,
            weights.vector * 100.0,
            weights.bm25 * 100.0
        );

        let ranked = self.search_with_weights(&expanded, k, weights).await;
        match QueryClassifier::rule_number(query) {
            Some(rule) => {
                let cited = self.passages_citing(rule).await;
                log::debug!("{} passages cite rule {rule}", cited.len());
                prioritize(cited, ranked, self.identity, k)
            }
            None => ranked,
        }
    }

    pub async fn search_with_weights(
        &self,
        query: &str,
        k: usize,
        weights: FusionWeights,
    ) -> Vec<ScoredDocument> {
        if k == 0 {
            return Vec::new();
        }

        log::debug!("Hybrid search: query='{}', k={}", query, k);

        let (vector_results, bm25_results) =
            tokio::join!(self.vector_candidates(query, k), self.bm25.search(query, k));
        log::debug!(
            "Candidates: vector={}, bm25={}",
            vector_results.len(),
            bm25_results.len()
        );

        let fused = fuse(vector_results, bm25_results, weights, self.identity, k);
        log::debug!("Hybrid search completed: {} results", fused.len());
        fused
    }

    /// Semantic-only search, optionally dropping hits below `min_score`.
    pub async fn search_vector(
        &self,
        query: &str,
        k: usize,
        min_score: Option<f64>,
    ) -> Vec<ScoredDocument> {
        if k == 0 {
            return Vec::new();
        }
        let mut results = self.vector_candidates(query, k).await;
        results.retain(|hit| hit.score.is_finite());
        if let Some(min) = min_score {
            results.retain(|hit| hit.score >= min);
        }
        results.truncate(k);
        results
    }

    /// BM25-only search through the shared retriever.
    pub async fn search_bm25(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        self.bm25.search(query, k).await
    }

    async fn passages_citing(&self, rule: &str) -> Vec<ScoredDocument> {
        self.bm25
            .search(rule, RULE_CANDIDATE_POOL)
            .await
            .into_iter()
            .filter(|hit| cites_rule(&hit.document.content, rule))
            .take(RULE_PRIORITY_LIMIT)
            .collect()
    }

    async fn vector_candidates(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        match self.vectors.similarity_search(query, k).await {
            Ok(results) => results,
            Err(err) => {
                log::warn!("Vector search failed, continuing with BM25 only: {err}");
                Vec::new()
            }
        }
    }
}

impl std::fmt::Debug for HybridRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridRetriever")
            .field("weights", &self.weights)
            .field("rule_reference_weights", &self.rule_reference_weights)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bm25::{Bm25Index, Bm25Params};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use sage_vector_store::{Document, VectorStoreError};

    const RULES: [&str; 3] = [
        "405.1 the stack resolves last in first out",
        "117.3 priority passes after a spell resolves",
        "202.1 mana costs determine casting",
    ];

    struct FixedSimilarity(Vec<ScoredDocument>);

    #[async_trait]
    impl SimilaritySource for FixedSimilarity {
        async fn similarity_search(
            &self,
            _query: &str,
            k: usize,
        ) -> sage_vector_store::Result<Vec<ScoredDocument>> {
            Ok(self.0.iter().take(k).cloned().collect())
        }
    }

    struct OfflineSimilarity;

    #[async_trait]
    impl SimilaritySource for OfflineSimilarity {
        async fn similarity_search(
            &self,
            _query: &str,
            _k: usize,
        ) -> sage_vector_store::Result<Vec<ScoredDocument>> {
            Err(VectorStoreError::Unavailable("vector store offline".to_string()))
        }
    }

    fn bm25() -> Arc<Bm25Retriever> {
        let index = Bm25Index::from_documents(
            Bm25Params::default(),
            RULES.iter().map(|c| Document::new(*c)).collect(),
        );
        Arc::new(Bm25Retriever::from_index(index))
    }

    fn scored(idx: usize, score: f64) -> ScoredDocument {
        ScoredDocument::new(Document::new(RULES[idx]), score)
    }

    #[tokio::test]
    async fn vector_failure_falls_back_to_bm25() {
        let hybrid = HybridRetriever::new(bm25(), Arc::new(OfflineSimilarity));
        let results = hybrid.search("stack", 5).await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document.content, RULES[0]);
        assert!((results[0].score - 0.3).abs() < 1e-12);
    }

    #[tokio::test]
    async fn no_candidates_anywhere_is_empty() {
        let hybrid = HybridRetriever::new(bm25(), Arc::new(FixedSimilarity(vec![])));
        assert!(hybrid.search("unrelated words", 5).await.is_empty());
        assert!(hybrid.search("stack", 0).await.is_empty());
    }

    #[tokio::test]
    async fn adaptive_search_favours_bm25_for_rule_numbers() {
        let vectors = Arc::new(FixedSimilarity(vec![scored(1, 0.9), scored(0, 0.1)]));
        let hybrid = HybridRetriever::new(bm25(), vectors);

        let plain = hybrid.search("rule 405", 2).await;
        assert_eq!(plain[0].document.content, RULES[1]);

        let adaptive = hybrid.search_adaptive("rule 405", 2).await;
        assert_eq!(adaptive[0].document.content, RULES[0]);
        assert!((adaptive[0].score - 0.7).abs() < 1e-12);
    }

    #[tokio::test]
    async fn adaptive_search_expands_concepts_to_rule_sections() {
        let index = Bm25Index::from_documents(
            Bm25Params::default(),
            vec![
                Document::new("405.5 when all players pass in succession, top object leaves"),
                Document::new("117.3 priority passes after a spell resolves"),
                Document::new("202.1 mana costs determine casting"),
                Document::new("601.2 casting a spell follows steps"),
            ],
        );
        let hybrid = HybridRetriever::new(
            Arc::new(Bm25Retriever::from_index(index)),
            Arc::new(OfflineSimilarity),
        );

        assert!(hybrid.search("how does the stack work", 3).await.is_empty());
        let adaptive = hybrid.search_adaptive("how does the stack work", 3).await;
        assert!(adaptive[0].document.content.starts_with("405.5"));
    }

    #[tokio::test]
    async fn adaptive_search_puts_cited_rule_first() {
        let vectors = Arc::new(FixedSimilarity(vec![scored(0, 0.9), scored(1, 0.5)]));
        let hybrid = HybridRetriever::new(bm25(), vectors);
        let query = "the stack and rule 117.3";

        let plain = hybrid.search(query, 2).await;
        assert_eq!(plain[0].document.content, RULES[0]);

        let adaptive = hybrid.search_adaptive(query, 2).await;
        let contents: Vec<&str> = adaptive.iter().map(|r| r.document.content.as_str()).collect();
        assert_eq!(contents, vec![RULES[1], RULES[0]]);
        assert!(adaptive[0].score >= adaptive[1].score);
    }

    #[tokio::test]
    async fn vector_only_search_honours_min_score() {
        let vectors = Arc::new(FixedSimilarity(vec![
            scored(0, 0.8),
            scored(1, 0.4),
            scored(2, f64::NAN),
        ]));
        let hybrid = HybridRetriever::new(bm25(), vectors);

        assert_eq!(hybrid.search_vector("stack", 3, None).await.len(), 2);
        let strong = hybrid.search_vector("stack", 3, Some(0.5)).await;
        assert_eq!(strong.len(), 1);
        assert_eq!(strong[0].document.content, RULES[0]);
    }

    #[tokio::test]
    async fn custom_weights_apply() {
        let vectors = Arc::new(FixedSimilarity(vec![scored(1, 0.9)]));
        let hybrid =
            HybridRetriever::new(bm25(), vectors).with_weights(FusionWeights::new(0.0, 1.0));
        let results = hybrid.search("stack", 2).await;
        assert_eq!(results[0].document.content, RULES[0]);
        assert_eq!(results[0].score, 1.0);
        assert_eq!(results[1].score, 0.0);
    }
}

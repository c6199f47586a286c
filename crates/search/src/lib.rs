//! # Sage Search
//!
//! Keyword and hybrid ranking over the rules corpus.
//!
//! - [`Bm25Index`]: Okapi BM25 with a versioned, cacheable snapshot
//! - [`Bm25Retriever`]: build-or-load once, then serve searches concurrently
//! - [`HybridRetriever`]: BM25 and vector similarity merged by min-max
//!   normalized weighted fusion
//! - [`QueryExpander`]: concept-to-rule-section query expansion for the
//!   adaptive path
//! - [`RetrievalEngine`]: the `bm25_search` / `hybrid_search` entry points
//!   returning protocol [`SearchHit`](sage_protocol::SearchHit)s

mod bm25;
mod cache;
mod config;
mod engine;
mod error;
mod fusion;
mod hybrid;
mod query_classifier;
mod query_expansion;
mod retriever;
mod tokenizer;

pub use bm25::{
    idf, term_score, Bm25Index, Bm25Params, BM25_SNAPSHOT_SCHEMA_VERSION, DEFAULT_B, DEFAULT_K1,
};
pub use cache::{CacheStore, FileCacheStore, MemoryCacheStore};
pub use config::{
    CacheBackend, CacheConfig, CorpusConfig, EmbedderConfig, EmbedderKind, HybridConfig,
    RetrievalConfig, DEFAULT_K, DEFAULT_RULE_REFERENCE_BM25_WEIGHT,
    DEFAULT_RULE_REFERENCE_VECTOR_WEIGHT,
};
pub use engine::{to_hits, RetrievalEngine};
pub use error::{Result, SearchError};
pub use fusion::{
    fuse, min_max_normalize, DocumentIdentity, DocumentKey, FusionWeights, DEFAULT_BM25_WEIGHT,
    DEFAULT_VECTOR_WEIGHT,
};
pub use hybrid::HybridRetriever;
pub use query_classifier::{QueryClassifier, QueryType};
pub use query_expansion::{cites_rule, prioritize, QueryExpander, RULE_PRIORITY_LIMIT};
pub use retriever::{bm25_cache_key, Bm25Retriever};
pub use tokenizer::tokenize;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use sage_search::{
    bm25_cache_key, fuse, Bm25Index, Bm25Params, Bm25Retriever, CacheStore, DocumentIdentity,
    FileCacheStore, FusionWeights, HybridRetriever, RetrievalConfig, RetrievalEngine,
};
use sage_vector_store::{
    Document, RulesCorpus, ScoredDocument, SimilaritySource, StubEmbedder, VectorStore,
};
use std::sync::Arc;
use tempfile::TempDir;

const CORPUS: [&str; 3] = [
    "the stack resolves last in first out",
    "priority passes after a spell resolves",
    "mana costs determine casting",
];

const RULES_TEXT: &str = "\
405.1. When a spell is cast, the physical card is put on the stack.

405.2. The stack keeps track of the order that spells were added. It resolves last in, first out.

117.3a The active player receives priority at the beginning of most steps and phases.

117.4. If all players pass in succession, the spell or ability on top of the stack resolves.

202.1. A card's mana cost is indicated by mana symbols near the top of the card.

601.2. To cast a spell is to take it from where it is and put it on the stack.
";

fn corpus_documents() -> Vec<Document> {
    CORPUS.iter().map(|c| Document::new(*c)).collect()
}

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

#[test]
fn stack_resolve_ranks_exact_match_and_excludes_non_matching() {
    let index = Bm25Index::from_documents(Bm25Params::default(), corpus_documents());
    let results = index.search("stack resolve", 2);

    // "resolves" is not "resolve" without stemming, so only the stack passage scores.
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document.content, CORPUS[0]);
    assert!(results[0].score > 0.0);
    assert!(results
        .iter()
        .all(|r| r.document.content != CORPUS[2]));
}

#[test]
fn empty_corpus_searches_cleanly() {
    let index = Bm25Index::build(Bm25Params::default(), Vec::new(), Vec::new()).unwrap();
    assert!(index.is_empty());
    assert!(index.search("anything", 5).is_empty());
}

#[test]
fn unknown_terms_return_nothing() {
    let index = Bm25Index::from_documents(Bm25Params::default(), corpus_documents());
    assert!(index.search("trample lifelink", 5).is_empty());
}

#[test]
fn repeated_searches_are_identical() {
    let corpus = RulesCorpus::from_rules_text("rules.txt", RULES_TEXT);
    let index = Bm25Index::from_documents(Bm25Params::default(), corpus.into_documents());
    let first = index.search("stack spell resolves", 4);
    for _ in 0..5 {
        assert_eq!(index.search("stack spell resolves", 4), first);
    }
}

#[tokio::test]
async fn hybrid_scenario_single_shared_document_scores_one() {
    let x = Document::new(CORPUS[0]);

    let fused = fuse(
        vec![ScoredDocument::new(x.clone(), 0.9)],
        vec![ScoredDocument::new(x.clone(), 4.2)],
        FusionWeights::new(0.7, 0.3),
        DocumentIdentity::ContentHash,
        5,
    );
    assert_eq!(fused.len(), 1);
    assert_eq!(fused[0].score, 1.0);

    // Same through the retriever, with BM25 producing X as its only positive hit.
    let bm25 = Arc::new(Bm25Retriever::from_index(Bm25Index::from_documents(
        Bm25Params::default(),
        corpus_documents(),
    )));
    let hybrid = HybridRetriever::new(bm25, Arc::new(FixedSimilarity(vec![
        ScoredDocument::new(x.clone(), 0.9),
    ])));
    let results = hybrid.search("stack", 5).await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].document, x);
    assert_eq!(results[0].score, 1.0);
}

#[tokio::test]
async fn file_cache_roundtrip_reproduces_results() {
    let tmp = TempDir::new().unwrap();
    let corpus = RulesCorpus::from_rules_text("rules.txt", RULES_TEXT);
    let key = bm25_cache_key(&corpus.fingerprint());
    let cache = Arc::new(FileCacheStore::new(tmp.path().join("cache").join("bm25")));

    let built = Bm25Retriever::new(
        Arc::new(corpus.clone()),
        cache.clone(),
        key.clone(),
        Bm25Params::default(),
    );
    let built_index = built.initialize(false).await;
    assert!(cache.path_for(&key).exists());

    // A fresh retriever with an empty source can only answer from the cache.
    let reloaded = Bm25Retriever::new(
        Arc::new(RulesCorpus::default()),
        cache.clone(),
        key,
        Bm25Params::default(),
    );
    let loaded_index = reloaded.initialize(false).await;
    assert_eq!(loaded_index.len(), built_index.len());

    for query in [
        "stack",
        "priority players pass",
        "mana cost symbols",
        "cast spell",
        "405.2",
        "nothing matches this",
    ] {
        assert_eq!(
            reloaded.search(query, 6).await,
            built.search(query, 6).await,
            "query {query}"
        );
    }
}

#[tokio::test]
async fn corrupt_cache_file_is_rebuilt() {
    let tmp = TempDir::new().unwrap();
    let corpus = RulesCorpus::from_rules_text("rules.txt", RULES_TEXT);
    let cache = Arc::new(FileCacheStore::new(tmp.path()));
    let key = bm25_cache_key("mtg");
    cache.write(&key, b"\x00\x01 definitely not json").await.unwrap();

    let retriever = Bm25Retriever::new(
        Arc::new(corpus.clone()),
        cache.clone(),
        key.clone(),
        Bm25Params::default(),
    );
    let index = retriever.initialize(false).await;
    assert_eq!(index.len(), corpus.len());

    let bytes = cache.read(&key).await.unwrap();
    assert_eq!(
        Bm25Index::from_bytes(Bm25Params::default(), &bytes)
            .unwrap()
            .len(),
        corpus.len()
    );
}

#[tokio::test]
async fn engine_over_rules_text_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let corpus = Arc::new(RulesCorpus::from_rules_text("rules.txt", RULES_TEXT));

    let mut store = VectorStore::new(
        tmp.path().join("vectors.json"),
        Arc::new(StubEmbedder::default()),
    );
    store.add_documents(corpus.documents().to_vec()).unwrap();

    let bm25 = Arc::new(Bm25Retriever::new(
        corpus.clone(),
        Arc::new(FileCacheStore::new(tmp.path().join("cache"))),
        bm25_cache_key(&corpus.fingerprint()),
        Bm25Params::default(),
    ));
    let engine = RetrievalEngine::new(RetrievalConfig::default(), bm25, Arc::new(store));
    assert_eq!(engine.warm_up().await, 6);

    let keyword = engine.bm25_search("priority", 3).await;
    assert_eq!(keyword[0].rule.as_deref(), Some("117.3a"));
    assert_eq!(keyword[0].rank, 1);

    let hybrid = engine.hybrid_search("what happens when the stack resolves", 3).await;
    assert!(!hybrid.is_empty());
    assert!(hybrid.len() <= 3);
    assert!(hybrid.windows(2).all(|w| w[0].score >= w[1].score));
    assert!(hybrid.iter().all(|h| (0.0..=1.0).contains(&h.score)));
}

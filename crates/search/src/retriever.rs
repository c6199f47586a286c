use crate::bm25::{Bm25Index, Bm25Params, BM25_SNAPSHOT_SCHEMA_VERSION};
use crate::cache::{CacheStore, MemoryCacheStore};
use sage_vector_store::{DocumentSource, ScoredDocument, StaticDocuments};
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::Mutex;

/// Cache key for the BM25 snapshot of one corpus version.
#[must_use]
pub fn bm25_cache_key(corpus_id: &str) -> String {
    format!("bm25-v{BM25_SNAPSHOT_SCHEMA_VERSION}-{corpus_id}")
}

/// Owns the BM25 index for one corpus: loads it from the cache or builds it
/// from the document source, once, and serves searches from it.
///
/// Searches run on a shared `Arc` of the current index and never wait on a
/// build that is already finished. [`rebuild`](Self::rebuild) swaps in a new
/// index; searches already in flight finish on the old one.
pub struct Bm25Retriever {
    source: Arc<dyn DocumentSource>,
    cache: Arc<dyn CacheStore>,
    cache_key: String,
    fingerprint: Option<String>,
    params: Bm25Params,
    current: RwLock<Option<Arc<Bm25Index>>>,
    init: Mutex<()>,
}

impl Bm25Retriever {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        cache: Arc<dyn CacheStore>,
        cache_key: impl Into<String>,
        params: Bm25Params,
    ) -> Self {
        Self {
            source,
            cache,
            cache_key: cache_key.into(),
            fingerprint: None,
            params,
            current: RwLock::new(None),
            init: Mutex::new(()),
        }
    }

    /// A retriever serving a prebuilt index, with no backing source or cache.
    #[must_use]
    pub fn from_index(index: Bm25Index) -> Self {
        let params = index.params();
        let retriever = Self::new(
            Arc::new(StaticDocuments::new(Vec::new())),
            Arc::new(MemoryCacheStore::new()),
            bm25_cache_key("in-memory"),
            params,
        );
        retriever.install(Arc::new(index));
        retriever
    }

    /// Expected corpus version. A cached snapshot tagged with another
    /// version (or untagged) is ignored and rebuilt, even under the same key.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    #[must_use]
    pub fn cache_key(&self) -> &str {
        &self.cache_key
    }

    #[must_use]
    pub const fn params(&self) -> Bm25Params {
        self.params
    }

    /// The installed index, if initialization already ran.
    #[must_use]
    pub fn current(&self) -> Option<Arc<Bm25Index>> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Loads the index from the cache or builds it, unless one is installed.
    ///
    /// With `force_rebuild` the cache is skipped and a fresh index replaces
    /// the current one. Never fails: a source that cannot be listed yields an
    /// empty index, which is not persisted, so a later rebuild can recover.
    pub async fn initialize(&self, force_rebuild: bool) -> Arc<Bm25Index> {
        let _guard = self.init.lock().await;

        if !force_rebuild {
            if let Some(index) = self.current() {
                return index;
            }
            if let Some(index) = self.load_cached().await {
                let index = Arc::new(index);
                self.install(Arc::clone(&index));
                return index;
            }
        }

        let index = Arc::new(self.build().await);
        self.install(Arc::clone(&index));
        index
    }

    pub async fn rebuild(&self) -> Arc<Bm25Index> {
        self.initialize(true).await
    }

    /// BM25 search, initializing on first use.
    pub async fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        let index = match self.current() {
            Some(index) => index,
            None => self.initialize(false).await,
        };
        index.search(query, k)
    }

    fn install(&self, index: Arc<Bm25Index>) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(index);
    }

    async fn load_cached(&self) -> Option<Bm25Index> {
        let bytes = self.cache.read(&self.cache_key).await?;
        match Bm25Index::from_bytes(self.params, &bytes) {
            Ok(index) if self.is_stale(&index) => {
                log::warn!(
                    "BM25 cache '{}' was built from another corpus version, rebuilding",
                    self.cache_key
                );
                None
            }
            Ok(index) => {
                log::info!(
                    "Loaded BM25 index from cache '{}' ({} documents)",
                    self.cache_key,
                    index.len()
                );
                Some(index)
            }
            Err(err) => {
                log::warn!(
                    "Ignoring unusable BM25 cache '{}', rebuilding: {err}",
                    self.cache_key
                );
                None
            }
        }
    }

    fn is_stale(&self, index: &Bm25Index) -> bool {
        self.fingerprint
            .as_deref()
            .is_some_and(|expected| index.fingerprint() != Some(expected))
    }

    async fn build(&self) -> Bm25Index {
        let start = Instant::now();
        let documents = match self.source.list_all_documents().await {
            Ok(documents) => documents,
            Err(err) => {
                log::warn!("Failed to list documents for BM25 index: {err}");
                return Bm25Index::empty(self.params);
            }
        };

        let mut index = Bm25Index::from_documents(self.params, documents);
        if let Some(fingerprint) = &self.fingerprint {
            index = index.with_fingerprint(fingerprint.clone());
        }
        log::info!(
            "BM25 index ready in {:.2}s",
            start.elapsed().as_secs_f64()
        );

        match index.to_bytes() {
            Ok(bytes) => {
                if let Err(err) = self.cache.write(&self.cache_key, &bytes).await {
                    log::warn!("Failed to persist BM25 cache '{}': {err}", self.cache_key);
                }
            }
            Err(err) => log::warn!("Failed to serialize BM25 index: {err}"),
        }

        index
    }
}

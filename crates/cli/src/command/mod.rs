pub(crate) mod index;
pub(crate) mod search;

use sage_search::{
    bm25_cache_key, CacheBackend, CacheStore, FileCacheStore, MemoryCacheStore, RetrievalConfig,
    SearchError,
};
use sage_vector_store::{
    bm25_cache_dir, corpus_path, vector_store_path, Embedder, RulesCorpus, VectorStoreError,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const INDEX_HINT: &str = "Run `stack-sage index --rules <MagicCompRules.txt>` first.";

/// Where one invocation keeps its state, and how it ranks.
pub(crate) struct Workspace {
    data_dir: PathBuf,
    config: RetrievalConfig,
}

impl Workspace {
    pub(crate) const fn new(data_dir: PathBuf, config: RetrievalConfig) -> Self {
        Self { data_dir, config }
    }

    pub(crate) fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub(crate) const fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub(crate) fn corpus_path(&self) -> PathBuf {
        corpus_path(&self.data_dir)
    }

    pub(crate) fn vector_store_path(&self) -> PathBuf {
        vector_store_path(&self.data_dir)
    }

    pub(crate) fn embedder(&self) -> Arc<dyn Embedder> {
        self.config.embedder.build()
    }

    pub(crate) fn cache(&self) -> Arc<dyn CacheStore> {
        match self.config.cache.backend {
            CacheBackend::Memory => Arc::new(MemoryCacheStore::new()),
            CacheBackend::File => {
                let dir = self
                    .config
                    .cache
                    .dir
                    .clone()
                    .unwrap_or_else(|| bm25_cache_dir(&self.data_dir));
                Arc::new(FileCacheStore::new(dir))
            }
        }
    }

    /// Keyed by the configured corpus id, else by the corpus content.
    pub(crate) fn cache_key(&self, corpus: &RulesCorpus) -> String {
        match self.config.corpus.id.as_deref() {
            Some(id) => bm25_cache_key(id),
            None => bm25_cache_key(&corpus.fingerprint()),
        }
    }
}

/// Stable error code and an optional next step for JSON error output.
pub(crate) fn classify_error(err: &anyhow::Error) -> (&'static str, Option<String>) {
    for cause in err.chain() {
        if let Some(search_err) = cause.downcast_ref::<SearchError>() {
            if matches!(search_err, SearchError::InvalidConfig(_)) {
                return ("invalid_config", None);
            }
        }
        if let Some(VectorStoreError::IoError(io_err)) = cause.downcast_ref::<VectorStoreError>() {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                return ("not_found", Some(INDEX_HINT.to_string()));
            }
        }
        if let Some(VectorStoreError::SchemaMismatch { .. }) =
            cause.downcast_ref::<VectorStoreError>()
        {
            return ("index_incompatible", Some(INDEX_HINT.to_string()));
        }
        if let Some(io_err) = cause.downcast_ref::<std::io::Error>() {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                return ("not_found", None);
            }
        }
    }
    ("internal", None)
}

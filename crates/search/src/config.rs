//! Retrieval tuning loaded from a JSON or TOML file.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! Unknown keys are rejected rather than silently ignored.

use crate::bm25::Bm25Params;
use crate::error::{Result, SearchError};
use crate::fusion::{DocumentIdentity, FusionWeights, DEFAULT_BM25_WEIGHT, DEFAULT_VECTOR_WEIGHT};
use sage_vector_store::{Embedder, StubEmbedder, STUB_DEFAULT_DIMENSION};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const DEFAULT_K: usize = 8;
pub const DEFAULT_RULE_REFERENCE_VECTOR_WEIGHT: f64 = 0.3;
pub const DEFAULT_RULE_REFERENCE_BM25_WEIGHT: f64 = 0.7;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalConfig {
    pub bm25: Bm25Params,
    pub hybrid: HybridConfig,
    pub cache: CacheConfig,
    pub corpus: CorpusConfig,
    pub embedder: EmbedderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HybridConfig {
    pub vector_weight: f64,
    pub bm25_weight: f64,
    /// Weights used by adaptive search when the query cites a rule number.
    pub rule_reference_vector_weight: f64,
    pub rule_reference_bm25_weight: f64,
    pub k: usize,
    pub identity: DocumentIdentity,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            vector_weight: DEFAULT_VECTOR_WEIGHT,
            bm25_weight: DEFAULT_BM25_WEIGHT,
            rule_reference_vector_weight: DEFAULT_RULE_REFERENCE_VECTOR_WEIGHT,
            rule_reference_bm25_weight: DEFAULT_RULE_REFERENCE_BM25_WEIGHT,
            k: DEFAULT_K,
            identity: DocumentIdentity::default(),
        }
    }
}

impl HybridConfig {
    #[must_use]
    pub const fn weights(&self) -> FusionWeights {
        FusionWeights::new(self.vector_weight, self.bm25_weight)
    }

    #[must_use]
    pub const fn rule_reference_weights(&self) -> FusionWeights {
        FusionWeights::new(
            self.rule_reference_vector_weight,
            self.rule_reference_bm25_weight,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheBackend {
    #[default]
    File,
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub backend: CacheBackend,
    /// Overrides `<data-dir>/cache/bm25`.
    pub dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorpusConfig {
    /// Stable corpus identifier for the cache key. Defaults to the corpus
    /// content fingerprint.
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedderKind {
    /// Offline feature-hashing embedder.
    #[default]
    StubHash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmbedderConfig {
    pub kind: EmbedderKind,
    pub dimension: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            kind: EmbedderKind::default(),
            dimension: STUB_DEFAULT_DIMENSION,
        }
    }
}

impl EmbedderConfig {
    /// The embedder both indexing and querying must agree on; a store saved
    /// with another kind or dimension is refused on load.
    #[must_use]
    pub fn build(&self) -> Arc<dyn Embedder> {
        match self.kind {
            EmbedderKind::StubHash => Arc::new(StubEmbedder::new(self.dimension)),
        }
    }
}

impl RetrievalConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|err| {
            SearchError::InvalidConfig(format!("read config {}: {err}", path.display()))
        })?;
        Self::from_bytes(&bytes)
    }

    /// Parses JSON, falling back to TOML, then validates.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let value: serde_json::Value = match serde_json::from_slice(bytes) {
            Ok(value) => value,
            Err(json_err) => {
                let utf8 = std::str::from_utf8(bytes).map_err(|err| {
                    SearchError::InvalidConfig(format!("{json_err}; {err}"))
                })?;
                let toml_value: toml::Value = toml::from_str(utf8).map_err(|toml_err| {
                    SearchError::InvalidConfig(format!(
                        "config is not valid JSON or TOML ({json_err}); TOML parse error: {toml_err}"
                    ))
                })?;
                serde_json::to_value(toml_value).map_err(|err| {
                    SearchError::InvalidConfig(format!("convert TOML config to JSON: {err}"))
                })?
            }
        };

        let config: Self = serde_json::from_value(value)
            .map_err(|err| SearchError::InvalidConfig(format!("config parse error: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.bm25.validate()?;
        self.hybrid.weights().validate()?;
        self.hybrid.rule_reference_weights().validate()?;
        if self.hybrid.k == 0 {
            return Err(SearchError::InvalidConfig(
                "hybrid.k must be at least 1".to_string(),
            ));
        }
        if self
            .corpus
            .id
            .as_deref()
            .is_some_and(|id| id.trim().is_empty())
        {
            return Err(SearchError::InvalidConfig(
                "corpus.id must not be blank".to_string(),
            ));
        }
        if self.embedder.dimension == 0 {
            return Err(SearchError::InvalidConfig(
                "embedder.dimension must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

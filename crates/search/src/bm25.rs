//! Okapi BM25 over a fixed, in-memory rules corpus.
//!
//! The index is built once (or restored from a snapshot) and is read-only
//! afterwards. A document's position in the corpus is its id everywhere.

use crate::error::{Result, SearchError};
use crate::tokenizer::tokenize;
use sage_vector_store::{Document, Metadata, ScoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

pub const DEFAULT_K1: f64 = 1.2;
pub const DEFAULT_B: f64 = 0.75;

pub const BM25_SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Term-frequency saturation (`k1`) and length normalization (`b`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: DEFAULT_K1,
            b: DEFAULT_B,
        }
    }
}

impl Bm25Params {
    pub fn validate(&self) -> Result<()> {
        if !self.k1.is_finite() || self.k1 < 0.0 {
            return Err(SearchError::InvalidConfig(format!(
                "bm25.k1 must be a finite value >= 0 (got {})",
                self.k1
            )));
        }
        if !(0.0..=1.0).contains(&self.b) {
            return Err(SearchError::InvalidConfig(format!(
                "bm25.b must be within [0, 1] (got {})",
                self.b
            )));
        }
        Ok(())
    }
}

/// `ln((N - df + 0.5) / (df + 0.5))`. Negative for terms in more than half the corpus.
#[must_use]
pub fn idf(total_docs: usize, doc_freq: u32) -> f64 {
    let n = total_docs as f64;
    let df = f64::from(doc_freq);
    ((n - df + 0.5) / (df + 0.5)).ln()
}

/// Contribution of one matching query term to a document's score.
#[must_use]
pub fn term_score(
    params: Bm25Params,
    tf: u32,
    idf: f64,
    doc_length: u32,
    avg_doc_length: f64,
) -> f64 {
    if avg_doc_length <= 0.0 {
        return 0.0;
    }
    let tf = f64::from(tf);
    let numerator = tf * (params.k1 + 1.0);
    let denominator = tf
        + params.k1 * (1.0 - params.b + params.b * (f64::from(doc_length) / avg_doc_length));
    idf * numerator / denominator
}

#[derive(Debug, Clone)]
pub struct Bm25Index {
    params: Bm25Params,
    documents: Vec<String>,
    doc_metadata: Vec<Metadata>,
    vocabulary: HashSet<String>,
    doc_freqs: HashMap<String, u32>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f64,
    fingerprint: Option<String>,
}

impl Bm25Index {
    /// An index with no documents; every search on it returns nothing.
    #[must_use]
    pub fn empty(params: Bm25Params) -> Self {
        Self {
            params,
            documents: Vec::new(),
            doc_metadata: Vec::new(),
            vocabulary: HashSet::new(),
            doc_freqs: HashMap::new(),
            term_freqs: Vec::new(),
            doc_lengths: Vec::new(),
            avg_doc_length: 0.0,
            fingerprint: None,
        }
    }

    /// Builds the index from parallel content and metadata sequences.
    pub fn build(
        params: Bm25Params,
        documents: Vec<String>,
        metadata: Vec<Metadata>,
    ) -> Result<Self> {
        if documents.len() != metadata.len() {
            return Err(SearchError::InvalidInput(format!(
                "{} documents but {} metadata entries",
                documents.len(),
                metadata.len()
            )));
        }

        log::info!("Building BM25 index over {} documents", documents.len());

        let mut index = Self::empty(params);
        index.term_freqs.reserve(documents.len());
        index.doc_lengths.reserve(documents.len());

        for text in &documents {
            let tokens = tokenize(text);
            let mut tf: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *tf.entry(token.clone()).or_insert(0) += 1;
            }

            for term in tf.keys() {
                index.vocabulary.insert(term.clone());
                *index.doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }

            index.doc_lengths.push(u32::try_from(tokens.len()).unwrap_or(u32::MAX));
            index.term_freqs.push(tf);
        }

        index.avg_doc_length = mean(&index.doc_lengths);
        index.documents = documents;
        index.doc_metadata = metadata;

        log::info!(
            "BM25 index built: documents={}, vocabulary={}, avg_doc_length={:.1}",
            index.documents.len(),
            index.vocabulary.len(),
            index.avg_doc_length
        );

        Ok(index)
    }

    #[must_use]
    pub fn from_documents(params: Bm25Params, documents: Vec<Document>) -> Self {
        let (contents, metadata): (Vec<String>, Vec<Metadata>) = documents
            .into_iter()
            .map(|doc| (doc.content, doc.metadata))
            .unzip();
        match Self::build(params, contents, metadata) {
            Ok(index) => index,
            // unzip always yields sequences of equal length
            Err(_) => Self::empty(params),
        }
    }

    /// BM25 score of one document for already-tokenized query terms.
    ///
    /// Repeated query terms contribute once per occurrence. Out-of-range
    /// indexes score 0.
    #[must_use]
    pub fn score(&self, query_terms: &[String], doc_index: usize) -> f64 {
        let (Some(term_freq), Some(&doc_length)) = (
            self.term_freqs.get(doc_index),
            self.doc_lengths.get(doc_index),
        ) else {
            return 0.0;
        };

        let total_docs = self.documents.len();
        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *term_freq.get(term)?;
                let df = self.doc_freqs.get(term).copied().unwrap_or(0);
                Some(term_score(
                    self.params,
                    tf,
                    idf(total_docs, df),
                    doc_length,
                    self.avg_doc_length,
                ))
            })
            .sum()
    }

    /// Top `k` documents with a strictly positive score, best first.
    ///
    /// Equal scores keep corpus order.
    #[must_use]
    pub fn search(&self, query: &str, k: usize) -> Vec<ScoredDocument> {
        if self.documents.is_empty() {
            log::warn!("BM25 index is empty; returning no results for '{query}'");
            return Vec::new();
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f64)> = (0..self.documents.len())
            .filter_map(|idx| {
                let score = self.score(&query_terms, idx);
                (score > 0.0).then_some((idx, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        log::debug!("BM25 '{}': {} results", query, scored.len());

        scored
            .into_iter()
            .filter_map(|(idx, score)| self.document(idx).map(|doc| ScoredDocument::new(doc, score)))
            .collect()
    }

    #[must_use]
    pub fn document(&self, idx: usize) -> Option<Document> {
        let content = self.documents.get(idx)?;
        Some(Document {
            content: content.clone(),
            metadata: self.doc_metadata.get(idx).cloned().unwrap_or_default(),
        })
    }

    /// Tags the index with the version of the corpus it was built from.
    /// The tag travels with the snapshot.
    #[must_use]
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    #[must_use]
    pub const fn params(&self) -> Bm25Params {
        self.params
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    #[must_use]
    pub fn vocabulary_len(&self) -> usize {
        self.vocabulary.len()
    }

    #[must_use]
    pub fn doc_freq(&self, term: &str) -> u32 {
        self.doc_freqs.get(term).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn doc_length(&self, idx: usize) -> Option<u32> {
        self.doc_lengths.get(idx).copied()
    }

    #[must_use]
    pub const fn avg_doc_length(&self) -> f64 {
        self.avg_doc_length
    }

    /// Serializes the full index state under an explicit, versioned schema.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let snapshot = Bm25Snapshot {
            schema_version: BM25_SNAPSHOT_SCHEMA_VERSION,
            documents: self.documents.clone(),
            doc_metadata: self.doc_metadata.clone(),
            vocabulary: self.vocabulary.iter().cloned().collect(),
            doc_freqs: self
                .doc_freqs
                .iter()
                .map(|(term, df)| (term.clone(), *df))
                .collect(),
            term_freqs: self
                .term_freqs
                .iter()
                .map(|tf| tf.iter().map(|(term, n)| (term.clone(), *n)).collect())
                .collect(),
            doc_lengths: self.doc_lengths.clone(),
            avg_doc_length: self.avg_doc_length,
            fingerprint: self.fingerprint.clone(),
        };
        Ok(serde_json::to_vec(&snapshot)?)
    }

    /// Restores an index written by [`to_bytes`](Self::to_bytes).
    ///
    /// Snapshots from another schema version or with inconsistent fields are
    /// rejected so the caller can rebuild instead of serving a corrupt index.
    pub fn from_bytes(params: Bm25Params, bytes: &[u8]) -> Result<Self> {
        let snapshot: Bm25Snapshot = serde_json::from_slice(bytes)?;
        snapshot.validate()?;

        // Recomputed so a restored index scores bit-for-bit like the original.
        let avg_doc_length = mean(&snapshot.doc_lengths);
        Ok(Self {
            params,
            documents: snapshot.documents,
            doc_metadata: snapshot.doc_metadata,
            vocabulary: snapshot.vocabulary.into_iter().collect(),
            doc_freqs: snapshot.doc_freqs.into_iter().collect(),
            term_freqs: snapshot
                .term_freqs
                .into_iter()
                .map(|tf| tf.into_iter().collect())
                .collect(),
            doc_lengths: snapshot.doc_lengths,
            avg_doc_length,
            fingerprint: snapshot.fingerprint,
        })
    }
}

fn mean(values: &[u32]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().map(|v| f64::from(*v)).sum::<f64>() / values.len() as f64
}

#[derive(Debug, Serialize, Deserialize)]
struct Bm25Snapshot {
    schema_version: u32,
    documents: Vec<String>,
    doc_metadata: Vec<Metadata>,
    vocabulary: BTreeSet<String>,
    doc_freqs: BTreeMap<String, u32>,
    term_freqs: Vec<BTreeMap<String, u32>>,
    doc_lengths: Vec<u32>,
    avg_doc_length: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fingerprint: Option<String>,
}

impl Bm25Snapshot {
    fn validate(&self) -> Result<()> {
        let corrupt = |msg: String| Err(SearchError::CacheError(msg));

        if self.schema_version != BM25_SNAPSHOT_SCHEMA_VERSION {
            return corrupt(format!(
                "unsupported BM25 snapshot schema_version {} (expected {BM25_SNAPSHOT_SCHEMA_VERSION})",
                self.schema_version
            ));
        }

        let n = self.documents.len();
        if self.doc_metadata.len() != n || self.term_freqs.len() != n || self.doc_lengths.len() != n
        {
            return corrupt(format!(
                "per-document fields disagree: documents={n}, metadata={}, term_freqs={}, doc_lengths={}",
                self.doc_metadata.len(),
                self.term_freqs.len(),
                self.doc_lengths.len()
            ));
        }

        if self.vocabulary.len() != self.doc_freqs.len()
            || !self.doc_freqs.keys().all(|term| self.vocabulary.contains(term))
        {
            return corrupt("vocabulary and document frequencies disagree".to_string());
        }

        for (idx, (tf, len)) in self.term_freqs.iter().zip(&self.doc_lengths).enumerate() {
            let total: u64 = tf.values().map(|n| u64::from(*n)).sum();
            if total != u64::from(*len) {
                return corrupt(format!(
                    "document {idx} has length {len} but {total} counted terms"
                ));
            }
            if tf.keys().any(|term| !self.doc_freqs.contains_key(term)) {
                return corrupt(format!("document {idx} uses a term missing from doc_freqs"));
            }
        }

        let expected_avg = mean(&self.doc_lengths);
        if !self.avg_doc_length.is_finite() || (self.avg_doc_length - expected_avg).abs() > 1e-6 {
            return corrupt(format!(
                "avg_doc_length {} does not match document lengths ({expected_avg})",
                self.avg_doc_length
            ));
        }

        Ok(())
    }
}

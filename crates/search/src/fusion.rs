use crate::error::{Result, SearchError};
use sage_vector_store::{Document, ScoredDocument};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const DEFAULT_VECTOR_WEIGHT: f64 = 0.7;
pub const DEFAULT_BM25_WEIGHT: f64 = 0.3;

/// How fusion decides that a vector hit and a BM25 hit are the same document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentIdentity {
    /// BLAKE3 of the full content.
    #[default]
    ContentHash,
    /// First 100 characters of the content. Distinct passages sharing a
    /// prefix collapse into one entry.
    ContentPrefix,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey(String);

impl DocumentKey {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl DocumentIdentity {
    #[must_use]
    pub fn key(self, document: &Document) -> DocumentKey {
        match self {
            Self::ContentHash => {
                DocumentKey(blake3::hash(document.content.as_bytes()).to_hex().to_string())
            }
            Self::ContentPrefix => DocumentKey(document.prefix_key().to_string()),
        }
    }
}

/// Linear weights applied to the normalized vector and BM25 scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionWeights {
    pub vector: f64,
    pub bm25: f64,
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            vector: DEFAULT_VECTOR_WEIGHT,
            bm25: DEFAULT_BM25_WEIGHT,
        }
    }
}

impl FusionWeights {
    #[must_use]
    pub const fn new(vector: f64, bm25: f64) -> Self {
        Self { vector, bm25 }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("vector", self.vector), ("bm25", self.bm25)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} weight must be within [0, 1] (got {value})"
                )));
            }
        }
        Ok(())
    }
}

/// Rescales scores onto [0, 1]. A flat list (including a single score) maps
/// to all 1.0.
#[must_use]
pub fn min_max_normalize(scores: &[f64]) -> Vec<f64> {
    let Some(first) = scores.first() else {
        return Vec::new();
    };
    let (min, max) = scores
        .iter()
        .fold((*first, *first), |(lo, hi), s| (lo.min(*s), hi.max(*s)));

    if max == min {
        return vec![1.0; scores.len()];
    }
    let range = max - min;
    scores.iter().map(|s| (s - min) / range).collect()
}

struct FusedEntry {
    document: Document,
    vector_score: f64,
    bm25_score: f64,
}

/// Merges two ranked lists by weighted sum of their min-max normalized scores.
///
/// A document missing from one list scores 0.0 on that side. Output order is
/// combined score descending; ties keep first-seen order (vector list, then
/// BM25-only documents).
#[must_use]
pub fn fuse(
    vector_results: Vec<ScoredDocument>,
    bm25_results: Vec<ScoredDocument>,
    weights: FusionWeights,
    identity: DocumentIdentity,
    k: usize,
) -> Vec<ScoredDocument> {
    let vector_results = finite_only("vector", vector_results);
    let bm25_results = finite_only("bm25", bm25_results);

    let vector_norm = min_max_normalize(&scores_of(&vector_results));
    let bm25_norm = min_max_normalize(&scores_of(&bm25_results));

    let mut entries: Vec<FusedEntry> = Vec::with_capacity(vector_results.len() + bm25_results.len());
    let mut positions: HashMap<DocumentKey, usize> = HashMap::new();

    for (hit, score) in vector_results.into_iter().zip(vector_norm) {
        let key = identity.key(&hit.document);
        match positions.get(&key) {
            Some(&pos) => {
                entries[pos].document = hit.document;
                entries[pos].vector_score = score;
            }
            None => {
                positions.insert(key, entries.len());
                entries.push(FusedEntry {
                    document: hit.document,
                    vector_score: score,
                    bm25_score: 0.0,
                });
            }
        }
    }

    for (hit, score) in bm25_results.into_iter().zip(bm25_norm) {
        let key = identity.key(&hit.document);
        match positions.get(&key) {
            Some(&pos) => entries[pos].bm25_score = score,
            None => {
                positions.insert(key, entries.len());
                entries.push(FusedEntry {
                    document: hit.document,
                    vector_score: 0.0,
                    bm25_score: score,
                });
            }
        }
    }

    let mut fused: Vec<ScoredDocument> = entries
        .into_iter()
        .map(|entry| {
            let combined = weights.vector * entry.vector_score + weights.bm25 * entry.bm25_score;
            ScoredDocument::new(entry.document, combined)
        })
        .collect();

    fused.sort_by(|a, b| b.score.total_cmp(&a.score));
    fused.truncate(k);
    fused
}

fn scores_of(results: &[ScoredDocument]) -> Vec<f64> {
    results.iter().map(|r| r.score).collect()
}

fn finite_only(source: &str, results: Vec<ScoredDocument>) -> Vec<ScoredDocument> {
    let before = results.len();
    let kept: Vec<ScoredDocument> = results.into_iter().filter(|r| r.score.is_finite()).collect();
    if kept.len() != before {
        log::warn!(
            "Dropped {} {source} results with non-finite scores",
            before - kept.len()
        );
    }
    kept
}

use crate::error::{Result, VectorStoreError};
use ndarray::ArrayView1;

/// Turns text into fixed-width vectors. The model behind it is opaque to the
/// rest of the workspace; only the id and dimension are persisted.
pub trait Embedder: Send + Sync {
    fn id(&self) -> &str;

    fn dimension(&self) -> usize;

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])?
            .pop()
            .ok_or_else(|| VectorStoreError::EmbeddingError("empty embedding batch".to_string()))
    }
}

pub const STUB_EMBEDDER_ID: &str = "stub-hash";
pub const STUB_DEFAULT_DIMENSION: usize = 256;

/// Weight of character trigrams relative to whole tokens.
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Deterministic feature-hashing embedder.
///
/// Tokens and their character trigrams are hashed into signed buckets and the
/// result is L2-normalized, so texts sharing vocabulary (including inflected
/// forms like `resolve`/`resolves`) land close together. It needs no model
/// download and is what the CLI and the tests run against.
#[derive(Clone, Debug)]
pub struct StubEmbedder {
    dimension: usize,
}

impl StubEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for StubEmbedder {
    fn default() -> Self {
        Self::new(STUB_DEFAULT_DIMENSION)
    }
}

impl Embedder for StubEmbedder {
    fn id(&self) -> &str {
        STUB_EMBEDDER_ID
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| stub_embed(text, self.dimension))
            .collect())
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut vec = vec![0.0f32; dimension];
    let lowered = text.to_lowercase();
    for token in lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        add_feature(&mut vec, token.as_bytes(), 1.0);

        let chars: Vec<char> = token.chars().collect();
        if chars.len() > 3 {
            for window in chars.windows(3) {
                let gram: String = window.iter().collect();
                add_feature(&mut vec, gram.as_bytes(), TRIGRAM_WEIGHT);
            }
        }
    }
    normalize(&mut vec);
    vec
}

fn add_feature(vec: &mut [f32], bytes: &[u8], weight: f32) {
    let mut state = fnv1a_64(bytes);
    let bits = splitmix64(&mut state);
    #[allow(clippy::cast_possible_truncation)]
    let bucket = (bits % vec.len() as u64) as usize;
    let sign = if bits >> 63 == 0 { 1.0 } else { -1.0 };
    vec[bucket] += sign * weight;
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Cosine similarity in [-1, 1]; 0 for mismatched or zero-length vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    a.dot(&b) / (norm_a * norm_b)
}

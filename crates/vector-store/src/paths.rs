use std::path::{Path, PathBuf};

pub const DATA_DIR_NAME: &str = ".stack-sage";

pub const CORPUS_FILE_NAME: &str = "corpus.json";
pub const VECTOR_STORE_FILE_NAME: &str = "vectors.json";
pub const CACHE_DIR_NAME: &str = "cache";
pub const BM25_CACHE_DIR_NAME: &str = "bm25";

#[must_use]
pub fn default_data_dir() -> PathBuf {
    PathBuf::from(DATA_DIR_NAME)
}

#[must_use]
pub fn corpus_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CORPUS_FILE_NAME)
}

#[must_use]
pub fn vector_store_path(data_dir: &Path) -> PathBuf {
    data_dir.join(VECTOR_STORE_FILE_NAME)
}

#[must_use]
pub fn bm25_cache_dir(data_dir: &Path) -> PathBuf {
    data_dir.join(CACHE_DIR_NAME).join(BM25_CACHE_DIR_NAME)
}

/// Maps an arbitrary key onto a single safe file-name component.
#[must_use]
pub fn safe_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.') {
            out.push(ch);
        } else {
            out.push('_');
        }
    }
    if out.is_empty() || out.chars().all(|c| c == '.') {
        "_".to_string()
    } else {
        out
    }
}

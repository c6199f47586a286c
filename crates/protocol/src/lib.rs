use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SEARCH_RESPONSE_SCHEMA_VERSION: u32 = 1;

/// Open key-value metadata attached to every rules passage.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    #[default]
    Hybrid,
    Adaptive,
    Bm25,
    Vector,
}

impl SearchMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hybrid => "hybrid",
            Self::Adaptive => "adaptive",
            Self::Bm25 => "bm25",
            Self::Vector => "vector",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hybrid" => Ok(Self::Hybrid),
            "adaptive" => Ok(Self::Adaptive),
            "bm25" | "keyword" => Ok(Self::Bm25),
            "vector" | "semantic" => Ok(Self::Vector),
            other => Err(format!(
                "unknown search mode '{other}' (expected hybrid|adaptive|bm25|vector)"
            )),
        }
    }
}

/// One ranked rules passage as handed to the answering pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchHit {
    /// 1-based position in the result list.
    pub rank: usize,
    pub content: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub score: f64,
    /// First rule number cited by the passage, e.g. `104.3a`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rule: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchResponse {
    pub schema_version: u32,
    pub query: String,
    pub mode: SearchMode,
    pub k: usize,
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    #[must_use]
    pub fn new(query: impl Into<String>, mode: SearchMode, k: usize, hits: Vec<SearchHit>) -> Self {
        Self {
            schema_version: SEARCH_RESPONSE_SCHEMA_VERSION,
            query: query.into(),
            mode,
            k,
            hits,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

const CONTEXT_HEADER: &str = "=== COMPREHENSIVE RULES ===";

/// Renders hits as the plain-text rules block the answering prompt consumes.
///
/// Returns an empty string when there is nothing to cite so callers can test
/// for sparse context without parsing.
#[must_use]
pub fn render_rules_context(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return String::new();
    }

    let separator = "=".repeat(60);
    let mut out = format!("{CONTEXT_HEADER}\n\n");
    for hit in hits {
        out.push_str(&format!(
            "[Rule {}] (Relevance: {:.2})\n",
            hit.rank, hit.score
        ));
        out.push_str(&hit.content);
        out.push_str("\n\n");
        out.push_str(&separator);
        out.push_str("\n\n");
    }
    out
}

//! # Sage Vector Store
//!
//! Rules corpus handling and semantic similarity lookup for Stack Sage.
//!
//! ## Features
//!
//! - **Rules corpus** import from plain text or schema-versioned JSON
//! - **Collaborator traits** ([`DocumentSource`], [`SimilaritySource`]) the
//!   ranking core is written against
//! - **Exhaustive cosine search** over an in-process [`VectorStore`]
//! - **Pluggable embeddings** behind [`Embedder`], with a deterministic
//!   [`StubEmbedder`] that needs no model download
//!
//! ## Architecture
//!
//! ```text
//! rules.txt / corpus.json
//!     │
//!     ├──> RulesCorpus (DocumentSource)
//!     │
//!     ├──> Embedder
//!     │      └─> Vec<f32>
//!     │
//!     └──> VectorStore (DocumentSource + SimilaritySource)
//!            └─> vectors.json
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use sage_vector_store::{RulesCorpus, StubEmbedder, VectorStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let corpus = RulesCorpus::import("MagicCompRules.txt").await?;
//!
//!     let mut store = VectorStore::new(".stack-sage/vectors.json", Arc::new(StubEmbedder::default()));
//!     store.add_documents(corpus.into_documents())?;
//!     store.save().await?;
//!
//!     for hit in store.search("what happens when a spell resolves", 5)? {
//!         println!("{:.3}  {}", hit.score, hit.document.prefix_key());
//!     }
//!     Ok(())
//! }
//! ```

mod corpus;
mod embeddings;
mod error;
mod flat_index;
mod paths;
mod rules;
mod source;
mod store;
mod types;

pub use corpus::{RulesCorpus, RULES_CORPUS_SCHEMA_VERSION};
pub use embeddings::{cosine_similarity, Embedder, StubEmbedder, STUB_DEFAULT_DIMENSION, STUB_EMBEDDER_ID};
pub use error::{Result, VectorStoreError};
pub use paths::{
    bm25_cache_dir, corpus_path, default_data_dir, safe_component, vector_store_path,
    DATA_DIR_NAME,
};
pub use rules::extract_rule_number;
pub use source::{DocumentSource, SimilaritySource, StaticDocuments};
pub use store::{VectorStore, VECTOR_STORE_SCHEMA_VERSION};
pub use types::{Document, ScoredDocument, StoredDocument, PREFIX_KEY_CHARS};

pub use sage_protocol::Metadata;

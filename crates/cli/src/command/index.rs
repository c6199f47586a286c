use super::Workspace;
use crate::IndexArgs;
use anyhow::{Context as AnyhowContext, Result};
use sage_search::Bm25Retriever;
use sage_vector_store::{RulesCorpus, VectorStore};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct IndexReport {
    documents: usize,
    vocabulary: usize,
    avg_doc_length: f64,
    vectors: usize,
    embedder: String,
    dimension: usize,
    cache_key: String,
    corpus_path: PathBuf,
    vector_store_path: PathBuf,
}

pub(crate) async fn run(workspace: &Workspace, args: &IndexArgs) -> Result<String> {
    let corpus = RulesCorpus::import(&args.rules)
        .await
        .with_context(|| format!("Failed to import rules from {}", args.rules.display()))?;
    if corpus.is_empty() {
        log::warn!("{} contains no rules passages", args.rules.display());
    }

    let corpus_path = workspace.corpus_path();
    corpus
        .save(&corpus_path)
        .await
        .with_context(|| format!("Failed to write corpus {}", corpus_path.display()))?;
    log::info!("Imported {} passages into {}", corpus.len(), corpus_path.display());

    let embedder = workspace.embedder();
    let embedder_id = embedder.id().to_string();
    let dimension = embedder.dimension();
    let mut store = VectorStore::new(workspace.vector_store_path(), embedder);
    store
        .add_documents(corpus.documents().to_vec())
        .context("Failed to embed rules passages")?;
    store
        .save()
        .await
        .with_context(|| format!("Failed to write vector store {}", store.path().display()))?;

    let cache_key = workspace.cache_key(&corpus);
    let fingerprint = corpus.fingerprint();
    let documents = corpus.len();
    let retriever = Bm25Retriever::new(
        Arc::new(corpus),
        workspace.cache(),
        cache_key.clone(),
        workspace.config().bm25,
    )
    .with_fingerprint(fingerprint);
    let index = retriever.initialize(args.force).await;

    let report = IndexReport {
        documents,
        vocabulary: index.vocabulary_len(),
        avg_doc_length: index.avg_doc_length(),
        vectors: store.len(),
        embedder: embedder_id,
        dimension,
        cache_key,
        corpus_path,
        vector_store_path: store.path().to_path_buf(),
    };

    if args.json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }
    Ok(format!(
        "Indexed {} passages (vocabulary {}, {} vectors) into {}",
        report.documents,
        report.vocabulary,
        report.vectors,
        workspace.data_dir().display()
    ))
}

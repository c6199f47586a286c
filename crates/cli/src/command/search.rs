use super::Workspace;
use crate::SearchArgs;
use anyhow::{ensure, Context as AnyhowContext, Result};
use sage_protocol::{render_rules_context, SearchMode, SearchResponse};
use sage_search::{Bm25Retriever, RetrievalEngine};
use sage_vector_store::{RulesCorpus, SimilaritySource, VectorStore};
use std::sync::Arc;

const PREVIEW_CHARS: usize = 96;

pub(crate) async fn run(workspace: &Workspace, args: &SearchArgs) -> Result<String> {
    let mut config = workspace.config().clone();
    if let Some(weight) = args.vector_weight {
        config.hybrid.vector_weight = weight;
    }
    if let Some(weight) = args.bm25_weight {
        config.hybrid.bm25_weight = weight;
    }
    config.validate().context("Invalid search options")?;

    let k = args.k.unwrap_or(config.hybrid.k);
    ensure!(k >= 1, "--top-k must be at least 1");

    let corpus_path = workspace.corpus_path();
    let corpus = RulesCorpus::load(&corpus_path)
        .await
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;

    let embedder = workspace.embedder();
    let vector_path = workspace.vector_store_path();
    let vectors: Arc<dyn SimilaritySource> =
        match VectorStore::load(&vector_path, Arc::clone(&embedder)).await {
            Ok(store) => Arc::new(store),
            Err(err) => {
                log::warn!(
                    "Vector store {} unavailable, semantic results disabled: {err}",
                    vector_path.display()
                );
                Arc::new(VectorStore::new(&vector_path, embedder))
            }
        };

    let cache_key = workspace.cache_key(&corpus);
    let fingerprint = corpus.fingerprint();
    let bm25 = Arc::new(
        Bm25Retriever::new(Arc::new(corpus), workspace.cache(), cache_key, config.bm25)
            .with_fingerprint(fingerprint),
    );
    let engine = RetrievalEngine::new(config, bm25, vectors);

    let response = match (args.mode, args.min_score) {
        (SearchMode::Vector, Some(min_score)) => SearchResponse::new(
            args.query.as_str(),
            SearchMode::Vector,
            k,
            engine.vector_search(&args.query, k, Some(min_score)).await,
        ),
        (mode, _) => engine.search(&args.query, k, mode).await,
    };

    if args.json {
        return Ok(serde_json::to_string_pretty(&response)?);
    }
    if args.context {
        return Ok(render_rules_context(&response.hits));
    }
    Ok(render_table(&response))
}

fn render_table(response: &SearchResponse) -> String {
    if response.hits.is_empty() {
        return format!("No rules matched '{}'.", response.query);
    }

    let mut lines = Vec::with_capacity(response.hits.len() + 1);
    lines.push(format!(
        "{} results for '{}' ({})",
        response.hits.len(),
        response.query,
        response.mode
    ));
    for hit in &response.hits {
        lines.push(format!(
            "{:>3}. {:.3}  {:<8} {}",
            hit.rank,
            hit.score,
            hit.rule.as_deref().unwrap_or("-"),
            preview(&hit.content)
        ));
    }
    lines.join("\n")
}

fn preview(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= PREVIEW_CHARS {
        return flat;
    }
    let mut cut: String = flat.chars().take(PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}

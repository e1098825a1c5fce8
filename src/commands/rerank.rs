//! One-shot rerank command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::rerank::{Document, RerankPipeline, ScoredDocument};
use crate::server::RerankRequest;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Rerank options
#[derive(Debug, Clone, Default)]
pub struct RerankOptions {
    /// Override config default_max_results
    pub max_results: Option<usize>,
}

/// Rerank result for CLI display
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RerankOutput {
    pub query: String,
    pub documents_scored: usize,
    pub results: Vec<ScoredDocument>,
}

/// Read documents from a JSON file: either an array of documents or an
/// object with a `documents` array.
pub fn read_documents(path: &Path) -> Result<Vec<Document>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum DocumentFile {
        List(Vec<Document>),
        Wrapped { documents: Vec<Document> },
    }

    let content = std::fs::read_to_string(path)?;
    let parsed: DocumentFile = serde_json::from_str(&content)?;
    Ok(match parsed {
        DocumentFile::List(documents) | DocumentFile::Wrapped { documents } => documents,
    })
}

/// Rerank documents against a query with an already-loaded pipeline
pub async fn cmd_rerank(
    config: &Config,
    pipeline: &RerankPipeline,
    query: &str,
    documents: Vec<Document>,
    options: RerankOptions,
) -> Result<RerankOutput> {
    info!("Reranking {} documents from file", documents.len());

    let request = RerankRequest {
        query: query.to_string(),
        documents,
        max_results: options.max_results,
    };
    let max_results = request.validate(&config.rerank)?;

    let results = pipeline
        .rerank(&request.query, &request.documents, max_results)
        .await?;

    Ok(RerankOutput {
        query: request.query,
        documents_scored: request.documents.len(),
        results,
    })
}

/// Load the model and rerank the documents in `file`
pub async fn cmd_rerank_file(
    config: &Config,
    query: &str,
    file: &Path,
    options: RerankOptions,
) -> Result<RerankOutput> {
    if !file.exists() {
        return Err(Error::Validation(format!(
            "Documents file not found: {}",
            file.display()
        )));
    }
    let documents = read_documents(file)?;

    let pipeline = RerankPipeline::load(&config.model, &config.rerank).await?;
    let output = cmd_rerank(config, &pipeline, query, documents, options).await;
    pipeline.shutdown().await;
    output
}

/// Print rerank results to console
pub fn print_rerank_output(output: &RerankOutput) {
    println!("\n🔎 Query: {}\n", output.query);

    if output.results.is_empty() {
        println!("No results.");
        return;
    }

    for doc in &output.results {
        println!("{:>3}. {:<32} {:>10.4}", doc.rank, doc.id, doc.score);
    }
    println!(
        "\nShowing {} of {} documents",
        output.results.len(),
        output.documents_scored
    );
}

//! Cross-encoder reranking
//!
//! The pipeline pairs the query with every document, scores the pairs on the
//! dedicated worker thread, then sorts, ranks and truncates.

#[cfg(feature = "local-model")]
mod fastembed_impl;
mod worker;

#[cfg(feature = "local-model")]
pub use fastembed_impl::*;
pub use worker::{score_in_batches, ScoringWorker};

use crate::config::{ModelConfig, RerankConfig};
use crate::error::{Error, Result};
use crate::models::{check_cross_encoder, resolve_device, Device, DeviceSelector};
use serde::{Deserialize, Serialize};
use std::cmp;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A candidate code snippet submitted for reranking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            metadata: None,
        }
    }
}

/// A document id with its relevance score and 1-based rank
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredDocument {
    pub id: String,
    pub score: f64,
    pub rank: u32,
}

/// One (query, document) input to the cross-encoder
#[derive(Debug, Clone)]
pub struct ScoringPair {
    pub query: Arc<str>,
    pub document: String,
}

impl ScoringPair {
    pub fn new(query: Arc<str>, document: impl Into<String>) -> Self {
        Self {
            query,
            document: document.into(),
        }
    }
}

/// Opaque relevance model.
///
/// Implementations are blocking and run only on the scoring worker thread.
pub trait CrossEncoder: Send {
    /// Score each pair; the result has one entry per pair, in order
    fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>>;

    /// Model identifier
    fn model_name(&self) -> &str;
}

/// Sort scored documents descending, assign ranks, truncate.
///
/// The sort is stable, so tied scores keep their input order.
pub fn rank_documents(
    documents: &[Document],
    scores: &[f32],
    max_results: usize,
) -> Vec<ScoredDocument> {
    let mut scored: Vec<ScoredDocument> = documents
        .iter()
        .zip(scores)
        .map(|(doc, score)| ScoredDocument {
            id: doc.id.clone(),
            score: f64::from(*score),
            rank: 0,
        })
        .collect();

    // Scores reaching here are finite; -0.0 and 0.0 must tie.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(cmp::Ordering::Equal));
    scored.truncate(max_results);

    for (position, doc) in scored.iter_mut().enumerate() {
        doc.rank = u32::try_from(position + 1).unwrap_or(u32::MAX);
    }

    scored
}

/// Process-wide reranking pipeline: owns the scoring worker
pub struct RerankPipeline {
    worker: ScoringWorker,
    model_name: String,
    device: Device,
    batch_size: usize,
    scored_ok: AtomicBool,
    warmup_failed: AtomicBool,
}

impl RerankPipeline {
    /// Start the worker around an already-loaded encoder
    pub fn new(encoder: Box<dyn CrossEncoder>, device: Device, batch_size: usize) -> Result<Self> {
        let model_name = encoder.model_name().to_string();
        let worker = ScoringWorker::spawn(encoder)?;

        Ok(Self {
            worker,
            model_name,
            device,
            batch_size: batch_size.max(1),
            scored_ok: AtomicBool::new(false),
            warmup_failed: AtomicBool::new(false),
        })
    }

    /// Load the configured model (blocking) and start the pipeline
    pub async fn load(model: &ModelConfig, rerank: &RerankConfig) -> Result<Self> {
        check_cross_encoder(&model.name, model.max_length)?;

        let selector: DeviceSelector = model.device.parse()?;
        let device = resolve_device(selector, model.force_cpu);

        info!("Initializing reranker with model: {}", model.name);
        info!("Device: {}", device);
        info!("Model cache directory: {}", model.cache_dir.display());

        let encoder = load_encoder(model).await?;
        info!("Successfully loaded model: {}", model.name);

        Self::new(encoder, device, rerank.batch_size)
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Rerank `documents` against `query`, returning at most `max_results`.
    ///
    /// The query is assumed non-empty; callers validate.
    pub async fn rerank(
        &self,
        query: &str,
        documents: &[Document],
        max_results: usize,
    ) -> Result<Vec<ScoredDocument>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        info!("Reranking {} documents for query: '{}'", documents.len(), query);

        let query: Arc<str> = Arc::from(query);
        let pairs: Vec<ScoringPair> = documents
            .iter()
            .map(|doc| ScoringPair::new(Arc::clone(&query), doc.content.as_str()))
            .collect();

        let scores = match self.worker.score(pairs, self.batch_size).await {
            Ok(scores) => scores,
            Err(e) => {
                error!(
                    "Error during reranking ({} documents, query '{}', {:.2}s): {}",
                    documents.len(),
                    query,
                    start.elapsed().as_secs_f64(),
                    e
                );
                return Err(e);
            }
        };
        self.scored_ok.store(true, Ordering::Release);

        let results = rank_documents(documents, &scores, max_results);

        info!(
            "Reranking complete in {:.2}s. Returning {} results",
            start.elapsed().as_secs_f64(),
            results.len()
        );

        Ok(results)
    }

    /// Score a single pair and return the encoder's raw output; used by the
    /// health probe to inspect the result shape itself
    pub async fn probe(&self, query: &str, document: &str) -> Result<Vec<f32>> {
        let pair = ScoringPair::new(Arc::from(query), document);
        self.worker.predict_raw(vec![pair]).await
    }

    pub(crate) fn mark_warmup_failed(&self) {
        self.warmup_failed.store(true, Ordering::Release);
    }

    /// True when warmup failed and no rerank has succeeded since
    pub fn is_degraded(&self) -> bool {
        self.warmup_failed.load(Ordering::Acquire) && !self.scored_ok.load(Ordering::Acquire)
    }

    /// Stop the scoring worker; queued jobs finish first
    pub async fn shutdown(&self) {
        info!("Cleaning up reranker resources...");
        self.worker.shutdown().await;
    }
}

#[cfg(feature = "local-model")]
async fn load_encoder(model: &ModelConfig) -> Result<Box<dyn CrossEncoder>> {
    let config = model.clone();
    let encoder = tokio::task::spawn_blocking(move || FastEmbedCrossEncoder::new(&config))
        .await
        .map_err(|e| Error::Initialization(format!("Task join error: {}", e)))??;
    Ok(Box::new(encoder))
}

#[cfg(not(feature = "local-model"))]
async fn load_encoder(model: &ModelConfig) -> Result<Box<dyn CrossEncoder>> {
    Err(Error::Initialization(format!(
        "Cannot load '{}': built without the local-model feature",
        model.name
    )))
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{CrossEncoder, ScoringPair};
    use crate::error::{Error, Result};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scores a pair by its document length
    #[derive(Default)]
    pub struct LengthEncoder {
        pub calls: Arc<AtomicUsize>,
        pub max_in_flight: Arc<AtomicUsize>,
        in_flight: Arc<AtomicUsize>,
    }

    impl CrossEncoder for LengthEncoder {
        fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);

            let scores = pairs.iter().map(|p| p.document.len() as f32).collect();

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(scores)
        }

        fn model_name(&self) -> &str {
            "test/length"
        }
    }

    /// Succeeds for `ok_calls` calls, then fails
    pub struct FailingEncoder {
        ok_calls: usize,
        calls: usize,
    }

    impl FailingEncoder {
        pub fn after_calls(ok_calls: usize) -> Self {
            Self { ok_calls, calls: 0 }
        }
    }

    impl CrossEncoder for FailingEncoder {
        fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
            self.calls += 1;
            if self.calls > self.ok_calls {
                return Err(Error::Scoring("inference backend failure".to_string()));
            }
            Ok(vec![1.0; pairs.len()])
        }

        fn model_name(&self) -> &str {
            "test/failing"
        }
    }
}

//! FastEmbed cross-encoder implementation

use super::{CrossEncoder, ScoringPair};
use crate::config::ModelConfig;
use crate::error::{Error, Result};
use crate::models::fastembed_model;
use fastembed::{RerankInitOptions, TextRerank};
use tracing::{debug, info};

/// ONNX cross-encoder loaded through fastembed
pub struct FastEmbedCrossEncoder {
    model: TextRerank,
    model_name: String,
}

impl FastEmbedCrossEncoder {
    /// Load (downloading if needed) the configured model. Blocking.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        info!("Initializing FastEmbed reranker with model: {}", config.name);

        let model_enum = fastembed_model(&config.name).ok_or_else(|| {
            Error::Initialization(format!(
                "Reranker model '{}' has no FastEmbed backend",
                config.name
            ))
        })?;

        let options = RerankInitOptions::new(model_enum)
            .with_cache_dir(config.cache_dir.clone())
            .with_max_length(config.max_length)
            .with_show_download_progress(config.show_download_progress);

        let model = TextRerank::try_new(options).map_err(|e| {
            Error::Initialization(format!("Failed to load model {}: {}", config.name, e))
        })?;

        Ok(Self {
            model,
            model_name: config.name.clone(),
        })
    }
}

impl CrossEncoder for FastEmbedCrossEncoder {
    fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
        let mut scores = Vec::with_capacity(pairs.len());

        // fastembed scores one query against many documents, so score each
        // run of pairs sharing a query in one call.
        let mut start = 0;
        while start < pairs.len() {
            let query = &pairs[start].query;
            let end = pairs[start..]
                .iter()
                .position(|p| p.query != *query)
                .map_or(pairs.len(), |offset| start + offset);

            let run = &pairs[start..end];
            debug!("Scoring {} pairs", run.len());

            let documents: Vec<&str> = run.iter().map(|p| p.document.as_str()).collect();
            let results = self
                .model
                .rerank(&**query, documents, false, Some(run.len()))
                .map_err(|e| Error::Scoring(format!("Rerank failed: {}", e)))?;

            // Results come back sorted by score; place them by input index.
            let mut run_scores = vec![f32::NAN; run.len()];
            for result in results {
                if let Some(slot) = run_scores.get_mut(result.index) {
                    *slot = result.score;
                }
            }
            scores.extend(run_scores);
            start = end;
        }

        Ok(scores)
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

//! Startup warmup: one synthetic rerank to force model weights into memory

use crate::rerank::{Document, RerankPipeline};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

pub const WARMUP_QUERY: &str = "user authentication";

fn sample_documents() -> Vec<Document> {
    vec![
        Document::new(
            "warmup1",
            "def authenticate_user(username, password): return True",
        ),
        Document::new(
            "warmup2",
            "class UserAuth: def login(self, user, pwd): pass",
        ),
    ]
}

/// Run the warmup rerank. Failures are logged and recorded, never returned.
pub async fn warmup(pipeline: &RerankPipeline) {
    info!("Warming up reranker model...");

    match pipeline.rerank(WARMUP_QUERY, &sample_documents(), 2).await {
        Ok(results) => info!("Warmup complete. Processed {} results", results.len()),
        Err(e) => {
            error!("Warmup failed: {}", e);
            pipeline.mark_warmup_failed();
        }
    }
}

/// Start warmup in the background so the server can become ready at once
pub fn spawn_warmup(pipeline: Arc<RerankPipeline>) -> JoinHandle<()> {
    tokio::spawn(async move { warmup(&pipeline).await })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Device;
    use crate::rerank::testing::{FailingEncoder, LengthEncoder};
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn test_warmup_scores_sample_documents() {
        let encoder = LengthEncoder::default();
        let calls = Arc::clone(&encoder.calls);
        let pipeline = Arc::new(RerankPipeline::new(Box::new(encoder), Device::Cpu, 32).unwrap());

        spawn_warmup(Arc::clone(&pipeline)).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!pipeline.is_degraded());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_warmup_failure_is_not_fatal() {
        let pipeline =
            RerankPipeline::new(Box::new(FailingEncoder::after_calls(0)), Device::Cpu, 32).unwrap();

        warmup(&pipeline).await;

        assert!(pipeline.is_degraded());
        pipeline.shutdown().await;
    }
}

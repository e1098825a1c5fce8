//! Health reporting
//!
//! Status mapping:
//! - pipeline never initialized: `unhealthy`
//! - probe returned one finite score: `healthy`, or `degraded` while a failed
//!   warmup has not been followed by a successful rerank
//! - probe returned the wrong shape or a non-finite score: `degraded`
//! - probe failed or timed out: `unhealthy`

use crate::rerank::RerankPipeline;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health report returned by `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub model: String,
    pub device: String,
    pub uptime: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Checks the pipeline and reports process status
pub struct HealthReporter {
    pipeline: Option<Arc<RerankPipeline>>,
    init_error: Option<String>,
    started_at: Instant,
    timeout: Duration,
}

impl HealthReporter {
    /// `started_at` marks process start, so uptime covers model loading
    pub fn new(
        pipeline: Option<Arc<RerankPipeline>>,
        init_error: Option<String>,
        started_at: Instant,
        timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            init_error,
            started_at,
            timeout,
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub async fn report(&self) -> HealthReport {
        let uptime = format_uptime(self.uptime());
        let timestamp = Utc::now().to_rfc3339();

        let Some(pipeline) = &self.pipeline else {
            return HealthReport {
                status: HealthStatus::Unhealthy,
                model: "not loaded".to_string(),
                device: "unknown".to_string(),
                uptime,
                timestamp,
                model_valid: None,
                error: Some(
                    self.init_error
                        .clone()
                        .unwrap_or_else(|| "Reranker not initialized".to_string()),
                ),
            };
        };

        let (status, model_valid, error) =
            match tokio::time::timeout(self.timeout, pipeline.probe("test", "test")).await {
                Ok(Ok(scores)) if scores.len() == 1 && scores[0].is_finite() => {
                    if pipeline.is_degraded() {
                        (HealthStatus::Degraded, true, None)
                    } else {
                        (HealthStatus::Healthy, true, None)
                    }
                }
                Ok(Ok(scores)) => {
                    warn!("Model validation returned unexpected output: {:?}", scores);
                    (HealthStatus::Degraded, false, None)
                }
                Ok(Err(e)) => {
                    error!("Health check failed: {}", e);
                    (HealthStatus::Unhealthy, false, Some(e.to_string()))
                }
                Err(_) => {
                    error!("Health check timed out after {:?}", self.timeout);
                    (
                        HealthStatus::Unhealthy,
                        false,
                        Some(format!(
                            "Model validation timed out after {}s",
                            self.timeout.as_secs()
                        )),
                    )
                }
            };

        debug!("Health status: {:?}", status);

        HealthReport {
            status,
            model: pipeline.model_name().to_string(),
            device: pipeline.device().to_string(),
            uptime,
            timestamp,
            model_valid: Some(model_valid),
            error,
        }
    }
}

/// Format a duration as `"{h}h {m}m {s}s"`
pub fn format_uptime(uptime: Duration) -> String {
    let secs = uptime.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::models::Device;
    use crate::rerank::testing::{FailingEncoder, LengthEncoder};
    use crate::rerank::{CrossEncoder, ScoringPair};

    fn reporter(encoder: Box<dyn CrossEncoder>) -> (HealthReporter, Arc<RerankPipeline>) {
        let pipeline = Arc::new(RerankPipeline::new(encoder, Device::Cpu, 32).unwrap());
        let reporter =
            HealthReporter::new(
            Some(Arc::clone(&pipeline)),
            None,
            Instant::now(),
            Duration::from_secs(5),
        );
        (reporter, pipeline)
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(0)), "0h 0m 0s");
        assert_eq!(format_uptime(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn test_uptime_counts_from_given_start() {
        let started_at = Instant::now() - Duration::from_secs(90);
        let reporter = HealthReporter::new(None, None, started_at, Duration::from_secs(5));
        assert!(reporter.uptime() >= Duration::from_secs(90));
    }

    #[tokio::test]
    async fn test_not_initialized_is_unhealthy() {
        let reporter = HealthReporter::new(
            None,
            Some("Failed to load model".to_string()),
            Instant::now(),
            Duration::from_secs(5),
        );
        let report = reporter.report().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.model_valid.is_none());
        assert_eq!(report.error.as_deref(), Some("Failed to load model"));

        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("model_valid").is_none());
        assert_eq!(json["status"], "unhealthy");
    }

    #[tokio::test]
    async fn test_working_model_is_healthy() {
        let (reporter, pipeline) = reporter(Box::new(LengthEncoder::default()));
        let report = reporter.report().await;

        assert_eq!(report.status, HealthStatus::Healthy);
        assert_eq!(report.model_valid, Some(true));
        assert_eq!(report.model, "test/length");
        assert_eq!(report.device, "cpu");
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_warmup_is_degraded() {
        let (reporter, pipeline) = reporter(Box::new(LengthEncoder::default()));
        pipeline.mark_warmup_failed();

        assert_eq!(reporter.report().await.status, HealthStatus::Degraded);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_wrong_shape_is_degraded() {
        struct PaddedEncoder;
        impl CrossEncoder for PaddedEncoder {
            fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
                Ok(vec![0.5; pairs.len() + 1])
            }
            fn model_name(&self) -> &str {
                "test/padded"
            }
        }

        let (reporter, pipeline) = reporter(Box::new(PaddedEncoder));
        let report = reporter.report().await;

        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(report.model_valid, Some(false));
        assert!(report.error.is_none());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_non_finite_score_is_degraded() {
        struct NanEncoder;
        impl CrossEncoder for NanEncoder {
            fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
                Ok(vec![f32::NAN; pairs.len()])
            }
            fn model_name(&self) -> &str {
                "test/nan"
            }
        }

        let (reporter, pipeline) = reporter(Box::new(NanEncoder));
        assert_eq!(reporter.report().await.status, HealthStatus::Degraded);
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_model_is_unhealthy() {
        let (reporter, pipeline) = reporter(Box::new(FailingEncoder::after_calls(0)));
        let report = reporter.report().await;

        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert_eq!(report.model_valid, Some(false));
        assert!(report.error.is_some());
        pipeline.shutdown().await;
    }

    #[tokio::test]
    async fn test_slow_model_times_out() {
        struct SlowEncoder;
        impl CrossEncoder for SlowEncoder {
            fn predict(&mut self, pairs: &[ScoringPair]) -> Result<Vec<f32>> {
                std::thread::sleep(Duration::from_millis(300));
                Ok(vec![0.0; pairs.len()])
            }
            fn model_name(&self) -> &str {
                "test/slow"
            }
        }

        let pipeline = Arc::new(RerankPipeline::new(Box::new(SlowEncoder), Device::Cpu, 1).unwrap());
        let reporter =
            HealthReporter::new(
            Some(Arc::clone(&pipeline)),
            None,
            Instant::now(),
            Duration::from_millis(50),
        );

        let report = reporter.report().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(report.error.unwrap().contains("timed out"));

        pipeline.shutdown().await;
    }
}

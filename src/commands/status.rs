//! Status command implementation

use crate::config::Config;
use crate::health::{HealthReport, HealthReporter, HealthStatus};
use crate::rerank::RerankPipeline;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Load the model and produce one health report
pub async fn cmd_status(config: &Config) -> HealthReport {
    let started_at = Instant::now();
    info!("Getting status");

    let (pipeline, init_error) = match RerankPipeline::load(&config.model, &config.rerank).await {
        Ok(pipeline) => (Some(Arc::new(pipeline)), None),
        Err(e) => {
            error!("Failed to initialize reranker: {}", e);
            (None, Some(e.to_string()))
        }
    };

    let reporter = HealthReporter::new(
        pipeline.clone(),
        init_error,
        started_at,
        config.server.health_check_timeout(),
    );
    let report = reporter.report().await;

    if let Some(pipeline) = pipeline {
        pipeline.shutdown().await;
    }

    report
}

/// Print a health report to console
pub fn print_status(report: &HealthReport) {
    let marker = match report.status {
        HealthStatus::Healthy => "✓ healthy",
        HealthStatus::Degraded => "⚠ degraded",
        HealthStatus::Unhealthy => "✗ unhealthy",
    };

    println!("\n📊 code-reranker Status\n");
    println!("Status: {}", marker);
    println!("Model: {}", report.model);
    println!("Device: {}", report.device);
    if let Some(valid) = report.model_valid {
        println!("Model valid: {}", valid);
    }
    if let Some(error) = &report.error {
        println!("Error: {}", error);
    }
    println!("Checked at: {}", report.timestamp);
}

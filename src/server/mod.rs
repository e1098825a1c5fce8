//! HTTP API
//!
//! - `POST /rerank` reranks documents against a query
//! - `GET /health` reports model status
//! - `GET /` describes the service

mod types;

pub use types::*;

use crate::config::{Config, RerankConfig};
use crate::error::{Error, Result};
use crate::health::{HealthReport, HealthReporter};
use crate::rerank::{RerankPipeline, ScoredDocument};
use crate::warmup::spawn_warmup;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pipeline: Option<Arc<RerankPipeline>>,
    health: Arc<HealthReporter>,
    limits: Arc<RerankConfig>,
    request_timeout: Duration,
}

impl AppState {
    pub fn new(
        pipeline: Option<Arc<RerankPipeline>>,
        health: HealthReporter,
        limits: RerankConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            pipeline,
            health: Arc::new(health),
            limits: Arc::new(limits),
            request_timeout,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Initialization(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let detail = match &self {
            Error::Validation(msg) => msg.clone(),
            Error::Initialization(_) => "Reranker service is not available".to_string(),
            other => format!("Internal server error: {}", other),
        };

        (status, Json(ErrorBody { detail })).into_response()
    }
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .route("/rerank", post(rerank))
        .with_state(state)
}

async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo::default())
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.health.report().await)
}

async fn rerank(
    State(state): State<AppState>,
    Json(request): Json<RerankRequest>,
) -> Result<Json<Vec<ScoredDocument>>> {
    let span = info_span!("rerank", request_id = %Uuid::new_v4());

    async move {
        let Some(pipeline) = state.pipeline.as_ref() else {
            warn!("Rerank requested but the model is not loaded");
            return Err(Error::Initialization("Reranker not initialized".to_string()));
        };

        let max_results = request.validate(&state.limits).inspect_err(|e| {
            warn!("Invalid request: {}", e);
        })?;

        let outcome = tokio::time::timeout(
            state.request_timeout,
            pipeline.rerank(&request.query, &request.documents, max_results),
        )
        .await;

        match outcome {
            Ok(Ok(results)) => Ok(Json(results)),
            Ok(Err(e)) => {
                error!(
                    "Reranking error for query '{}' ({} documents): {}",
                    request.query,
                    request.documents.len(),
                    e
                );
                Err(e)
            }
            Err(_) => {
                error!(
                    "Rerank timed out after {:?} for query '{}' ({} documents)",
                    state.request_timeout,
                    request.query,
                    request.documents.len()
                );
                Err(Error::Timeout(state.request_timeout.as_secs()))
            }
        }
    }
    .instrument(span)
    .await
}

/// Serve `state` on `listener` until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolve on Ctrl-C or SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Load the model, start warmup, serve until a shutdown signal, then stop
/// the scoring worker.
pub async fn run(config: Config) -> Result<()> {
    let started_at = Instant::now();
    info!("Code Reranker API starting up...");

    let (pipeline, init_error) = match RerankPipeline::load(&config.model, &config.rerank).await {
        Ok(pipeline) => {
            info!("Reranker initialized successfully");
            (Some(Arc::new(pipeline)), None)
        }
        Err(e) => {
            error!("Failed to initialize reranker: {}", e);
            (None, Some(e.to_string()))
        }
    };

    match &pipeline {
        Some(p) => {
            info!("Model: {}", p.model_name());
            info!("Device: {}", p.device());
        }
        None => info!("Model: Not loaded"),
    }

    if config.rerank.warmup_on_start {
        if let Some(p) = &pipeline {
            spawn_warmup(Arc::clone(p));
        }
    }

    let health = HealthReporter::new(
        pipeline.clone(),
        init_error,
        started_at,
        config.server.health_check_timeout(),
    );
    let state = AppState::new(
        pipeline.clone(),
        health,
        config.rerank.clone(),
        config.server.request_timeout(),
    );

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    serve(listener, state, shutdown_signal()).await?;

    info!("Code Reranker API shutting down...");
    if let Some(p) = pipeline {
        p.shutdown().await;
    }

    Ok(())
}

//! HTTP server exposing job processing.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use mathscrap::pipeline::{MathPipeline, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub pipeline: PipelineConfig,
    pub host: String,
    pub port: u16,
}

/// Application state shared across handlers
struct AppState {
    pipeline: MathPipeline,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Body of `POST /api/v1/process`
#[derive(Debug, Deserialize)]
struct ProcessRequest {
    paths: Vec<PathBuf>,
    #[serde(default)]
    context: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Run the HTTP server
pub async fn run_server(
    config: ServerConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let pipeline = MathPipeline::builder().config(config.pipeline).build()?;
    let state = Arc::new(AppState { pipeline });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/v1/process", post(process_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    info!("Server listening on http://{}", addr);
    info!("Endpoints:");
    info!("  GET  /health          - Health check");
    info!("  POST /api/v1/process  - Recognize and validate images");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn process_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ProcessRequest>,
) -> Response {
    let job_id = request
        .job_id
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    if request.paths.is_empty() {
        warn!(job_id = %job_id, "Rejected job without images");
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "paths must contain at least one image".to_string(),
            }),
        )
            .into_response();
    }

    info!(job_id = %job_id, images = request.paths.len(), "Processing job request");
    let start = Instant::now();
    let report = state
        .pipeline
        .process_job(job_id, &request.paths, request.context.as_deref())
        .await;
    info!(
        job_id = %report.job_id,
        total_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Job request completed"
    );

    (StatusCode::OK, Json(report)).into_response()
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
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
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        }
    }
}

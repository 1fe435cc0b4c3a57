//! Readmission Risk API Server
//!
//! HTTP service exposing readmission risk prediction and per-patient
//! explanations over the loaded model artifacts.

use axum::{extract::State, routing::get, routing::post, Json, Router};
use explainer::{Explainer, KernelShap};
use inference_engine::{load_threshold, InferenceEngine, InferenceError, ModelArtifacts};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
mod error;
mod routes;

pub use config::{ExplainerSettings, LoggingSettings, ModelSettings, ServerSettings, Settings};
pub use error::ApiError;

/// Application state shared across handlers.
///
/// Everything here is read-only after startup, so handlers share it
/// through an `Arc` without locking.
pub struct AppState {
    pub engine: InferenceEngine,
    pub explainer: Explainer,
    /// Version string
    pub version: String,
    /// Prometheus render handle, when a recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Build state from an engine and explainer settings
    pub fn new(engine: InferenceEngine, settings: &ExplainerSettings) -> Self {
        let attributor = Arc::new(KernelShap::new(settings.budget(), settings.seed));
        let explainer = Explainer::for_engine(&engine, attributor);
        Self {
            engine,
            explainer,
            version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: None,
        }
    }

    /// Load the model bundle and threshold named in the settings
    pub fn load(settings: &Settings) -> Result<Self, InferenceError> {
        let artifacts = ModelArtifacts::load(&settings.model.bundle_path)?;
        let threshold = load_threshold(&settings.model.threshold_path)?;
        let engine = InferenceEngine::from_artifacts(&artifacts, threshold);
        Ok(Self::new(engine, &settings.explainer))
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/predict", post(routes::predict::predict))
        .route("/explain", post(routes::explain::explain))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Health check handler
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

/// Prometheus exposition
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Result<String, ApiError> {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .ok_or_else(|| ApiError::NotFound("metrics recorder is not installed".to_string()))
}

/// Initialize logging.
///
/// `RUST_LOG` overrides the configured level when set.
pub fn init_logging(
    settings: &LoggingSettings,
) -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
}

/// Install the global Prometheus recorder
pub fn install_metrics() -> Option<PrometheusHandle> {
    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!("Metrics recorder not installed: {}", e);
            None
        }
    }
}

/// Run the server
pub async fn run_server(state: AppState, addr: &str) -> anyhow::Result<()> {
    let app = create_router(Arc::new(state));

    info!("Starting API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

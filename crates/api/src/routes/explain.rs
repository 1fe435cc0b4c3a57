//! Explanation Route

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use explainer::ExplanationResult;
use feature_engine::RawPatientRecord;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

use super::record_failure;
use crate::error::ApiError;
use crate::AppState;

/// Score one patient record and attribute the score to its features
pub async fn explain(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawPatientRecord>, JsonRejection>,
) -> Result<Json<ExplanationResult>, ApiError> {
    let result = run(state, payload).await;
    if let Err(err) = &result {
        record_failure("explain", err);
    }
    result.map(Json)
}

async fn run(
    state: Arc<AppState>,
    payload: Result<Json<RawPatientRecord>, JsonRejection>,
) -> Result<ExplanationResult, ApiError> {
    let Json(record) = payload?;
    let start = Instant::now();

    let explanation =
        tokio::task::spawn_blocking(move || state.explainer.explain(&record)).await??;

    let elapsed = start.elapsed();
    metrics::counter!("readmission_explanations_total").increment(1);
    metrics::histogram!("readmission_explain_duration_seconds").record(elapsed.as_secs_f64());
    info!(
        "Explanation served in {}ms: {} ({} contributions)",
        elapsed.as_millis(),
        explanation.risk_label,
        explanation.all_contributions_count
    );
    Ok(explanation)
}

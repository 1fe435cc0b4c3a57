//! Prediction Route

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use feature_engine::RawPatientRecord;
use inference_engine::Prediction;
use std::sync::Arc;

use super::record_failure;
use crate::error::ApiError;
use crate::AppState;

/// Score one patient record
pub async fn predict(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RawPatientRecord>, JsonRejection>,
) -> Result<Json<Prediction>, ApiError> {
    let result = run(state, payload).await;
    if let Err(err) = &result {
        record_failure("predict", err);
    }
    result.map(Json)
}

async fn run(
    state: Arc<AppState>,
    payload: Result<Json<RawPatientRecord>, JsonRejection>,
) -> Result<Prediction, ApiError> {
    let Json(record) = payload?;
    let prediction =
        tokio::task::spawn_blocking(move || state.engine.predict(&record)).await??;
    metrics::counter!("readmission_predictions_total").increment(1);
    Ok(prediction)
}

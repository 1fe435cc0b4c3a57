//! Request handlers

pub mod explain;
pub mod predict;

use crate::error::ApiError;
use tracing::warn;

/// Log and count a failed request
pub(crate) fn record_failure(endpoint: &'static str, err: &ApiError) {
    warn!("{} request failed ({}): {}", endpoint, err.status(), err);
    metrics::counter!("readmission_request_errors_total", "endpoint" => endpoint).increment(1);
}

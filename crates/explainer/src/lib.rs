//! Prediction Explanations
//!
//! Attributes a single readmission risk prediction to the model-facing
//! features using Kernel SHAP over a background synthesized around the
//! patient, then ranks and phrases the contributions.

mod explain;
mod kernel;
mod ranking;

pub use explain::{ExplanationResult, Explainer};
pub use kernel::{Attribution, Attributor, KernelExplainer, KernelShap, SampleBudget, ScoreFn};
pub use ranking::{
    pretty_name, rank, render_reasons, resolve_feature_names, Contribution, RankedContributions,
    TOP_CONTRIBUTIONS, TOP_K,
};

use inference_engine::InferenceError;
use thiserror::Error;

/// Errors while building an explanation
#[derive(Debug, Error)]
pub enum ExplainError {
    #[error(transparent)]
    Inference(#[from] InferenceError),
    #[error("Background is empty; attribution needs at least one reference row")]
    EmptyBackground,
    #[error("Shape mismatch: expected {expected} features, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },
    #[error("Attribution system could not be solved: {0}")]
    Solve(String),
}

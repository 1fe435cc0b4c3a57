//! Readmission Inference Engine
//!
//! Loads the trained artifacts (training schema, specialty allow-list,
//! preprocessor, classifier, decision threshold) and scores engineered rows.

mod artifacts;
mod classifier;
mod engine;
mod preprocessor;
mod scorer;

pub use artifacts::{load_threshold, ModelArtifacts, ModelBundle, ModelSpec};
pub use classifier::{Classifier, LogisticClassifier, OnnxClassifier};
pub use engine::{InferenceEngine, Prediction, RiskClass};
pub use preprocessor::{
    ColumnTransformer, HandleUnknown, OneHotEncoder, Passthrough, Preprocessor, StandardScaler,
    Transformer,
};
pub use scorer::Scorer;

use feature_engine::FeatureError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors during artifact loading and inference
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Model load failed: {0}")]
    ModelLoadError(String),
    #[error("Inference failed: {0}")]
    InferenceFailed(String),
    #[error("Invalid input shape: expected {expected}, got {actual}")]
    InvalidInputShape { expected: String, actual: String },
    #[error("Column '{0}' is missing from the input row")]
    MissingColumn(String),
    #[error("Column '{column}': could not convert {value} to float")]
    NonNumeric { column: String, value: String },
    #[error("Found unknown category '{value}' in column '{column}' during transform")]
    UnknownCategory { column: String, value: String },
    #[error("Invalid preprocessor: {0}")]
    InvalidPreprocessor(String),
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
    #[error("Invalid training schema: {0}")]
    Schema(#[from] FeatureError),
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

//! Scorer: preprocessor followed by classifier

use crate::classifier::Classifier;
use crate::preprocessor::Preprocessor;
use crate::InferenceError;
use feature_engine::EngineeredRow;
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Turns aligned engineered rows into positive-class probabilities.
///
/// Stateless; cheap to clone and safe to share between requests.
#[derive(Clone)]
pub struct Scorer {
    preprocessor: Arc<dyn Preprocessor>,
    classifier: Arc<dyn Classifier>,
}

impl Scorer {
    pub fn new(preprocessor: Arc<dyn Preprocessor>, classifier: Arc<dyn Classifier>) -> Self {
        Self {
            preprocessor,
            classifier,
        }
    }

    /// Map rows into the model-facing feature space
    pub fn transform(&self, rows: &[EngineeredRow]) -> Result<Array2<f64>, InferenceError> {
        self.preprocessor.transform(rows)
    }

    /// Score an already-transformed matrix
    pub fn predict_matrix(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> {
        let probs = self.classifier.predict_proba(x)?;
        if probs.len() != x.nrows() {
            return Err(InferenceError::InvalidInputShape {
                expected: format!("{} probabilities", x.nrows()),
                actual: format!("{} probabilities", probs.len()),
            });
        }
        Ok(probs)
    }

    /// Score a batch of aligned rows
    pub fn score_batch(&self, rows: &[EngineeredRow]) -> Result<Vec<f64>, InferenceError> {
        let x = self.transform(rows)?;
        self.predict_matrix(x.view())
    }

    /// Score one aligned row
    pub fn score(&self, row: &EngineeredRow) -> Result<f64, InferenceError> {
        let probs = self.score_batch(std::slice::from_ref(row))?;
        probs
            .first()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("classifier returned no output".into()))
    }

    /// Model-facing feature names, if the preprocessor publishes them
    pub fn feature_names(&self) -> Option<Vec<String>> {
        self.preprocessor.feature_names_out()
    }

    pub fn n_features(&self) -> usize {
        self.preprocessor.n_features_out()
    }
}

impl std::fmt::Debug for Scorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scorer")
            .field("n_features", &self.n_features())
            .finish()
    }
}

//! Binary Classifiers

use crate::InferenceError;
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tract_onnx::prelude::*;

/// Produces positive-class probabilities for model-facing feature rows
pub trait Classifier: Send + Sync {
    /// Expected input width, when the classifier knows it
    fn n_features(&self) -> Option<usize>;

    /// Positive-class probability for each row of `x`
    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError>;
}

fn check_width(expected: usize, x: &ArrayView2<'_, f64>) -> Result<(), InferenceError> {
    if x.ncols() != expected {
        return Err(InferenceError::InvalidInputShape {
            expected: format!("[n, {}]", expected),
            actual: format!("{:?}", x.shape()),
        });
    }
    Ok(())
}

/// Logistic regression over the model-facing features
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LogisticClassifier {
    pub fn new(coefficients: Vec<f64>, intercept: f64) -> Self {
        Self {
            coefficients,
            intercept,
        }
    }
}

impl Classifier for LogisticClassifier {
    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> {
        check_width(self.coefficients.len(), &x)?;
        let weights = ArrayView1::from(&self.coefficients[..]);
        let logits = x.dot(&weights);
        Ok(logits
            .iter()
            .map(|z| 1.0 / (1.0 + (-(z + self.intercept)).exp()))
            .collect())
    }
}

type OnnxRunner = Box<dyn Fn(Tensor) -> TractResult<TVec<TValue>> + Send + Sync>;

/// ONNX classifier executed with tract.
///
/// The graph is compiled for a single `[1, n_features]` f32 input, so rows
/// are scored one at a time.
pub struct OnnxClassifier {
    path: PathBuf,
    n_features: usize,
    /// Index of the output holding class probabilities
    probability_output: usize,
    /// Column of the probability output for the positive class
    positive_class: usize,
    runner: OnnxRunner,
}

impl OnnxClassifier {
    /// Load and optimize an ONNX model
    pub fn load(
        path: &Path,
        n_features: usize,
        probability_output: usize,
        positive_class: usize,
    ) -> Result<Self, InferenceError> {
        info!("Loading ONNX classifier from {}", path.display());

        let plan = tract_onnx::onnx()
            .model_for_path(path)
            .and_then(|model| model.with_input_fact(0, f32::fact([1, n_features]).into()))
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                InferenceError::ModelLoadError(format!("{}: {}", path.display(), e))
            })?;

        let runner: OnnxRunner = Box::new(move |input: Tensor| plan.run(tvec!(input.into())));

        Ok(Self {
            path: path.to_path_buf(),
            n_features,
            probability_output,
            positive_class,
            runner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn predict_row(&self, row: ArrayView1<'_, f64>) -> Result<f64, InferenceError> {
        let data: Vec<f32> = row.iter().map(|&v| v as f32).collect();
        let input = Tensor::from_shape(&[1, self.n_features], &data)
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        let outputs =
            (self.runner)(input).map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let output = outputs.get(self.probability_output).ok_or_else(|| {
            InferenceError::InferenceFailed(format!(
                "model has {} outputs, probability output {} requested",
                outputs.len(),
                self.probability_output
            ))
        })?;

        let probs = output
            .cast_to::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;
        let probs = probs
            .as_slice::<f32>()
            .map_err(|e| InferenceError::InferenceFailed(e.to_string()))?;

        // Single-column outputs already hold the positive-class probability
        let value = match probs.len() {
            1 => probs[0],
            _ => *probs.get(self.positive_class).ok_or_else(|| {
                InferenceError::InferenceFailed(format!(
                    "probability output has {} columns, class {} requested",
                    probs.len(),
                    self.positive_class
                ))
            })?,
        };
        Ok(value as f64)
    }
}

impl Classifier for OnnxClassifier {
    fn n_features(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn predict_proba(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> {
        check_width(self.n_features, &x)?;
        debug!("Running ONNX classifier on {} rows", x.nrows());
        x.rows().into_iter().map(|row| self.predict_row(row)).collect()
    }
}

impl std::fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("path", &self.path)
            .field("n_features", &self.n_features)
            .field("probability_output", &self.probability_output)
            .field("positive_class", &self.positive_class)
            .finish()
    }
}

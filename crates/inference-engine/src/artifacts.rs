//! Model artifact loading
//!
//! The bundle holds everything fitted at training time: the ordered training
//! columns, the specialty allow-list, the preprocessor and the classifier.
//! The decision threshold lives in its own file.

use crate::classifier::{Classifier, LogisticClassifier, OnnxClassifier};
use crate::preprocessor::{ColumnTransformer, Preprocessor};
use crate::scorer::Scorer;
use crate::InferenceError;
use feature_engine::{FeatureDeriver, TrainingColumns};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

fn default_output_index() -> usize {
    1
}

/// Classifier section of the bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelSpec {
    Logistic(LogisticClassifier),
    Onnx {
        /// Relative paths resolve against the bundle's directory
        path: PathBuf,
        #[serde(default = "default_output_index")]
        probability_output: usize,
        #[serde(default = "default_output_index")]
        positive_class: usize,
    },
}

/// On-disk model bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub columns: TrainingColumns,
    pub top_specialties: Vec<String>,
    pub preprocessor: ColumnTransformer,
    pub model: ModelSpec,
}

impl ModelBundle {
    pub fn from_path(path: &Path) -> Result<Self, InferenceError> {
        let text = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| InferenceError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Loaded, validated, read-only model artifacts
#[derive(Clone)]
pub struct ModelArtifacts {
    columns: TrainingColumns,
    top_specialties: Vec<String>,
    preprocessor: Arc<dyn Preprocessor>,
    classifier: Arc<dyn Classifier>,
}

impl ModelArtifacts {
    /// Load a bundle file
    pub fn load(path: &Path) -> Result<Self, InferenceError> {
        info!("Loading model bundle from {}", path.display());
        let bundle = ModelBundle::from_path(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_bundle(bundle, base_dir)
    }

    /// Validate a parsed bundle and instantiate its classifier
    pub fn from_bundle(bundle: ModelBundle, base_dir: &Path) -> Result<Self, InferenceError> {
        bundle.columns.validate()?;
        bundle.preprocessor.validate(bundle.columns.names())?;

        let n_features = bundle.preprocessor.n_features_out();
        let classifier: Arc<dyn Classifier> = match bundle.model {
            ModelSpec::Logistic(model) => Arc::new(model),
            ModelSpec::Onnx {
                path,
                probability_output,
                positive_class,
            } => {
                let path = if path.is_relative() {
                    base_dir.join(path)
                } else {
                    path
                };
                Arc::new(OnnxClassifier::load(
                    &path,
                    n_features,
                    probability_output,
                    positive_class,
                )?)
            }
        };

        if let Some(expected) = classifier.n_features() {
            if expected != n_features {
                return Err(InferenceError::InvalidInputShape {
                    expected: format!("{} classifier inputs", expected),
                    actual: format!("{} preprocessor outputs", n_features),
                });
            }
        }

        info!(
            "Model artifacts ready: {} training columns, {} model features, {} top specialties",
            bundle.columns.len(),
            n_features,
            bundle.top_specialties.len()
        );

        Ok(Self {
            columns: bundle.columns,
            top_specialties: bundle.top_specialties,
            preprocessor: Arc::new(bundle.preprocessor),
            classifier,
        })
    }

    pub fn columns(&self) -> &TrainingColumns {
        &self.columns
    }

    pub fn top_specialties(&self) -> &[String] {
        &self.top_specialties
    }

    /// Feature deriver bound to this bundle's schema
    pub fn deriver(&self) -> FeatureDeriver {
        FeatureDeriver::new(self.columns.clone(), self.top_specialties.iter().cloned())
    }

    pub fn scorer(&self) -> Scorer {
        Scorer::new(self.preprocessor.clone(), self.classifier.clone())
    }
}

impl std::fmt::Debug for ModelArtifacts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelArtifacts")
            .field("columns", &self.columns.len())
            .field("top_specialties", &self.top_specialties)
            .field("n_features", &self.preprocessor.n_features_out())
            .finish()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ThresholdFile {
    Bare(f64),
    Wrapped { threshold: f64 },
}

/// Load the decision threshold: a bare number or `{"threshold": x}`
pub fn load_threshold(path: &Path) -> Result<f64, InferenceError> {
    let text = std::fs::read_to_string(path).map_err(|source| InferenceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: ThresholdFile =
        serde_json::from_str(text.trim()).map_err(|source| InferenceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    let threshold = match parsed {
        ThresholdFile::Bare(t) | ThresholdFile::Wrapped { threshold: t } => t,
    };
    if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
        return Err(InferenceError::InvalidThreshold(format!(
            "{} is outside [0, 1]",
            threshold
        )));
    }
    info!("Decision threshold {} loaded from {}", threshold, path.display());
    Ok(threshold)
}

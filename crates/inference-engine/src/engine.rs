//! Inference Engine Implementation

use crate::artifacts::ModelArtifacts;
use crate::scorer::Scorer;
use crate::InferenceError;
use feature_engine::{FeatureDeriver, RawPatientRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Thresholded risk class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskClass {
    Low,
    High,
}

impl RiskClass {
    /// Probabilities at or above the threshold are high risk
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            RiskClass::High
        } else {
            RiskClass::Low
        }
    }

    /// Class index reported to clients
    pub fn as_class(&self) -> u8 {
        match self {
            RiskClass::Low => 0,
            RiskClass::High => 1,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RiskClass::Low => "Low risk",
            RiskClass::High => "High risk",
        }
    }
}

/// Prediction result for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// 1 when the probability meets the threshold
    pub predicted_class: u8,
    pub readmission_probability: f64,
}

/// Derives features and scores a single patient record
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    deriver: FeatureDeriver,
    scorer: Scorer,
    threshold: f64,
}

impl InferenceEngine {
    pub fn new(deriver: FeatureDeriver, scorer: Scorer, threshold: f64) -> Self {
        Self {
            deriver,
            scorer,
            threshold,
        }
    }

    /// Build an engine from loaded artifacts
    pub fn from_artifacts(artifacts: &ModelArtifacts, threshold: f64) -> Self {
        Self::new(artifacts.deriver(), artifacts.scorer(), threshold)
    }

    /// Run inference on a raw patient record
    pub fn predict(&self, raw: &RawPatientRecord) -> Result<Prediction, InferenceError> {
        let start = std::time::Instant::now();

        let row = self.deriver.derive(raw);
        let probability = self.scorer.score(&row)?;
        let class = RiskClass::from_probability(probability, self.threshold);

        debug!(
            "Prediction: p={:.4} class={} in {}us",
            probability,
            class.as_class(),
            start.elapsed().as_micros()
        );

        Ok(Prediction {
            predicted_class: class.as_class(),
            readmission_probability: probability,
        })
    }

    pub fn deriver(&self) -> &FeatureDeriver {
        &self.deriver
    }

    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

//! Per-request explanation pipeline

use crate::kernel::Attributor;
use crate::ranking::{rank, render_reasons, resolve_feature_names, Contribution};
use crate::ExplainError;
use feature_engine::{BackgroundSynthesizer, FeatureDeriver, RawPatientRecord};
use inference_engine::{InferenceEngine, RiskClass, Scorer};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Explained prediction for one patient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationResult {
    pub predicted_class: u8,
    pub risk_label: String,
    pub readmission_probability: f64,
    pub threshold: f64,
    /// Expected model output over the background; 0 when the attributor has none
    pub base_value: f64,
    pub top_contributions: Vec<Contribution>,
    pub top_positive_contributions: Vec<Contribution>,
    pub top_negative_contributions: Vec<Contribution>,
    pub reasons: Vec<String>,
    pub explanation_summary: String,
    pub all_contributions_count: usize,
}

/// Builds explanations from read-only artifacts.
///
/// Holds no per-request state; the attribution model is rebuilt over each
/// patient's own background.
#[derive(Clone)]
pub struct Explainer {
    deriver: FeatureDeriver,
    synthesizer: BackgroundSynthesizer,
    scorer: Scorer,
    attributor: Arc<dyn Attributor>,
    threshold: f64,
}

impl Explainer {
    pub fn new(
        deriver: FeatureDeriver,
        scorer: Scorer,
        attributor: Arc<dyn Attributor>,
        threshold: f64,
    ) -> Self {
        Self {
            synthesizer: BackgroundSynthesizer::new(deriver.clone()),
            deriver,
            scorer,
            attributor,
            threshold,
        }
    }

    /// Share the deriver, scorer and threshold of a prediction engine
    pub fn for_engine(engine: &InferenceEngine, attributor: Arc<dyn Attributor>) -> Self {
        Self::new(
            engine.deriver().clone(),
            engine.scorer().clone(),
            attributor,
            engine.threshold(),
        )
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Explain the risk prediction for one raw record
    pub fn explain(&self, raw: &RawPatientRecord) -> Result<ExplanationResult, ExplainError> {
        let engineered = self.deriver.engineer(raw);
        let row = self.deriver.columns().align(&engineered);

        let background_rows = self.synthesizer.synthesize(&engineered);
        let background = self.scorer.transform(&background_rows)?;
        let input = self.scorer.transform(std::slice::from_ref(&row))?;
        let x = input.row(0);

        if background.ncols() != x.len() {
            return Err(ExplainError::ShapeMismatch {
                expected: x.len(),
                actual: background.ncols(),
            });
        }

        let score = |m: ndarray::ArrayView2<'_, f64>| self.scorer.predict_matrix(m);
        let attribution = self.attributor.attribute(&score, background.view(), x)?;
        if attribution.values.len() != x.len() {
            return Err(ExplainError::ShapeMismatch {
                expected: x.len(),
                actual: attribution.values.len(),
            });
        }

        let probability = self.scorer.predict_matrix(input.view())?[0];
        let class = RiskClass::from_probability(probability, self.threshold);

        let names = resolve_feature_names(self.scorer.feature_names(), x.len());
        let contributions = names
            .into_iter()
            .zip(attribution.values)
            .map(|(name, value)| Contribution::new(name, value))
            .collect();
        let ranked = rank(contributions);
        let reasons = render_reasons(&ranked);

        debug!(
            "Explained p={:.4} against {} background rows: {} contributions, {} reasons",
            probability,
            background_rows.len(),
            ranked.len(),
            reasons.len()
        );

        let explanation_summary = match class {
            RiskClass::High => "These features increased risk the most",
            RiskClass::Low => "These features decreased risk the most",
        };

        Ok(ExplanationResult {
            predicted_class: class.as_class(),
            risk_label: class.label().to_string(),
            readmission_probability: probability,
            threshold: self.threshold,
            base_value: attribution.base_value.unwrap_or(0.0),
            top_contributions: ranked.top().to_vec(),
            all_contributions_count: ranked.len(),
            reasons,
            explanation_summary: explanation_summary.to_string(),
            top_positive_contributions: ranked.positive,
            top_negative_contributions: ranked.negative,
        })
    }
}

impl std::fmt::Debug for Explainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Explainer")
            .field("scorer", &self.scorer)
            .field("threshold", &self.threshold)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{Attribution, KernelShap, ScoreFn};
    use approx::assert_abs_diff_eq;
    use feature_engine::TrainingColumns;
    use inference_engine::{ColumnTransformer, LogisticClassifier, Passthrough, Transformer};
    use ndarray::{ArrayView1, ArrayView2};

    fn explainer(threshold: f64, attributor: Arc<dyn Attributor>) -> Explainer {
        let columns = TrainingColumns::new(["n_procedures", "n_medications", "time_in_hospital"]);
        let deriver = FeatureDeriver::new(columns, ["Cardiology"]);
        let preprocessor = ColumnTransformer::new(vec![Transformer::Passthrough(Passthrough {
            name: "num".into(),
            columns: vec![
                "n_procedures".into(),
                "n_medications".into(),
                "time_in_hospital".into(),
            ],
        })]);
        let scorer = Scorer::new(
            Arc::new(preprocessor),
            Arc::new(LogisticClassifier::new(vec![0.4, -0.1, 0.05], -0.5)),
        );
        Explainer::new(deriver, scorer, attributor, threshold)
    }

    fn record() -> RawPatientRecord {
        RawPatientRecord {
            n_procedures: 3,
            n_medications: 12,
            time_in_hospital: 4,
            ..Default::default()
        }
    }

    struct NoBaseline;

    impl Attributor for NoBaseline {
        fn attribute(
            &self,
            _score: &ScoreFn<'_>,
            _background: ArrayView2<'_, f64>,
            x: ArrayView1<'_, f64>,
        ) -> Result<Attribution, ExplainError> {
            Ok(Attribution {
                values: vec![0.0; x.len()],
                base_value: None,
            })
        }
    }

    #[test]
    fn test_explain_result_is_consistent() {
        let result = explainer(0.5, Arc::new(KernelShap::default()))
            .explain(&record())
            .unwrap();

        assert_eq!(result.all_contributions_count, 3);
        assert_eq!(result.top_contributions.len(), 3);
        assert_eq!(result.top_contributions[0].feature_name.split("__").count(), 2);

        let total: f64 = result.top_contributions.iter().map(|c| c.shap_value).sum();
        assert_abs_diff_eq!(
            total,
            result.readmission_probability - result.base_value,
            epsilon = 1e-9
        );
        assert_eq!(
            result.reasons.len(),
            result.top_positive_contributions.len() + result.top_negative_contributions.len()
        );
    }

    #[test]
    fn test_label_follows_threshold() {
        let low = explainer(0.99, Arc::new(KernelShap::default()))
            .explain(&record())
            .unwrap();
        assert_eq!(low.predicted_class, 0);
        assert_eq!(low.risk_label, "Low risk");
        assert_eq!(low.explanation_summary, "These features decreased risk the most");

        let high = explainer(0.0, Arc::new(KernelShap::default()))
            .explain(&record())
            .unwrap();
        assert_eq!(high.predicted_class, 1);
        assert_eq!(high.risk_label, "High risk");
        assert_eq!(high.explanation_summary, "These features increased risk the most");
    }

    #[test]
    fn test_missing_baseline_reads_zero() {
        let result = explainer(0.5, Arc::new(NoBaseline)).explain(&record()).unwrap();
        assert_eq!(result.base_value, 0.0);
        assert!(result.reasons.is_empty());
        assert!(result.top_positive_contributions.is_empty());
    }

    #[test]
    fn test_probability_matches_prediction() {
        let ex = explainer(0.5, Arc::new(KernelShap::default()));
        let engine = InferenceEngine::new(ex.deriver.clone(), ex.scorer.clone(), 0.5);
        let prediction = engine.predict(&record()).unwrap();
        let explanation = ex.explain(&record()).unwrap();
        assert_eq!(prediction.readmission_probability, explanation.readmission_probability);
        assert_eq!(prediction.predicted_class, explanation.predicted_class);
    }
}

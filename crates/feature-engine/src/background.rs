//! Background Synthesis
//!
//! Builds a small neighbourhood of plausible records around one patient by
//! scaling their numeric counters. It stands in for a stored training
//! background when attributing a single prediction.

use crate::features::FeatureDeriver;
use crate::record::NUMERIC_INPUT_FIELDS;
use crate::row::EngineeredRow;
use tracing::debug;

/// Scale factors applied to the numeric counters, one background row each
pub const SCALE_FACTORS: [f64; 5] = [0.8, 0.9, 1.0, 1.1, 1.2];

/// Generates perturbed neighbours of an engineered row
#[derive(Debug, Clone)]
pub struct BackgroundSynthesizer {
    deriver: FeatureDeriver,
}

impl BackgroundSynthesizer {
    pub fn new(deriver: FeatureDeriver) -> Self {
        Self { deriver }
    }

    /// Synthesize one aligned row per scale factor.
    ///
    /// `engineered` must be the pre-alignment output of
    /// [`FeatureDeriver::engineer`].
    pub fn synthesize(&self, engineered: &EngineeredRow) -> Vec<EngineeredRow> {
        SCALE_FACTORS
            .iter()
            .map(|&scale| {
                let mut row = perturb(engineered, scale);
                self.deriver.recompute(&mut row);
                self.deriver.columns().align(&row)
            })
            .inspect(|row| debug!("Background row with {} columns", row.len()))
            .collect()
    }
}

/// Scale every numeric counter, clamp at zero and round half to even.
///
/// Counters that are absent or non-numeric are left alone.
pub fn perturb(engineered: &EngineeredRow, scale: f64) -> EngineeredRow {
    let mut row = engineered.clone();
    for field in NUMERIC_INPUT_FIELDS {
        if let Some(value) = row.number(field) {
            let scaled = (value * scale).max(0.0);
            row.set(field, scaled.round_ties_even());
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawPatientRecord;
    use crate::row::TrainingColumns;

    fn deriver() -> FeatureDeriver {
        FeatureDeriver::new(
            TrainingColumns::new([
                "n_medications",
                "time_in_hospital",
                "med_to_stay_ratio",
                "diag_1_severity",
                "num_diagnoses",
            ]),
            ["Cardiology"],
        )
    }

    #[test]
    fn test_five_aligned_rows() {
        let d = deriver();
        let engineered = d.engineer(&RawPatientRecord {
            n_medications: 10,
            time_in_hospital: 5,
            ..Default::default()
        });
        let rows = BackgroundSynthesizer::new(d.clone()).synthesize(&engineered);

        assert_eq!(rows.len(), 5);
        for row in &rows {
            assert_eq!(
                row.columns().collect::<Vec<_>>(),
                d.columns().names().iter().map(String::as_str).collect::<Vec<_>>()
            );
        }
    }

    #[test]
    fn test_unit_scale_reproduces_input() {
        let d = deriver();
        let raw = RawPatientRecord {
            n_medications: 13,
            time_in_hospital: 7,
            diag_1: Some("Injury".into()),
            ..Default::default()
        };
        let rows = BackgroundSynthesizer::new(d.clone()).synthesize(&d.engineer(&raw));
        let unit = SCALE_FACTORS.iter().position(|&s| s == 1.0).unwrap();
        assert_eq!(rows[unit], d.derive(&raw));
    }

    #[test]
    fn test_derived_columns_follow_perturbation() {
        let d = deriver();
        let engineered = d.engineer(&RawPatientRecord {
            n_medications: 10,
            time_in_hospital: 5,
            ..Default::default()
        });
        let rows = BackgroundSynthesizer::new(d).synthesize(&engineered);

        // 0.8 scale: 8 medications over 4 days
        assert_eq!(rows[0].number("n_medications"), Some(8.0));
        assert_eq!(rows[0].number("time_in_hospital"), Some(4.0));
        assert_eq!(rows[0].number("med_to_stay_ratio"), Some(2.0));
        // 1.2 scale: 12 medications over 6 days
        assert_eq!(rows[4].number("med_to_stay_ratio"), Some(2.0));
        assert_eq!(rows[4].number("n_medications"), Some(12.0));
    }

    #[test]
    fn test_rounding_is_half_even() {
        let mut row = EngineeredRow::new();
        row.set("n_medications", 5.0);
        // 5 * 0.9 = 4.5 rounds down to the even neighbour
        assert_eq!(perturb(&row, 0.9).number("n_medications"), Some(4.0));
    }

    #[test]
    fn test_diagnosis_count_carried_over() {
        let d = deriver();
        let engineered = d.engineer(&RawPatientRecord {
            diag_1: Some("Digestive".into()),
            ..Default::default()
        });
        for row in BackgroundSynthesizer::new(d).synthesize(&engineered) {
            assert_eq!(row.number("num_diagnoses"), Some(1.0));
            assert_eq!(row.number("diag_1_severity"), Some(4.0));
        }
    }
}

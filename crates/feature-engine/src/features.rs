//! Feature Derivation
//!
//! Turns one raw patient record into the engineered row the trained
//! preprocessing and model pipeline expects.

use crate::categories::{AgeGroup, DiagnosisGroup};
use crate::record::{RawPatientRecord, DIAGNOSIS_FIELDS};
use crate::row::{EngineeredRow, TrainingColumns, Value};
use std::collections::HashSet;
use tracing::debug;

/// Specialty label used for anything outside the allow-list
pub const OTHER_SPECIALTY: &str = "Other";

/// Ratio with division-by-zero and non-finite results mapped to 0
pub fn safe_ratio(numerator: f64, denominator: f64) -> f64 {
    let ratio = numerator / denominator;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Derives engineered rows from raw patient records
#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    columns: TrainingColumns,
    top_specialties: HashSet<String>,
}

impl FeatureDeriver {
    /// Create a deriver for the given training schema and specialty allow-list
    pub fn new<I, S>(columns: TrainingColumns, top_specialties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns,
            top_specialties: top_specialties.into_iter().map(Into::into).collect(),
        }
    }

    pub fn columns(&self) -> &TrainingColumns {
        &self.columns
    }

    /// Derive the model-ready row, aligned to the training columns
    pub fn derive(&self, raw: &RawPatientRecord) -> EngineeredRow {
        self.columns.align(&self.engineer(raw))
    }

    /// Derive every engineered column without aligning.
    ///
    /// The result still carries raw and extra fields; background synthesis
    /// starts from this form.
    pub fn engineer(&self, raw: &RawPatientRecord) -> EngineeredRow {
        let mut row = EngineeredRow::new();

        row.set("age", raw.age.as_deref());
        row.set("medical_specialty", raw.medical_specialty.as_deref());
        row.set("n_outpatient", raw.n_outpatient);
        row.set("n_inpatient", raw.n_inpatient);
        row.set("n_emergency", raw.n_emergency);
        row.set("n_procedures", raw.n_procedures);
        row.set("n_lab_procedures", raw.n_lab_procedures);
        row.set("n_medications", raw.n_medications);
        row.set("time_in_hospital", raw.time_in_hospital);
        for (field, diag) in DIAGNOSIS_FIELDS.iter().zip(raw.diagnoses()) {
            row.set(field, diag);
        }
        for (key, value) in &raw.extra {
            row.set(key, Value::from_json(value));
        }

        let num_diagnoses = raw.diagnoses().iter().filter(|d| d.is_some()).count();
        row.set("num_diagnoses", num_diagnoses as f64);

        self.derive_ratios(&mut row);

        row.set("age_group_simplified", AgeGroup::from_label(raw.age.as_deref()).as_str());

        for (field, diag) in DIAGNOSIS_FIELDS.iter().zip(raw.diagnoses()) {
            row.set(field, DiagnosisGroup::from_description(diag).as_str());
        }

        self.derive_diagnosis_flags(&mut row);
        self.derive_severity(&mut row);
        self.cap_specialty(&mut row);

        debug!(
            "Engineered {} columns (num_diagnoses={})",
            row.len(),
            num_diagnoses
        );
        row
    }

    /// Recompute every column derived from the numeric counters.
    ///
    /// Expects `diag_1..3` to already hold simplified group labels.
    pub fn recompute(&self, row: &mut EngineeredRow) {
        self.derive_ratios(row);
        self.derive_diagnosis_flags(row);
        self.derive_severity(row);
        self.cap_specialty(row);
    }

    fn derive_ratios(&self, row: &mut EngineeredRow) {
        let procedures = row.number("n_procedures").unwrap_or(0.0);
        let lab_procedures = row.number("n_lab_procedures").unwrap_or(0.0);
        let medications = row.number("n_medications").unwrap_or(0.0);
        let stay = row.number("time_in_hospital").unwrap_or(1.0);

        row.set("total_med_procedures", lab_procedures + procedures);
        row.set("med_to_stay_ratio", safe_ratio(medications, stay));
        row.set("had_procedures", if procedures > 0.0 { 1.0 } else { 0.0 });
        row.set("procedures_per_day", safe_ratio(procedures, stay + 1.0));
        row.set("procedures_vs_medications", safe_ratio(procedures, medications + 1.0));
        row.set("procedures_interaction", procedures * stay);
    }

    fn derive_diagnosis_flags(&self, row: &mut EngineeredRow) {
        let procedures = row.number("n_procedures").unwrap_or(0.0);
        let groups = simplified_groups(row);

        for group in DiagnosisGroup::ALL {
            let flag = if groups.contains(&Some(group)) { 1.0 } else { 0.0 };
            row.set(&group.flag_column(), flag);
            row.set(&group.interaction_column(), flag * procedures);
        }
    }

    fn derive_severity(&self, row: &mut EngineeredRow) {
        let groups = simplified_groups(row);
        let severities: Vec<f64> = groups
            .iter()
            .map(|g| g.map(|g| g.severity() as f64).unwrap_or(0.0))
            .collect();

        for (field, severity) in DIAGNOSIS_FIELDS.iter().zip(&severities) {
            row.set(&format!("{}_severity", field), *severity);
        }
        let max = severities.iter().copied().fold(0.0, f64::max);
        let total: f64 = severities.iter().sum();
        row.set("max_diag_severity", max);
        row.set("total_diag_severity", total);
    }

    fn cap_specialty(&self, row: &mut EngineeredRow) {
        let capped = match row.text("medical_specialty") {
            Some(s) if self.top_specialties.contains(s) => s.to_string(),
            _ => OTHER_SPECIALTY.to_string(),
        };
        row.set("medical_specialty", capped.as_str());
    }
}

/// Simplified diagnosis group per slot, as stored in the row
fn simplified_groups(row: &EngineeredRow) -> [Option<DiagnosisGroup>; 3] {
    DIAGNOSIS_FIELDS.map(|field| row.text(field).and_then(DiagnosisGroup::from_label))
}

//! Raw Patient Record

use serde::de::{self, Deserializer, Unexpected};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Numeric fields perturbed when synthesizing a background population
pub const NUMERIC_INPUT_FIELDS: [&str; 7] = [
    "n_outpatient",
    "n_inpatient",
    "n_emergency",
    "n_procedures",
    "n_lab_procedures",
    "n_medications",
    "time_in_hospital",
];

/// Diagnosis slots, in order.
pub const DIAGNOSIS_FIELDS: [&str; 3] = ["diag_1", "diag_2", "diag_3"];

/// One patient as submitted by a client.
///
/// Every named field is optional on the wire. Keys that are not recognised
/// are kept in [`RawPatientRecord::extra`] and carried into the engineered
/// row untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPatientRecord {
    /// Age decade bucket label, e.g. `"[60-70)"`
    #[serde(default)]
    pub age: Option<String>,
    /// Admitting physician specialty
    #[serde(default)]
    pub medical_specialty: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_outpatient: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_inpatient: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_emergency: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_procedures: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_lab_procedures: i64,
    #[serde(default, deserialize_with = "lenient_count")]
    pub n_medications: i64,
    /// Length of stay in days
    #[serde(default = "default_time_in_hospital", deserialize_with = "lenient_count")]
    pub time_in_hospital: i64,
    /// Primary diagnosis description
    #[serde(default)]
    pub diag_1: Option<String>,
    /// Secondary diagnosis description
    #[serde(default)]
    pub diag_2: Option<String>,
    /// Additional secondary diagnosis description
    #[serde(default)]
    pub diag_3: Option<String>,
    /// Unrecognised fields, keyed by name
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

fn default_time_in_hospital() -> i64 {
    1
}

impl Default for RawPatientRecord {
    fn default() -> Self {
        Self {
            age: None,
            medical_specialty: None,
            n_outpatient: 0,
            n_inpatient: 0,
            n_emergency: 0,
            n_procedures: 0,
            n_lab_procedures: 0,
            n_medications: 0,
            time_in_hospital: default_time_in_hospital(),
            diag_1: None,
            diag_2: None,
            diag_3: None,
            extra: BTreeMap::new(),
        }
    }
}

impl RawPatientRecord {
    /// Diagnosis descriptions in slot order
    pub fn diagnoses(&self) -> [Option<&str>; 3] {
        [
            self.diag_1.as_deref(),
            self.diag_2.as_deref(),
            self.diag_3.as_deref(),
        ]
    }
}

/// Accepts integers, integral floats and numeric strings.
fn lenient_count<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match &value {
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Ok(i);
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() >= i64::MAX as f64 => {
                    Err(de::Error::custom(format!("count {} is out of range", f)))
                }
                Some(f) if f.fract() == 0.0 && f.is_finite() => Ok(f as i64),
                Some(f) => Err(de::Error::invalid_value(
                    Unexpected::Float(f),
                    &"an integer count",
                )),
                None => Err(de::Error::custom("count is out of range")),
            }
        }
        serde_json::Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            de::Error::invalid_value(Unexpected::Str(s), &"an integer count")
        }),
        serde_json::Value::Null => Err(de::Error::invalid_type(
            Unexpected::Unit,
            &"an integer count",
        )),
        serde_json::Value::Bool(b) => Err(de::Error::invalid_type(
            Unexpected::Bool(*b),
            &"an integer count",
        )),
        _ => Err(de::Error::custom("expected an integer count")),
    }
}

//! Feature Engineering Engine
//!
//! Derives the engineered feature row for a readmission risk model from a
//! raw patient record, and synthesizes the local background population used
//! to explain individual predictions.

mod background;
mod categories;
mod error;
mod features;
mod record;
mod row;

pub use background::{perturb, BackgroundSynthesizer, SCALE_FACTORS};
pub use categories::{AgeGroup, DiagnosisGroup};
pub use error::FeatureError;
pub use features::{safe_ratio, FeatureDeriver, OTHER_SPECIALTY};
pub use record::{RawPatientRecord, DIAGNOSIS_FIELDS, NUMERIC_INPUT_FIELDS};
pub use row::{EngineeredRow, TrainingColumns, Value};

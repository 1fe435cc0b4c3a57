use feature_engine::RawPatientRecord;
use inference_engine::{load_threshold, InferenceEngine, InferenceError, ModelArtifacts};
use std::path::PathBuf;

fn models_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../models")
}

fn engine() -> InferenceEngine {
    let artifacts = ModelArtifacts::load(&models_dir().join("readmission_model.json")).unwrap();
    let threshold = load_threshold(&models_dir().join("best_threshold.json")).unwrap();
    InferenceEngine::from_artifacts(&artifacts, threshold)
}

fn record() -> RawPatientRecord {
    serde_json::from_value(serde_json::json!({
        "age": "[80-90)",
        "medical_specialty": "Nephrology",
        "n_inpatient": 3,
        "n_emergency": 1,
        "n_procedures": 1,
        "n_lab_procedures": 60,
        "n_medications": 22,
        "time_in_hospital": 7,
        "diag_1": "Circulatory",
        "diag_2": "Other",
        "diabetes_med": "yes"
    }))
    .unwrap()
}

#[test]
fn demo_bundle_loads() {
    let artifacts = ModelArtifacts::load(&models_dir().join("readmission_model.json")).unwrap();
    assert_eq!(artifacts.columns().len(), 44);
    assert!(artifacts.top_specialties().iter().any(|s| s == "Cardiology"));

    let scorer = artifacts.scorer();
    assert_eq!(scorer.n_features(), 80);
    let names = scorer.feature_names().unwrap();
    assert_eq!(names[0], "num__time_in_hospital");
    assert!(names.iter().any(|n| n == "cat__medical_specialty_Other"));
}

#[test]
fn demo_threshold_loads() {
    let threshold = load_threshold(&models_dir().join("best_threshold.json")).unwrap();
    assert_eq!(threshold, 0.46);
}

#[test]
fn prediction_is_a_probability() {
    let prediction = engine().predict(&record()).unwrap();
    assert!((0.0..=1.0).contains(&prediction.readmission_probability));
    assert!(prediction.predicted_class <= 1);
}

#[test]
fn default_record_is_scored() {
    let prediction = engine().predict(&RawPatientRecord::default()).unwrap();
    assert!(prediction.readmission_probability > 0.0);
}

#[test]
fn more_inpatient_visits_raise_risk() {
    let engine = engine();
    let base = engine.predict(&record()).unwrap();
    let mut frequent = record();
    frequent.n_inpatient += 5;
    let higher = engine.predict(&frequent).unwrap();
    assert!(higher.readmission_probability > base.readmission_probability);
}

#[test]
fn missing_bundle_is_fatal() {
    let err = ModelArtifacts::load(&models_dir().join("absent.json")).unwrap_err();
    assert!(matches!(err, InferenceError::Io { .. }));
}

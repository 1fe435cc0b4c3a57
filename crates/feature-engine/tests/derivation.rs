//! Derivation properties over arbitrary patient records.

use feature_engine::{
    BackgroundSynthesizer, FeatureDeriver, RawPatientRecord, TrainingColumns, Value,
    NUMERIC_INPUT_FIELDS,
};
use proptest::prelude::*;

const RATIO_COLUMNS: [&str; 3] = [
    "med_to_stay_ratio",
    "procedures_per_day",
    "procedures_vs_medications",
];

fn training_columns() -> TrainingColumns {
    TrainingColumns::new([
        "age_group_simplified",
        "medical_specialty",
        "time_in_hospital",
        "n_lab_procedures",
        "n_procedures",
        "n_medications",
        "n_outpatient",
        "n_inpatient",
        "n_emergency",
        "diag_1",
        "diag_2",
        "diag_3",
        "glucose_test",
        "num_diagnoses",
        "total_med_procedures",
        "med_to_stay_ratio",
        "had_procedures",
        "procedures_per_day",
        "procedures_vs_medications",
        "procedures_interaction",
        "has_respiratory_diag",
        "has_other_diag",
        "has_missing_diag",
        "other_procedures_interaction",
        "diag_1_severity",
        "max_diag_severity",
        "total_diag_severity",
    ])
}

fn deriver() -> FeatureDeriver {
    FeatureDeriver::new(training_columns(), ["Cardiology", "InternalMedicine", "Missing"])
}

fn arb_age() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        prop::sample::select(vec![
            "[0-10)", "[20-30)", "[40-50)", "[50-60)", "[70-80)", "[80-90)", "[90-100)",
        ])
        .prop_map(|s| Some(s.to_string())),
        "[a-z0-9\\[\\)-]{0,8}".prop_map(Some),
    ]
}

fn arb_diag() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        prop::sample::select(vec![
            "Diabetes", "Circulatory", "Respiratory", "Digestive", "Injury",
            "Musculoskeletal", "Other", "Missing",
        ])
        .prop_map(|s| Some(s.to_string())),
        ".{0,16}".prop_map(Some),
    ]
}

prop_compose! {
    fn arb_record()(
        age in arb_age(),
        specialty in prop::option::of(prop::sample::select(vec![
            "Cardiology", "Surgery", "InternalMedicine", "Missing", "",
        ])),
        counters in prop::array::uniform6(0i64..120),
        time_in_hospital in -2i64..20,
        diags in (arb_diag(), arb_diag(), arb_diag()),
    ) -> RawPatientRecord {
        RawPatientRecord {
            age,
            medical_specialty: specialty.map(str::to_string),
            n_outpatient: counters[0],
            n_inpatient: counters[1],
            n_emergency: counters[2],
            n_procedures: counters[3],
            n_lab_procedures: counters[4],
            n_medications: counters[5],
            time_in_hospital,
            diag_1: diags.0,
            diag_2: diags.1,
            diag_3: diags.2,
            ..Default::default()
        }
    }
}

proptest! {
    #[test]
    fn derived_columns_match_training_order(raw in arb_record()) {
        let row = deriver().derive(&raw);
        let columns: Vec<&str> = row.columns().collect();
        let training = training_columns();
        let expected: Vec<&str> = training.names().iter().map(String::as_str).collect();
        prop_assert_eq!(columns, expected);
    }

    #[test]
    fn derivation_is_idempotent(raw in arb_record()) {
        let d = deriver();
        let first = serde_json::to_string(&d.derive(&raw)).unwrap();
        let second = serde_json::to_string(&d.derive(&raw)).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn ratios_are_always_finite(raw in arb_record()) {
        let row = deriver().derive(&raw);
        for column in RATIO_COLUMNS {
            let value = row.number(column).unwrap();
            prop_assert!(value.is_finite(), "{} = {}", column, value);
        }
        if raw.time_in_hospital == 0 {
            prop_assert_eq!(row.number("med_to_stay_ratio"), Some(0.0));
        }
    }

    #[test]
    fn background_rows_are_aligned(raw in arb_record()) {
        let d = deriver();
        let rows = BackgroundSynthesizer::new(d.clone()).synthesize(&d.engineer(&raw));
        prop_assert_eq!(rows.len(), 5);
        for row in &rows {
            prop_assert_eq!(row.len(), training_columns().len());
            for field in NUMERIC_INPUT_FIELDS {
                let value = row.number(field).unwrap();
                prop_assert!(value >= 0.0 && value.fract() == 0.0);
            }
        }
    }
}

#[test]
fn sparse_record_scenario() {
    let raw: RawPatientRecord = serde_json::from_value(serde_json::json!({
        "n_procedures": 0,
        "n_medications": 5,
        "time_in_hospital": 1,
        "diag_1": null,
        "diag_2": null,
        "diag_3": null,
        "age": null,
        "medical_specialty": null,
    }))
    .unwrap();

    let row = deriver().engineer(&raw);
    assert_eq!(row.number("had_procedures"), Some(0.0));
    assert_eq!(row.number("procedures_per_day"), Some(0.0));
    assert_eq!(row.number("med_to_stay_ratio"), Some(5.0));
    assert_eq!(row.number("num_diagnoses"), Some(0.0));
    assert_eq!(row.text("age_group_simplified"), Some("Other"));
    assert_eq!(row.text("medical_specialty"), Some("Other"));

    for group in ["respiratory", "circulatory", "diabetes", "digestive", "injury", "musculoskeletal", "missing"] {
        assert_eq!(row.number(&format!("has_{group}_diag")), Some(0.0), "{group}");
    }
    assert_eq!(row.number("has_other_diag"), Some(1.0));
    assert_eq!(row.number("total_diag_severity"), Some(9.0));
}

#[test]
fn absent_training_columns_default_to_zero() {
    let row = deriver().derive(&RawPatientRecord::default());
    assert_eq!(row.get("glucose_test"), Some(&Value::Number(0.0)));

    let mut raw = RawPatientRecord::default();
    raw.extra.insert("glucose_test".into(), serde_json::json!("high"));
    let row = deriver().derive(&raw);
    assert_eq!(row.text("glucose_test"), Some("high"));
}

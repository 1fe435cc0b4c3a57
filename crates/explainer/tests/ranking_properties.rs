use explainer::{rank, render_reasons, Contribution, TOP_CONTRIBUTIONS, TOP_K};
use proptest::prelude::*;

fn contributions(values: Vec<f64>) -> Vec<Contribution> {
    values
        .into_iter()
        .enumerate()
        .map(|(i, v)| Contribution::new(format!("num__feature_{}", i), v))
        .collect()
}

/// True when `subset` appears in `full` in the same relative order
fn is_ordered_subset(subset: &[Contribution], full: &[Contribution]) -> bool {
    let mut remaining = full.iter();
    subset.iter().all(|s| remaining.any(|f| f == s))
}

proptest! {
    #[test]
    fn ranked_by_descending_magnitude(values in prop::collection::vec(-1.0f64..1.0, 0..60)) {
        let ranked = rank(contributions(values.clone()));
        prop_assert_eq!(ranked.len(), values.len());
        for pair in ranked.ranked.windows(2) {
            prop_assert!(pair[0].shap_value.abs() >= pair[1].shap_value.abs());
        }
        prop_assert!(ranked.top().len() <= TOP_CONTRIBUTIONS);
    }

    #[test]
    fn signed_subsets_are_strict_and_capped(values in prop::collection::vec(-1.0f64..1.0, 0..60)) {
        let ranked = rank(contributions(values));

        prop_assert!(ranked.positive.len() <= TOP_K);
        prop_assert!(ranked.negative.len() <= TOP_K);
        prop_assert!(ranked.positive.iter().all(|c| c.shap_value > 0.0));
        prop_assert!(ranked.negative.iter().all(|c| c.shap_value < 0.0));
        prop_assert!(is_ordered_subset(&ranked.positive, &ranked.ranked));
        prop_assert!(is_ordered_subset(&ranked.negative, &ranked.ranked));

        let available = ranked.ranked.iter().filter(|c| c.shap_value > 0.0).count();
        prop_assert_eq!(ranked.positive.len(), available.min(TOP_K));
    }

    #[test]
    fn one_reason_per_signed_entry(values in prop::collection::vec(-1.0f64..1.0, 0..40)) {
        let ranked = rank(contributions(values));
        let reasons = render_reasons(&ranked);
        let (increased, reduced) = reasons.split_at(ranked.positive.len());

        prop_assert_eq!(reasons.len(), ranked.positive.len() + ranked.negative.len());
        prop_assert!(increased.iter().all(|r| r.contains(" increased risk by +")));
        prop_assert!(reduced.iter().all(|r| r.contains(" reduced risk by -")));
    }
}

#[test]
fn zero_contributions_are_in_neither_subset() {
    let ranked = rank(contributions(vec![0.0, 0.0, 0.0]));
    assert_eq!(ranked.len(), 3);
    assert!(ranked.positive.is_empty());
    assert!(ranked.negative.is_empty());
    assert!(render_reasons(&ranked).is_empty());
}

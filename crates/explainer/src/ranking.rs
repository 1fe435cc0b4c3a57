//! Contribution ranking and phrasing

use serde::{Deserialize, Serialize};

/// Entries kept in each of the positive and negative subsets
pub const TOP_K: usize = 5;

/// Entries kept in the overall ranked list
pub const TOP_CONTRIBUTIONS: usize = 20;

/// Attribution value of one model-facing feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contribution {
    #[serde(rename = "feature")]
    pub feature_name: String,
    pub shap_value: f64,
}

impl Contribution {
    pub fn new(feature_name: impl Into<String>, shap_value: f64) -> Self {
        Self {
            feature_name: feature_name.into(),
            shap_value,
        }
    }
}

/// Contributions sorted by descending magnitude with signed subsets
#[derive(Debug, Clone, PartialEq)]
pub struct RankedContributions {
    /// Every contribution, largest magnitude first
    pub ranked: Vec<Contribution>,
    /// First `TOP_K` strictly positive entries of `ranked`
    pub positive: Vec<Contribution>,
    /// First `TOP_K` strictly negative entries of `ranked`
    pub negative: Vec<Contribution>,
}

impl RankedContributions {
    /// The leading `TOP_CONTRIBUTIONS` entries
    pub fn top(&self) -> &[Contribution] {
        &self.ranked[..self.ranked.len().min(TOP_CONTRIBUTIONS)]
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }
}

/// Names for `n` model-facing features.
///
/// Positions without a published name fall back to `f_<index>`.
pub fn resolve_feature_names(names: Option<Vec<String>>, n: usize) -> Vec<String> {
    let names = names.unwrap_or_default();
    (0..n)
        .map(|i| names.get(i).cloned().unwrap_or_else(|| format!("f_{}", i)))
        .collect()
}

/// Human-readable form of a model-facing feature name.
///
/// `cat__medical_specialty_Cardiology` becomes `medical specialty Cardiology`.
pub fn pretty_name(raw: &str) -> String {
    let name = raw.rsplit("__").next().unwrap_or(raw);
    name.replace('=', " = ").replace('_', " ").trim().to_string()
}

/// Sort by descending absolute value and split out the signed top entries.
///
/// The sort is stable, so equal magnitudes keep feature order.
pub fn rank(contributions: Vec<Contribution>) -> RankedContributions {
    let mut ranked = contributions;
    ranked.sort_by(|a, b| b.shap_value.abs().total_cmp(&a.shap_value.abs()));

    let pick = |keep: fn(f64) -> bool| -> Vec<Contribution> {
        ranked
            .iter()
            .filter(|c| keep(c.shap_value))
            .take(TOP_K)
            .cloned()
            .collect()
    };
    let positive = pick(|v| v > 0.0);
    let negative = pick(|v| v < 0.0);

    RankedContributions {
        ranked,
        positive,
        negative,
    }
}

/// One sentence per signed top contribution, positives first
pub fn render_reasons(ranked: &RankedContributions) -> Vec<String> {
    let increased = ranked.positive.iter().map(|c| {
        format!(
            "{} increased risk by +{:.3}",
            pretty_name(&c.feature_name),
            c.shap_value.abs()
        )
    });
    let reduced = ranked.negative.iter().map(|c| {
        format!(
            "{} reduced risk by -{:.3}",
            pretty_name(&c.feature_name),
            c.shap_value.abs()
        )
    });
    increased.chain(reduced).collect()
}

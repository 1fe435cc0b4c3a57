//! Kernel SHAP Attribution
//!
//! Model-agnostic Shapley value estimation. Feature coalitions are evaluated
//! by substituting the explained row's values into every background row and
//! averaging the model output; the Shapley values are the solution of a
//! kernel-weighted least-squares fit constrained to sum to
//! `f(x) - E[f(background)]`.

use crate::ExplainError;
use inference_engine::InferenceError;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Model output for each row of a feature matrix
pub type ScoreFn<'a> = dyn Fn(ArrayView2<'_, f64>) -> Result<Vec<f64>, InferenceError> + 'a;

/// Per-feature attribution for one explained row
#[derive(Debug, Clone, PartialEq)]
pub struct Attribution {
    /// One value per model-facing feature
    pub values: Vec<f64>,
    /// Expected model output over the background, when known
    pub base_value: Option<f64>,
}

/// Computes feature attributions for a single row against a background
pub trait Attributor: Send + Sync {
    fn attribute(
        &self,
        score: &ScoreFn<'_>,
        background: ArrayView2<'_, f64>,
        x: ArrayView1<'_, f64>,
    ) -> Result<Attribution, ExplainError>;
}

/// Number of coalitions evaluated per explanation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleBudget {
    /// `2 * M + 2048` for M varying features
    #[default]
    Auto,
    Fixed(usize),
}

impl SampleBudget {
    /// Resolve to a concrete count, capped at the number of proper coalitions
    pub fn resolve(&self, varying: usize) -> usize {
        let requested = match self {
            SampleBudget::Auto => 2 * varying + 2048,
            SampleBudget::Fixed(n) => *n,
        };
        if varying <= 30 {
            requested.min((1usize << varying) - 2)
        } else {
            requested
        }
    }
}

impl From<Option<usize>> for SampleBudget {
    fn from(value: Option<usize>) -> Self {
        value.map(SampleBudget::Fixed).unwrap_or_default()
    }
}

/// Kernel SHAP attributor.
///
/// Holds only configuration; a fresh [`KernelExplainer`] is built over the
/// supplied background on every call.
#[derive(Debug, Clone, Default)]
pub struct KernelShap {
    budget: SampleBudget,
    seed: u64,
}

impl KernelShap {
    pub fn new(budget: SampleBudget, seed: u64) -> Self {
        Self { budget, seed }
    }
}

impl Attributor for KernelShap {
    fn attribute(
        &self,
        score: &ScoreFn<'_>,
        background: ArrayView2<'_, f64>,
        x: ArrayView1<'_, f64>,
    ) -> Result<Attribution, ExplainError> {
        let explainer = KernelExplainer::new(score, background)?;
        let mut rng = StdRng::seed_from_u64(self.seed);
        explainer.shap_values(x, self.budget, &mut rng)
    }
}

/// Kernel SHAP model bound to one score function and background
pub struct KernelExplainer<'s, 'b> {
    score: &'s ScoreFn<'s>,
    background: ArrayView2<'b, f64>,
    expected_value: f64,
}

impl<'s, 'b> KernelExplainer<'s, 'b> {
    /// Bind to a background and compute the expected model output over it
    pub fn new(
        score: &'s ScoreFn<'s>,
        background: ArrayView2<'b, f64>,
    ) -> Result<Self, ExplainError> {
        if background.nrows() == 0 {
            return Err(ExplainError::EmptyBackground);
        }
        let outputs = score(background)?;
        if outputs.len() != background.nrows() {
            return Err(ExplainError::ShapeMismatch {
                expected: background.nrows(),
                actual: outputs.len(),
            });
        }
        let expected_value = outputs.iter().sum::<f64>() / outputs.len() as f64;
        Ok(Self {
            score,
            background,
            expected_value,
        })
    }

    /// Mean model output over the background
    pub fn expected_value(&self) -> f64 {
        self.expected_value
    }

    /// Estimate Shapley values for one row
    pub fn shap_values<R: Rng>(
        &self,
        x: ArrayView1<'_, f64>,
        budget: SampleBudget,
        rng: &mut R,
    ) -> Result<Attribution, ExplainError> {
        let n_features = self.background.ncols();
        if x.len() != n_features {
            return Err(ExplainError::ShapeMismatch {
                expected: n_features,
                actual: x.len(),
            });
        }

        let fx = (self.score)(x.insert_axis(Axis(0)))?
            .first()
            .copied()
            .ok_or_else(|| InferenceError::InferenceFailed("model returned no output".into()))?;
        let total = fx - self.expected_value;

        let varying = self.varying_features(x);
        let mut values = vec![0.0; n_features];

        match varying.len() {
            0 => {}
            1 => values[varying[0]] = total,
            m => {
                let nsamples = budget.resolve(m);
                let coalitions = Coalitions::build(m, nsamples, rng);
                debug!(
                    "Kernel SHAP: {} varying features, {} coalitions (budget {})",
                    m,
                    coalitions.len(),
                    nsamples
                );
                let ey = self.coalition_outputs(x, &varying, &coalitions.masks)?;
                let phi = solve_constrained(m, &coalitions, &ey, self.expected_value, fx)?;
                for (feature, value) in varying.iter().zip(phi) {
                    values[*feature] = value;
                }
            }
        }

        Ok(Attribution {
            values,
            base_value: Some(self.expected_value),
        })
    }

    /// Features whose value differs from the explained row in some background row
    fn varying_features(&self, x: ArrayView1<'_, f64>) -> Vec<usize> {
        (0..x.len())
            .filter(|&j| {
                self.background
                    .column(j)
                    .iter()
                    .any(|&b| !is_close(x[j], b))
            })
            .collect()
    }

    /// Average model output for each coalition
    fn coalition_outputs(
        &self,
        x: ArrayView1<'_, f64>,
        varying: &[usize],
        masks: &[Vec<bool>],
    ) -> Result<Vec<f64>, ExplainError> {
        let n_bg = self.background.nrows();
        let mut synthetic = Array2::<f64>::zeros((masks.len() * n_bg, self.background.ncols()));

        for (k, mask) in masks.iter().enumerate() {
            for (i, bg_row) in self.background.rows().into_iter().enumerate() {
                let mut row = synthetic.row_mut(k * n_bg + i);
                row.assign(&bg_row);
                for (&feature, &on) in varying.iter().zip(mask) {
                    if on {
                        row[feature] = x[feature];
                    }
                }
            }
        }

        let outputs = (self.score)(synthetic.view())?;
        if outputs.len() != synthetic.nrows() {
            return Err(ExplainError::ShapeMismatch {
                expected: synthetic.nrows(),
                actual: outputs.len(),
            });
        }
        Ok(outputs
            .chunks(n_bg)
            .map(|chunk| chunk.iter().sum::<f64>() / n_bg as f64)
            .collect())
    }
}

fn is_close(a: f64, b: f64) -> bool {
    a == b || (a - b).abs() <= 1e-8 + 1e-5 * b.abs()
}

fn binomial(n: usize, k: usize) -> f64 {
    let k = k.min(n - k);
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

fn normalize(weights: &mut [f64]) {
    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        weights.iter_mut().for_each(|w| *w /= sum);
    }
}

/// Visit every `size`-subset of `0..n` in lexicographic order
fn for_each_combination(n: usize, size: usize, mut visit: impl FnMut(&[usize])) {
    if size == 0 || size > n {
        return;
    }
    let mut indices: Vec<usize> = (0..size).collect();
    loop {
        visit(&indices);
        let Some(i) = (0..size).rev().find(|&i| indices[i] != i + n - size) else {
            return;
        };
        indices[i] += 1;
        for j in i + 1..size {
            indices[j] = indices[j - 1] + 1;
        }
    }
}

/// Weighted coalition masks over the varying features
#[derive(Debug, Default)]
struct Coalitions {
    masks: Vec<Vec<bool>>,
    weights: Vec<f64>,
}

impl Coalitions {
    fn len(&self) -> usize {
        self.masks.len()
    }

    fn push(&mut self, mask: Vec<bool>, weight: f64) {
        self.masks.push(mask);
        self.weights.push(weight);
    }

    /// Enumerate whole subset sizes while the budget allows, then sample the rest
    fn build<R: Rng>(m: usize, nsamples: usize, rng: &mut R) -> Self {
        let num_subset_sizes = (m - 1).div_ceil(2);
        let num_paired = (m - 1) / 2;

        let mut size_weights: Vec<f64> = (1..=num_subset_sizes)
            .map(|s| (m - 1) as f64 / (s * (m - s)) as f64)
            .collect();
        size_weights
            .iter_mut()
            .take(num_paired)
            .for_each(|w| *w *= 2.0);
        normalize(&mut size_weights);

        let mut coalitions = Coalitions::default();
        let mut full_sizes = 0;
        let mut samples_left = nsamples as f64;
        let mut remaining = size_weights.clone();

        for size in 1..=num_subset_sizes {
            let paired = size <= num_paired;
            let n_subsets = binomial(m, size) * if paired { 2.0 } else { 1.0 };
            if samples_left * remaining[size - 1] / n_subsets < 1.0 - 1e-8 {
                break;
            }
            full_sizes += 1;
            samples_left -= n_subsets;
            if remaining[size - 1] < 1.0 {
                let scale = 1.0 - remaining[size - 1];
                remaining.iter_mut().for_each(|w| *w /= scale);
            }

            let mut weight = size_weights[size - 1] / binomial(m, size);
            if paired {
                weight /= 2.0;
            }
            for_each_combination(m, size, |subset| {
                let mut mask = vec![false; m];
                subset.iter().for_each(|&j| mask[j] = true);
                if paired {
                    coalitions.push(mask.iter().map(|b| !b).collect(), weight);
                }
                coalitions.push(mask, weight);
            });
        }

        let fixed = coalitions.len();
        if full_sizes < num_subset_sizes && samples_left >= 1.0 {
            let mut sample_weights = size_weights.clone();
            sample_weights
                .iter_mut()
                .take(num_paired)
                .for_each(|w| *w /= 2.0);
            let mut sample_weights = sample_weights.split_off(full_sizes);
            normalize(&mut sample_weights);

            if let Ok(size_dist) = WeightedIndex::new(&sample_weights) {
                let target = samples_left as usize;
                let max_draws = target * 4 + 64;
                let mut seen: HashMap<Vec<bool>, usize> = HashMap::new();
                let mut added = 0;
                let mut draws = 0;

                while added < target && draws < max_draws {
                    draws += 1;
                    let size = size_dist.sample(rng) + full_sizes + 1;
                    let mut mask = vec![false; m];
                    index::sample(rng, m, size)
                        .into_iter()
                        .for_each(|j| mask[j] = true);

                    let complement: Vec<bool> = mask.iter().map(|b| !b).collect();
                    if coalitions.add_sampled(mask, &mut seen) {
                        added += 1;
                    }
                    if added < target && size <= num_paired && coalitions.add_sampled(complement, &mut seen) {
                        added += 1;
                    }
                }

                let weight_left: f64 = size_weights[full_sizes..].iter().sum();
                let sampled_total: f64 = coalitions.weights[fixed..].iter().sum();
                if sampled_total > 0.0 {
                    coalitions.weights[fixed..]
                        .iter_mut()
                        .for_each(|w| *w *= weight_left / sampled_total);
                }
            }
        }

        coalitions
    }

    /// Add a sampled mask, or bump its weight if already drawn. Returns true if new.
    fn add_sampled(&mut self, mask: Vec<bool>, seen: &mut HashMap<Vec<bool>, usize>) -> bool {
        match seen.get(&mask) {
            Some(&idx) => {
                self.weights[idx] += 1.0;
                false
            }
            None => {
                seen.insert(mask.clone(), self.masks.len());
                self.push(mask, 1.0);
                true
            }
        }
    }
}

/// Kernel-weighted least squares with `sum(phi) = fx - base` eliminated
/// through the last varying feature.
fn solve_constrained(
    m: usize,
    coalitions: &Coalitions,
    ey: &[f64],
    base: f64,
    fx: f64,
) -> Result<Vec<f64>, ExplainError> {
    let last = m - 1;
    let total = fx - base;

    let mut normal = Array2::<f64>::zeros((last, last));
    let mut rhs = vec![0.0; last];
    let mut e = vec![0.0; last];

    for ((mask, &weight), &y) in coalitions.masks.iter().zip(&coalitions.weights).zip(ey) {
        let z_last = if mask[last] { 1.0 } else { 0.0 };
        let target = y - base - z_last * total;
        for j in 0..last {
            e[j] = (if mask[j] { 1.0 } else { 0.0 }) - z_last;
        }
        for a in 0..last {
            if e[a] == 0.0 {
                continue;
            }
            rhs[a] += weight * e[a] * target;
            for b in 0..last {
                normal[[a, b]] += weight * e[a] * e[b];
            }
        }
    }

    let w = match solve_linear(normal.clone(), rhs.clone()) {
        Some(w) => w,
        None => {
            let trace: f64 = normal.diag().sum();
            let ridge = 1e-8 * (trace / last as f64).max(1.0);
            let mut regularized = normal;
            regularized.diag_mut().iter_mut().for_each(|d| *d += ridge);
            debug!("Singular attribution system, retrying with ridge {:e}", ridge);
            solve_linear(regularized, rhs)
                .ok_or_else(|| ExplainError::Solve("normal equations are singular".into()))?
        }
    };

    let mut phi = w;
    let remainder = total - phi.iter().sum::<f64>();
    phi.push(remainder);
    Ok(phi)
}

/// Gaussian elimination with partial pivoting; `None` when singular
fn solve_linear(mut a: Array2<f64>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let tolerance = 1e-12 * scale.max(1e-300);

    for col in 0..n {
        let pivot = (col..n).max_by(|&i, &j| a[[i, col]].abs().total_cmp(&a[[j, col]].abs()))?;
        if a[[pivot, col]].abs() <= tolerance {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([col, k], [pivot, k]);
            }
            b.swap(col, pivot);
        }
        for row in col + 1..n {
            let factor = a[[row, col]] / a[[col, col]];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = (row + 1..n).map(|k| a[[row, k]] * x[k]).sum();
        x[row] = (b[row] - tail) / a[[row, row]];
    }
    Some(x)
}

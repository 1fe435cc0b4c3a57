//! Column Preprocessing
//!
//! Maps aligned engineered rows into the dense model-facing feature space.

use crate::InferenceError;
use feature_engine::{EngineeredRow, Value};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Transforms engineered rows into model input
pub trait Preprocessor: Send + Sync {
    /// Transform rows into a `rows x n_features_out` matrix
    fn transform(&self, rows: &[EngineeredRow]) -> Result<Array2<f64>, InferenceError>;

    /// Width of the model-facing feature space
    fn n_features_out(&self) -> usize;

    /// Names of the model-facing features, if the preprocessor exposes them
    fn feature_names_out(&self) -> Option<Vec<String>>;
}

/// What to do with a category not seen during fitting
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandleUnknown {
    /// Emit an all-zero block
    #[default]
    Ignore,
    /// Fail the transform
    Error,
}

/// Standardize numeric columns: `(x - mean) / scale`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub name: String,
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
    /// Replacement for null cells; nulls are rejected when unset
    #[serde(default)]
    pub fill_value: Option<f64>,
}

/// One-hot encode categorical columns
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    pub name: String,
    pub columns: Vec<String>,
    /// Known categories, one list per column
    pub categories: Vec<Vec<String>>,
    #[serde(default)]
    pub handle_unknown: HandleUnknown,
}

/// Copy numeric columns through unchanged
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passthrough {
    pub name: String,
    pub columns: Vec<String>,
}

/// A named transformer over a subset of columns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Transformer {
    StandardScaler(StandardScaler),
    OneHot(OneHotEncoder),
    Passthrough(Passthrough),
}

impl Transformer {
    pub fn name(&self) -> &str {
        match self {
            Transformer::StandardScaler(t) => &t.name,
            Transformer::OneHot(t) => &t.name,
            Transformer::Passthrough(t) => &t.name,
        }
    }

    pub fn columns(&self) -> &[String] {
        match self {
            Transformer::StandardScaler(t) => &t.columns,
            Transformer::OneHot(t) => &t.columns,
            Transformer::Passthrough(t) => &t.columns,
        }
    }

    /// Number of output features
    pub fn width(&self) -> usize {
        match self {
            Transformer::OneHot(t) => t.categories.iter().map(Vec::len).sum(),
            other => other.columns().len(),
        }
    }

    /// Output feature names, `<transformer>__<column>[_<category>]`
    pub fn feature_names(&self) -> Vec<String> {
        match self {
            Transformer::OneHot(t) => t
                .columns
                .iter()
                .zip(&t.categories)
                .flat_map(|(column, cats)| {
                    cats.iter()
                        .map(move |cat| format!("{}__{}_{}", t.name, column, cat))
                })
                .collect(),
            other => other
                .columns()
                .iter()
                .map(|column| format!("{}__{}", other.name(), column))
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), InferenceError> {
        let n = self.columns().len();
        let mismatch = |what: &str, len: usize| {
            InferenceError::InvalidPreprocessor(format!(
                "transformer '{}' has {} columns but {} {}",
                self.name(),
                n,
                len,
                what
            ))
        };
        match self {
            Transformer::StandardScaler(t) => {
                if t.mean.len() != n {
                    return Err(mismatch("means", t.mean.len()));
                }
                if t.scale.len() != n {
                    return Err(mismatch("scales", t.scale.len()));
                }
            }
            Transformer::OneHot(t) => {
                if t.categories.len() != n {
                    return Err(mismatch("category lists", t.categories.len()));
                }
            }
            Transformer::Passthrough(_) => {}
        }
        Ok(())
    }

    /// Write this transformer's block for one row into `out`
    fn write(&self, row: &EngineeredRow, out: &mut [f64]) -> Result<(), InferenceError> {
        match self {
            Transformer::StandardScaler(t) => {
                for (i, column) in t.columns.iter().enumerate() {
                    let x = numeric_cell(row, column, t.fill_value)?;
                    let scale = if t.scale[i] == 0.0 { 1.0 } else { t.scale[i] };
                    out[i] = (x - t.mean[i]) / scale;
                }
            }
            Transformer::Passthrough(t) => {
                for (i, column) in t.columns.iter().enumerate() {
                    out[i] = numeric_cell(row, column, None)?;
                }
            }
            Transformer::OneHot(t) => {
                let mut offset = 0;
                for (column, cats) in t.columns.iter().zip(&t.categories) {
                    let value = cell(row, column)?.category_text();
                    match cats.iter().position(|c| *c == value) {
                        Some(idx) => out[offset + idx] = 1.0,
                        None if t.handle_unknown == HandleUnknown::Error => {
                            return Err(InferenceError::UnknownCategory {
                                column: column.clone(),
                                value,
                            });
                        }
                        None => {}
                    }
                    offset += cats.len();
                }
            }
        }
        Ok(())
    }
}

fn cell<'a>(row: &'a EngineeredRow, column: &str) -> Result<&'a Value, InferenceError> {
    row.get(column)
        .ok_or_else(|| InferenceError::MissingColumn(column.to_string()))
}

fn numeric_cell(
    row: &EngineeredRow,
    column: &str,
    fill_value: Option<f64>,
) -> Result<f64, InferenceError> {
    match cell(row, column)? {
        Value::Number(n) => Ok(*n),
        Value::Null => fill_value.ok_or_else(|| InferenceError::NonNumeric {
            column: column.to_string(),
            value: "null".to_string(),
        }),
        other => Err(InferenceError::NonNumeric {
            column: column.to_string(),
            value: other.to_string(),
        }),
    }
}

/// Applies a list of transformers side by side and concatenates their output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    pub transformers: Vec<Transformer>,
    /// Whether output feature names are published to callers
    #[serde(default = "default_expose_feature_names")]
    pub expose_feature_names: bool,
}

fn default_expose_feature_names() -> bool {
    true
}

impl ColumnTransformer {
    pub fn new(transformers: Vec<Transformer>) -> Self {
        Self {
            transformers,
            expose_feature_names: true,
        }
    }

    /// Check internal consistency and that every input column is known
    pub fn validate(&self, known_columns: &[String]) -> Result<(), InferenceError> {
        let known: HashSet<&str> = known_columns.iter().map(String::as_str).collect();
        for transformer in &self.transformers {
            transformer.validate()?;
            if let Some(column) = transformer
                .columns()
                .iter()
                .find(|c| !known.contains(c.as_str()))
            {
                return Err(InferenceError::InvalidPreprocessor(format!(
                    "transformer '{}' reads column '{}' which is not a training column",
                    transformer.name(),
                    column
                )));
            }
        }
        Ok(())
    }
}

impl Preprocessor for ColumnTransformer {
    fn transform(&self, rows: &[EngineeredRow]) -> Result<Array2<f64>, InferenceError> {
        let width = self.n_features_out();
        let mut out = Array2::<f64>::zeros((rows.len(), width));

        for (r, row) in rows.iter().enumerate() {
            let mut target = out.row_mut(r);
            let Some(values) = target.as_slice_mut() else {
                return Err(InferenceError::InferenceFailed(
                    "output matrix is not contiguous".to_string(),
                ));
            };
            let mut offset = 0;
            for transformer in &self.transformers {
                let w = transformer.width();
                transformer.write(row, &mut values[offset..offset + w])?;
                offset += w;
            }
        }
        Ok(out)
    }

    fn n_features_out(&self) -> usize {
        self.transformers.iter().map(Transformer::width).sum()
    }

    fn feature_names_out(&self) -> Option<Vec<String>> {
        if !self.expose_feature_names {
            return None;
        }
        Some(
            self.transformers
                .iter()
                .flat_map(Transformer::feature_names)
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> ColumnTransformer {
        ColumnTransformer::new(vec![
            Transformer::StandardScaler(StandardScaler {
                name: "num".into(),
                columns: vec!["n_procedures".into(), "time_in_hospital".into()],
                mean: vec![1.0, 4.0],
                scale: vec![2.0, 0.0],
                fill_value: None,
            }),
            Transformer::OneHot(OneHotEncoder {
                name: "cat".into(),
                columns: vec!["age_group_simplified".into()],
                categories: vec![vec!["Middle-aged".into(), "Senior".into(), "Young".into()]],
                handle_unknown: HandleUnknown::Ignore,
            }),
        ])
    }

    fn row(procedures: f64, stay: f64, age: &str) -> EngineeredRow {
        let mut row = EngineeredRow::new();
        row.set("n_procedures", procedures);
        row.set("time_in_hospital", stay);
        row.set("age_group_simplified", age);
        row
    }

    #[test]
    fn test_transform_layout() {
        let x = transformer().transform(&[row(3.0, 6.0, "Senior")]).unwrap();
        assert_eq!(x.shape(), &[1, 5]);
        assert_eq!(x.row(0).to_vec(), vec![1.0, 2.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_ignored() {
        let x = transformer().transform(&[row(1.0, 4.0, "Other")]).unwrap();
        assert_eq!(x.row(0).to_vec(), vec![0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_unknown_category_rejected() {
        let mut t = transformer();
        if let Transformer::OneHot(enc) = &mut t.transformers[1] {
            enc.handle_unknown = HandleUnknown::Error;
        }
        let err = t.transform(&[row(1.0, 4.0, "Other")]).unwrap_err();
        assert!(matches!(err, InferenceError::UnknownCategory { .. }));
    }

    #[test]
    fn test_text_in_numeric_column() {
        let mut bad = row(1.0, 4.0, "Young");
        bad.set("n_procedures", "several");
        let err = transformer().transform(&[bad]).unwrap_err();
        assert!(err.to_string().contains("n_procedures"));
    }

    #[test]
    fn test_feature_names() {
        let names = transformer().feature_names_out().unwrap();
        assert_eq!(
            names,
            vec![
                "num__n_procedures",
                "num__time_in_hospital",
                "cat__age_group_simplified_Middle-aged",
                "cat__age_group_simplified_Senior",
                "cat__age_group_simplified_Young",
            ]
        );

        let mut hidden = transformer();
        hidden.expose_feature_names = false;
        assert!(hidden.feature_names_out().is_none());
    }

    #[test]
    fn test_validate_rejects_unknown_columns() {
        let t = transformer();
        let known = vec!["n_procedures".to_string(), "time_in_hospital".to_string()];
        assert!(t.validate(&known).is_err());
    }
}

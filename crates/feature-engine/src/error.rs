//! Feature Engine Error Types

use thiserror::Error;

/// Errors raised while validating the feature schema
#[derive(Debug, Clone, Error)]
pub enum FeatureError {
    /// Training column list is empty
    #[error("Training column set is empty")]
    EmptySchema,

    /// Same column listed more than once
    #[error("Duplicate training columns: {0}")]
    DuplicateColumns(String),
}

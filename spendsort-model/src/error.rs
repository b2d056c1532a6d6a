use std::io;
use std::path::PathBuf;

use spendsort_core::CoreError;

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// An input, label or parameter does not have the width the network was
    /// built with. Raised before any weight is touched.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },
    #[error("training split is empty ({rows} rows at train fraction {fraction})")]
    EmptyTrainingSet { rows: usize, fraction: f64 },
    #[error("invalid model config: {0}")]
    InvalidConfig(String),
    /// The weights carry no record of the metadata they were trained against.
    #[error("weights at {} have no metadata binding; retrain them", .0.display())]
    UnboundWeights(PathBuf),
    /// The weights were trained against a different vocabulary or category order.
    #[error("weights at {} were trained against different metadata; retrain them", .0.display())]
    StaleWeights(PathBuf),
    #[error("weights file has no parameter {0:?}")]
    MissingParameter(String),
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ModelError {
    pub(crate) fn shape(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        ModelError::ShapeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }
}

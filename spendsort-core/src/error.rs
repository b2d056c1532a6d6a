use std::io;

/// Errors raised while building, encoding or restoring training data.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The category is not part of the known category list.
    #[error("unknown category: {0:?}")]
    UnknownCategory(String),
    /// A network output index has no matching category.
    #[error("label index {index} out of range for {len} categories")]
    LabelOutOfRange { index: usize, len: usize },
    /// Training data must carry a category on every row.
    #[error("row {row} has no category; label it before building a dataset")]
    MissingCategory { row: usize },
    #[error("no labeled rows to build a dataset from")]
    EmptyCorpus,
    /// Mining produced no tokens, so there is no feature space to train on.
    #[error("vocabulary is empty; the corpus has no repeated tokens")]
    EmptyVocabulary,
    /// The persisted dataset disagrees with the metadata it was loaded with.
    #[error("dataset does not match metadata: {0}")]
    MetadataMismatch(String),
    /// A dataset violates one of its shape or one-hot invariants.
    #[error("invalid dataset: {0}")]
    InvalidDataset(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

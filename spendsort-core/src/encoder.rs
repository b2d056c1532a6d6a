//! Feature encoding: description -> bag-of-words presence vector, and
//! category <-> one-hot index.

use ndarray::Array1;

use crate::categories::CategorySet;
use crate::error::CoreError;
use crate::tokens::{normalize, split_description};
use crate::vocabulary::Vocabulary;

/// Encode a description as a 0/1 vector over `vocabulary`.
///
/// Every token is looked up (no trailing-token exclusion here). Presence only:
/// repeated tokens and token order do not change the result.
pub fn encode(description: &str, vocabulary: &Vocabulary) -> Array1<f32> {
    let mut features = Array1::zeros(vocabulary.len());
    for token in split_description(description) {
        if let Some(idx) = vocabulary.index_of(&normalize(token)) {
            features[idx] = 1.0;
        }
    }
    features
}

/// One-hot vector for `category`. Unknown categories are an error, never an
/// all-zero row.
pub fn category_to_label(category: &str, categories: &CategorySet) -> Result<Array1<f32>, CoreError> {
    let idx = categories
        .index_of(category)
        .ok_or_else(|| CoreError::UnknownCategory(category.to_string()))?;
    let mut label = Array1::zeros(categories.len());
    label[idx] = 1.0;
    Ok(label)
}

/// Category name at a network output position.
pub fn label_to_category(index: usize, categories: &CategorySet) -> Result<&str, CoreError> {
    categories.get(index).ok_or(CoreError::LabelOutOfRange {
        index,
        len: categories.len(),
    })
}

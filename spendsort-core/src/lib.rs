//! spendsort-core: vocabulary, feature encoding, dataset store and the labeling
//! state machine behind the transaction classifier

pub mod categories;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod labeler;
pub mod metadata;
pub mod vocabulary;

pub use categories::CategorySet;
pub use dataset::{Dataset, DatasetStore, RawRow};
pub use encoder::{category_to_label, encode, label_to_category};
pub use error::CoreError;
pub use labeler::{Labeler, Submission, DEFAULT_CATEGORY, HALT_SENTINEL};
pub use metadata::ModelMetadata;
pub use vocabulary::{Vocabulary, VocabularyBuilder};

/// Description tokenizer shared by vocabulary mining and encoding
pub mod tokens {
    /// Delimiters that separate tokens inside a transaction description.
    pub const DELIMITERS: [char; 3] = [' ', '/', '-'];

    /// Split a description on space, slash and hyphen.
    ///
    /// Consecutive delimiters yield empty tokens; callers filter them.
    pub fn split_description(description: &str) -> impl Iterator<Item = &str> {
        description.split(DELIMITERS)
    }

    /// Case-normalized form used for vocabulary entries and lookups.
    pub fn normalize(token: &str) -> String {
        token.to_uppercase()
    }

    /// True when the token is only digits once `#` characters are removed
    /// (reference numbers like `#1234`).
    pub fn is_numeric_token(token: &str) -> bool {
        let mut digits = token.chars().filter(|c| *c != '#').peekable();
        digits.peek().is_some() && digits.all(|c| c.is_numeric())
    }

}

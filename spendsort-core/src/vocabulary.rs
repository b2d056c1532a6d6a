//! Vocabulary mining: the ordered token basis of the feature space.
//!
//! Mining rules (per description):
//! 1) split on space / slash / hyphen
//! 2) skip the trailing tokens (statement lines usually end in a reference
//!    number and a date)
//! 3) keep tokens of at least `min_token_len` chars that are not pure numbers
//! 4) keep tokens seen at least `min_count` times across the corpus
//!
//! Output order is first-seen order, so mining is deterministic for a given
//! input order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::tokens::{is_numeric_token, normalize, split_description};

/// Ordered list of unique, upper-cased tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Vocabulary {
    tokens: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Build from an already-mined token list. Tokens are normalized and
    /// duplicates after the first occurrence are dropped.
    pub fn from_tokens<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut vocab = Self::default();
        for token in tokens {
            let token = normalize(token.as_ref());
            if !vocab.index.contains_key(&token) {
                vocab.index.insert(token.clone(), vocab.tokens.len());
                vocab.tokens.push(token);
            }
        }
        vocab
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Position of an already-normalized token.
    pub fn index_of(&self, token: &str) -> Option<usize> {
        self.index.get(token).copied()
    }
}

impl From<Vec<String>> for Vocabulary {
    fn from(tokens: Vec<String>) -> Self {
        Self::from_tokens(tokens)
    }
}

impl From<Vocabulary> for Vec<String> {
    fn from(vocab: Vocabulary) -> Self {
        vocab.tokens
    }
}

/// Mines a [`Vocabulary`] from a corpus of descriptions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyBuilder {
    /// Number of trailing tokens skipped in each description.
    pub exclude_trailing: usize,
    pub min_token_len: usize,
    /// Minimum corpus-wide count for a token to be kept.
    pub min_count: usize,
}

impl Default for VocabularyBuilder {
    fn default() -> Self {
        Self {
            exclude_trailing: 2,
            min_token_len: 2,
            min_count: 2,
        }
    }
}

impl VocabularyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exclude_trailing(mut self, n: usize) -> Self {
        self.exclude_trailing = n;
        self
    }

    pub fn min_token_len(mut self, n: usize) -> Self {
        self.min_token_len = n;
        self
    }

    pub fn min_count(mut self, n: usize) -> Self {
        self.min_count = n;
        self
    }

    fn is_candidate(&self, token: &str) -> bool {
        !token.is_empty() && token.chars().count() >= self.min_token_len && !is_numeric_token(token)
    }

    pub fn build<I, S>(&self, descriptions: I) -> Vocabulary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut counts: HashMap<String, usize> = HashMap::new();

        for description in descriptions {
            let tokens: Vec<&str> = split_description(description.as_ref()).collect();
            let keep = tokens.len().saturating_sub(self.exclude_trailing);

            for token in &tokens[..keep] {
                if !self.is_candidate(token) {
                    continue;
                }
                let token = normalize(token);
                let count = counts.entry(token.clone()).or_insert(0);
                if *count == 0 {
                    order.push(token);
                }
                *count += 1;
            }
        }

        let min_count = self.min_count.max(1);
        let vocab = Vocabulary::from_tokens(
            order
                .into_iter()
                .filter(|t| counts.get(t).copied().unwrap_or(0) >= min_count),
        );
        log::debug!(
            "mined {} vocabulary tokens from {} candidates",
            vocab.len(),
            counts.len()
        );
        vocab
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn whole_string_builder() -> VocabularyBuilder {
        VocabularyBuilder::new().exclude_trailing(0).min_token_len(1)
    }

    #[test]
    fn test_whole_string_corpus() {
        let vocab = whole_string_builder().build(["a", "b", "c", "a", "b"]);
        assert_eq!(vocab.tokens(), &["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn test_trailing_tokens_are_not_mined() {
        // "REF" and the date only ever appear in the last two positions.
        let corpus = [
            "TIM HORTONS REF 0412",
            "TIM HORTONS REF 0413",
            "SHELL GAS REF 0414",
        ];
        let vocab = VocabularyBuilder::new().build(corpus);
        assert_eq!(vocab.tokens(), &["TIM".to_string(), "HORTONS".to_string()]);
    }

    #[test]
    fn test_numeric_and_short_tokens_dropped() {
        let corpus = [
            "X #123 COSTCO WHOLESALE a b",
            "X #123 COSTCO WHOLESALE c d",
            "X 555 COSTCO e f",
            "X 555 COSTCO g h",
        ];
        let vocab = VocabularyBuilder::new().build(corpus);
        assert_eq!(
            vocab.tokens(),
            &["COSTCO".to_string(), "WHOLESALE".to_string()]
        );
    }

    #[test]
    fn test_case_is_normalized_before_counting() {
        let vocab = whole_string_builder().build(["Uber", "UBER", "uber eats"]);
        assert_eq!(vocab.tokens(), &["UBER".to_string()]);
    }

    #[test]
    fn test_no_duplicates_and_no_singletons() {
        let corpus = [
            "AMAZON MKTP CA/PAYMENT x y",
            "AMAZON PRIME-VIDEO x y",
            "NETFLIX.COM MONTHLY x y",
            "AMAZON MKTP CA x y",
            "SPOTIFY P0A1 x y",
        ];
        let vocab = VocabularyBuilder::new().build(corpus);
        let unique: HashSet<&String> = vocab.tokens().iter().collect();
        assert_eq!(unique.len(), vocab.len());
        assert!(vocab.index_of("NETFLIX.COM").is_none());
        assert!(vocab.index_of("SPOTIFY").is_none());
        assert_eq!(vocab.index_of("AMAZON"), Some(0));
        assert_eq!(vocab.index_of("MKTP"), Some(1));
        assert_eq!(vocab.index_of("CA"), Some(2));
    }

    #[test]
    fn test_empty_corpus() {
        let vocab = VocabularyBuilder::new().build(Vec::<String>::new());
        assert!(vocab.is_empty());
    }

    #[test]
    fn test_from_tokens_dedupes() {
        let vocab = Vocabulary::from_tokens(["rent", "RENT", "Hydro"]);
        assert_eq!(vocab.tokens(), &["RENT".to_string(), "HYDRO".to_string()]);
    }
}

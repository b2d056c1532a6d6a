//! Labeling state machine.
//!
//! Walks the unlabeled rows in order and turns one line of user input into a
//! category per row:
//! - empty input  -> `DEFAULT_CATEGORY`
//! - `HALT_SENTINEL` -> stop; this row and every later one stay unlabeled
//! - anything else -> used verbatim, and appended to the known categories
//!
//! The UI (terminal prompt, GUI, batch script) is an adapter that only calls
//! `current`, `submit`, `is_done` and `known_categories`.

use crate::categories::CategorySet;
use crate::dataset::RawRow;

pub const DEFAULT_CATEGORY: &str = "Other";
pub const HALT_SENTINEL: &str = "q";

/// Result of feeding one input line to the labeler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Row `row` (index into the original rows) received `category`.
    Labeled { row: usize, category: String },
    /// The sentinel stopped the loop.
    Halted,
    /// Nothing left to label; input ignored.
    Finished,
}

#[derive(Debug, Clone)]
pub struct Labeler {
    rows: Vec<RawRow>,
    /// Indices of rows that still need a label, in row order.
    pending: Vec<usize>,
    cursor: usize,
    halted: bool,
    categories: CategorySet,
}

impl Labeler {
    /// Start with no known categories.
    pub fn new(rows: Vec<RawRow>) -> Self {
        Self::with_categories(rows, CategorySet::new())
    }

    /// Start with an existing category list (e.g. from saved metadata) so
    /// autocomplete offers it from the first row.
    pub fn with_categories(rows: Vec<RawRow>, categories: CategorySet) -> Self {
        let pending = rows
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.is_labeled())
            .map(|(i, _)| i)
            .collect();
        Self {
            rows,
            pending,
            cursor: 0,
            halted: false,
            categories,
        }
    }

    /// Index (into the original rows) of the row awaiting input.
    pub fn current_index(&self) -> Option<usize> {
        if self.halted {
            return None;
        }
        self.pending.get(self.cursor).copied()
    }

    /// Description of the row awaiting input.
    pub fn current(&self) -> Option<&str> {
        self.current_index().map(|i| self.rows[i].description())
    }

    pub fn is_done(&self) -> bool {
        self.current_index().is_none()
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Rows labeled so far / rows that needed a label.
    pub fn progress(&self) -> (usize, usize) {
        (self.cursor, self.pending.len())
    }

    pub fn known_categories(&self) -> &CategorySet {
        &self.categories
    }

    pub fn suggestions(&self, prefix: &str) -> Vec<&str> {
        self.categories.suggestions(prefix)
    }

    pub fn submit(&mut self, input: &str) -> Submission {
        let Some(row) = self.current_index() else {
            return Submission::Finished;
        };

        if input == HALT_SENTINEL {
            self.halted = true;
            log::info!(
                "labeling halted with {} of {} rows labeled",
                self.cursor,
                self.pending.len()
            );
            return Submission::Halted;
        }

        let category = if input.is_empty() {
            DEFAULT_CATEGORY.to_string()
        } else {
            input.to_string()
        };

        if self.categories.insert(category.clone()) {
            log::debug!("new category: {}", category);
        }
        let prior = std::mem::replace(&mut self.rows[row], RawRow::unlabeled(""));
        self.rows[row] = prior.with_category(category.clone());
        self.cursor += 1;

        Submission::Labeled { row, category }
    }

    pub fn rows(&self) -> &[RawRow] {
        &self.rows
    }

    /// All rows, labeled or not, in their original order.
    pub fn into_rows(self) -> Vec<RawRow> {
        self.rows
    }

    /// Rows that carry a category, ready for the dataset store.
    pub fn into_labeled_rows(self) -> Vec<RawRow> {
        self.rows.into_iter().filter(RawRow::is_labeled).collect()
    }

    pub fn into_parts(self) -> (Vec<RawRow>, CategorySet) {
        (self.rows, self.categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(descriptions: &[&str]) -> Vec<RawRow> {
        descriptions.iter().map(|d| RawRow::unlabeled(*d)).collect()
    }

    #[test]
    fn test_empty_then_sentinel_halts() {
        let mut labeler = Labeler::new(rows(&["a", "b", "c"]));
        let mut results = Vec::new();
        for input in ["", "q", "X"] {
            if labeler.is_done() {
                break;
            }
            results.push(labeler.submit(input));
        }

        assert_eq!(
            results,
            vec![
                Submission::Labeled {
                    row: 0,
                    category: "Other".to_string()
                },
                Submission::Halted,
            ]
        );
        assert!(labeler.is_done());
        assert!(labeler.is_halted());

        let out = labeler.into_rows();
        assert_eq!(out[0], RawRow::labeled("a", "Other"));
        assert_eq!(out[1], RawRow::unlabeled("b"));
        assert_eq!(out[2], RawRow::unlabeled("c"));
    }

    #[test]
    fn test_submit_after_halt_is_ignored() {
        let mut labeler = Labeler::new(rows(&["a", "b"]));
        assert_eq!(labeler.submit("q"), Submission::Halted);
        assert_eq!(labeler.submit("Food"), Submission::Finished);
        assert!(labeler.known_categories().is_empty());
        assert!(labeler.into_labeled_rows().is_empty());
    }

    #[test]
    fn test_new_categories_are_appended_once() {
        let mut labeler = Labeler::new(rows(&["a", "b", "c", "d"]));
        labeler.submit("Food");
        labeler.submit("Rent");
        labeler.submit("Food");
        labeler.submit("");
        assert!(labeler.is_done());
        assert!(!labeler.is_halted());
        assert_eq!(
            labeler.known_categories().names(),
            &["Food".to_string(), "Rent".to_string(), "Other".to_string()]
        );
        assert_eq!(labeler.progress(), (4, 4));
    }

    #[test]
    fn test_skips_already_labeled_rows() {
        let input = vec![
            RawRow::labeled("SHELL 01", "Gas"),
            RawRow::unlabeled("COSTCO 02"),
            RawRow::labeled("ESSO 03", "Gas"),
            RawRow::unlabeled("LOBLAWS 04"),
        ];
        let mut labeler = Labeler::with_categories(input, CategorySet::from_names(["Gas"]));
        assert_eq!(labeler.current(), Some("COSTCO 02"));
        assert_eq!(labeler.current_index(), Some(1));
        labeler.submit("Groceries");
        assert_eq!(labeler.current(), Some("LOBLAWS 04"));
        labeler.submit("Gro");

        let (out, cats) = labeler.into_parts();
        assert_eq!(out[3], RawRow::labeled("LOBLAWS 04", "Gro"));
        assert_eq!(cats.len(), 3);
    }

    #[test]
    fn test_suggestions_follow_known_categories() {
        let mut labeler = Labeler::new(rows(&["a", "b", "c"]));
        assert!(labeler.suggestions("g").is_empty());
        labeler.submit("Groceries");
        labeler.submit("Gas");
        assert_eq!(labeler.suggestions("g"), vec!["Groceries", "Gas"]);
        assert_eq!(labeler.suggestions("GA"), vec!["Gas"]);
    }

    #[test]
    fn test_instances_do_not_share_categories() {
        let mut first = Labeler::new(rows(&["a"]));
        first.submit("Travel");
        let second = Labeler::new(rows(&["b"]));
        assert!(second.known_categories().is_empty());
    }
}

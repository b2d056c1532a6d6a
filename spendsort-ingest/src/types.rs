use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use spendsort_core::RawRow;

/// One statement line, bank-agnostic. Only the description is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementTransaction {
    pub date: Option<NaiveDate>,
    pub description: String,
    /// Positive means spend, negative means credit/refund.
    pub amount: Option<f64>,
    pub category: Option<String>,
}

impl StatementTransaction {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            date: None,
            description: description.into(),
            amount: None,
            category: None,
        }
    }

    /// Row for the dataset store; an empty category counts as unlabeled.
    pub fn to_raw_row(&self) -> RawRow {
        match self.category.as_deref().map(str::trim) {
            Some(c) if !c.is_empty() => RawRow::labeled(&self.description, c),
            _ => RawRow::unlabeled(&self.description),
        }
    }

    /// Amount shown in the labeling prompt, e.g. `12.50`.
    pub fn amount_display(&self) -> String {
        match self.amount {
            Some(a) => format!("{:.2}", a),
            None => "?".to_string(),
        }
    }
}

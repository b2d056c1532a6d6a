//! spendsort-ingest: bank statement CSV in, labeled statement CSV out.

pub mod statement_csv;
pub mod types;

pub use statement_csv::{parse_statement_csv, read_statement, write_labeled_csv};
pub use types::StatementTransaction;

//! Read bank statement CSV exports and write them back with a `Class` column.
//!
//! Only a description column is required: `Description`, or `Transaction
//! Details` in Simplii exports. Recognised optional columns (headers matched
//! case-insensitively, surrounding whitespace ignored):
//!
//!   Date | Transaction Date                -> date
//!   Transaction Amount | Amount | Funds Out -> amount ($ and thousands separators allowed)
//!   Class | Category               -> category (empty cell = unlabeled)

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::io;
use std::path::Path;

use crate::types::StatementTransaction;

const DESCRIPTION_HEADERS: &[&str] = &["description", "transaction details"];
const AMOUNT_HEADERS: &[&str] = &["transaction amount", "amount", "funds out"];
const DATE_HEADERS: &[&str] = &["date", "transaction date"];
const CATEGORY_HEADERS: &[&str] = &["class", "category"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%m/%d/%y", "%d %b %Y"];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy)]
struct Columns {
    description: usize,
    amount: Option<usize>,
    date: Option<usize>,
    category: Option<usize>,
}

impl Columns {
    fn resolve(headers: &csv::StringRecord) -> Result<Self> {
        let find = |names: &[&str]| {
            names.iter().find_map(|name| {
                headers
                    .iter()
                    .position(|h| h.trim().eq_ignore_ascii_case(name))
            })
        };
        let Some(description) = find(DESCRIPTION_HEADERS) else {
            bail!("statement has no Description column (headers: {:?})", headers);
        };
        Ok(Self {
            description,
            amount: find(AMOUNT_HEADERS),
            date: find(DATE_HEADERS),
            category: find(CATEGORY_HEADERS),
        })
    }
}

/// Parse a statement CSV file.
pub fn parse_statement_csv(path: impl AsRef<Path>) -> Result<Vec<StatementTransaction>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let txns = read_statement(file).with_context(|| format!("parsing {}", path.display()))?;
    log::info!("read {} transactions from {}", txns.len(), path.display());
    Ok(txns)
}

/// Parse statement CSV from any reader.
pub fn read_statement<R: io::Read>(reader: R) -> Result<Vec<StatementTransaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::resolve(rdr.headers()?)?;
    let mut txns = Vec::new();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let description = record.get(columns.description).unwrap_or("").trim();
        if description.is_empty() {
            log::debug!("skipping record {}: empty description", line + 1);
            continue;
        }

        let amount = columns
            .amount
            .and_then(|i| record.get(i))
            .and_then(|raw| {
                let parsed = parse_amount(raw);
                if parsed.is_none() && !raw.trim().is_empty() {
                    log::warn!("record {}: unreadable amount {:?}", line + 1, raw);
                }
                parsed
            });
        let date = columns.date.and_then(|i| record.get(i)).and_then(parse_date);
        let category = columns
            .category
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        txns.push(StatementTransaction {
            date,
            description: description.to_string(),
            amount,
            category,
        });
    }

    Ok(txns)
}

/// `"$1,234.50"` -> 1234.5, `"-$14.05"` -> -14.05, `"(3.00)"` -> -3.0.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let cleaned: String = s.chars().filter(|c| *c != '$' && *c != ',' && !c.is_whitespace()).collect();
    let value: f64 = cleaned.parse().ok()?;
    Some(if negative { -value } else { value })
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Write transactions as `Date,Description,Transaction Amount,Class`.
/// Unlabeled rows get an empty `Class` cell so they can be labeled later.
pub fn write_labeled_csv(path: impl AsRef<Path>, txns: &[StatementTransaction]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    wtr.write_record(["Date", "Description", "Transaction Amount", "Class"])?;
    for txn in txns {
        let date = txn.date.map(|d| d.format("%Y-%m-%d").to_string()).unwrap_or_default();
        let amount = txn.amount.map(|a| format!("{:.2}", a)).unwrap_or_default();
        let class = txn.category.as_deref().unwrap_or("");
        wtr.write_record([date.as_str(), txn.description.as_str(), amount.as_str(), class])?;
    }
    wtr.flush().with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {} transactions to {}", txns.len(), path.display());
    Ok(())
}

//! Terminal front end for the labeling state machine.
//!
//! Prompt per row:  Classify "<description>" - $<amount> as:
//! Typing `?<prefix>` lists matching known categories and asks again.
//! End of input behaves like the halt sentinel. Only the line ending is
//! stripped; everything else reaches the labeler as typed.

use anyhow::Result;
use std::io::{BufRead, Write};

use spendsort_core::{Labeler, Submission, HALT_SENTINEL};
use spendsort_ingest::StatementTransaction;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    pub labeled: usize,
    pub halted: bool,
}

fn prompt<W: Write>(out: &mut W, txn: Option<&StatementTransaction>, description: &str) -> Result<()> {
    let amount = txn.map(|t| t.amount_display()).unwrap_or_else(|| "?".to_string());
    write!(out, "Classify \"{}\" - ${} as: ", description, amount)?;
    out.flush()?;
    Ok(())
}

/// Drive `labeler` from `input` until it is done. `txns[i]` supplies the
/// amount shown for row `i`.
pub fn run_session<R: BufRead, W: Write>(
    labeler: &mut Labeler,
    txns: &[StatementTransaction],
    mut input: R,
    mut out: W,
) -> Result<SessionSummary> {
    let (done, total) = labeler.progress();
    if total > done {
        writeln!(
            out,
            "{} rows to label. Enter a category, blank for {}, {} to stop, ?<prefix> for suggestions.",
            total - done,
            spendsort_core::DEFAULT_CATEGORY,
            HALT_SENTINEL
        )?;
    }

    let mut labeled = 0;
    while let (Some(row), Some(description)) = (labeler.current_index(), labeler.current()) {
        prompt(&mut out, txns.get(row), description)?;

        let mut line = String::new();
        let line = if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            HALT_SENTINEL.to_string()
        } else {
            line.trim_end_matches(['\r', '\n']).to_string()
        };

        if let Some(prefix) = line.strip_prefix('?') {
            let matches = labeler.suggestions(prefix.trim());
            if matches.is_empty() {
                writeln!(out, "  (no known categories match {:?})", prefix.trim())?;
            } else {
                writeln!(out, "  {}", matches.join(" | "))?;
            }
            continue;
        }

        match labeler.submit(&line) {
            Submission::Labeled { .. } => labeled += 1,
            Submission::Halted => {
                let (done, total) = labeler.progress();
                writeln!(out, "Stopped; {} of {} rows labeled.", done, total)?;
            }
            Submission::Finished => break,
        }
    }

    Ok(SessionSummary {
        labeled,
        halted: labeler.is_halted(),
    })
}

/// Copy the labeler's categories back onto the statement rows.
pub fn apply_labels(txns: &mut [StatementTransaction], labeler: &Labeler) {
    for (txn, row) in txns.iter_mut().zip(labeler.rows()) {
        if let Some(category) = row.category() {
            txn.category = Some(category.to_string());
        }
    }
}

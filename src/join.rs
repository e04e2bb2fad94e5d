// join.rs
// Bookkeeping for the pipeline's joins so rows lost to a key mismatch are
// reported instead of disappearing silently.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{PanelError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JoinKind {
    Inner,
    Left,
    Right,
}

impl fmt::Display for JoinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JoinKind::Inner => "inner",
            JoinKind::Left => "left",
            JoinKind::Right => "right",
        };
        f.write_str(name)
    }
}

/// Row counts for one join, with the rows of each side that found no partner.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JoinReport {
    pub name: String,
    pub kind: JoinKind,
    pub left_rows: usize,
    pub right_rows: usize,
    pub output_rows: usize,
    pub left_unmatched: usize,
    pub right_unmatched: usize,
}

impl JoinReport {
    /// Unmatched rows that the join kind discards.
    pub fn dropped(&self) -> usize {
        match self.kind {
            JoinKind::Inner => self.left_unmatched + self.right_unmatched,
            JoinKind::Left => self.right_unmatched,
            JoinKind::Right => self.left_unmatched,
        }
    }

    /// Unmatched rows that the join keeps, padded with missing values.
    pub fn padded(&self) -> usize {
        match self.kind {
            JoinKind::Inner => 0,
            JoinKind::Left => self.left_unmatched,
            JoinKind::Right => self.right_unmatched,
        }
    }

    /// Logs the counts; in strict mode any dropped row is an error.
    pub fn settle(self, strict: bool) -> Result<Self> {
        info!(
            join = %self.name,
            kind = %self.kind,
            left = self.left_rows,
            right = self.right_rows,
            output = self.output_rows,
            "joined"
        );

        if self.padded() > 0 {
            warn!(join = %self.name, rows = self.padded(), "rows kept without a match");
        }

        let dropped = self.dropped();
        if dropped > 0 {
            warn!(join = %self.name, rows = dropped, "rows dropped without a match");
            if strict {
                return Err(PanelError::JoinMismatch {
                    join: self.name,
                    unmatched: dropped,
                });
            }
        }

        Ok(self)
    }
}

/// Every join report of one pipeline run, and whether a dropped row is fatal.
#[derive(Debug, Default)]
pub struct JoinLog {
    strict: bool,
    reports: Vec<JoinReport>,
}

impl JoinLog {
    pub fn new(strict: bool) -> Self {
        Self {
            strict,
            reports: Vec::new(),
        }
    }

    pub fn record(&mut self, report: JoinReport) -> Result<()> {
        let report = report.settle(self.strict)?;
        self.reports.push(report);
        Ok(())
    }

    pub fn reports(&self) -> &[JoinReport] {
        &self.reports
    }

    pub fn into_reports(self) -> Vec<JoinReport> {
        self.reports
    }
}

/// Positions of the rows sharing each key, in row order.
pub fn index_by<T, K, F>(rows: &[T], key: F) -> HashMap<K, Vec<usize>>
where
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut index: HashMap<K, Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        index.entry(key(row)).or_default().push(i);
    }
    index
}

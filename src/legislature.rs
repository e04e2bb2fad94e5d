// legislature.rs
// Partisan control of state legislatures, one column per year in the raw file.

use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::codes::{StateCode, join_codes};
use crate::error::Result;
use crate::join::JoinLog;
use crate::table::{RawTable, strip_punctuation};

/// Stands in for missing control values. Nebraska's unicameral, nonpartisan
/// legislature never reports a chamber split.
pub const DEFAULT_CONTROL: &str = "Split";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LegislatureRow {
    pub state: String,
    pub code: String,
    pub year: i32,
    pub pol: String,
}

#[derive(Debug, Clone)]
struct ControlRow {
    state: String,
    cells: Vec<Option<String>>,
}

/// Cleans the legislature file into one row per state and year.
///
/// Cells lose surrounding punctuation (footnote markers) and "Divided" reads
/// "Split". Rows are joined to the code table; every cell still empty after
/// that becomes "Split".
#[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_clean_pol(
    path: &Path,
    codes: &[StateCode],
    joins: &mut JoinLog,
) -> Result<Vec<LegislatureRow>> {
    let mut raw = RawTable::read(path, 0)?;
    raw.normalize_columns(str::to_lowercase);
    let state_col = raw.column("state")?;

    let value_cols: Vec<usize> = (0..raw.columns.len()).filter(|&i| i != state_col).collect();

    let rows: Vec<ControlRow> = raw
        .rows
        .iter()
        .filter_map(|row| {
            let state = row[state_col].clone()?;
            let cells = value_cols
                .iter()
                .map(|&i| {
                    row[i]
                        .as_deref()
                        .map(|cell| strip_punctuation(cell).replace("Divided", "Split"))
                })
                .collect();
            Some(ControlRow { state, cells })
        })
        .collect();

    let coded = join_codes("legislature codes", codes, &rows, |row| row.state.as_str(), joins)?;

    let mut long = Vec::new();
    for (pos, &col) in value_cols.iter().enumerate() {
        let name = &raw.columns[col];
        let Ok(year) = name.trim().parse::<i32>() else {
            warn!(column = %name, "skipping non-year column");
            continue;
        };

        for (code, row) in &coded {
            let pol = row.cells[pos]
                .clone()
                .unwrap_or_else(|| DEFAULT_CONTROL.to_string());
            long.push(LegislatureRow {
                state: row.state.clone(),
                code: code.clone(),
                year,
                pol,
            });
        }
    }

    info!(rows = long.len(), "built legislature table");
    Ok(long)
}

// population.rs
// Census intercensal estimates: one wide file per decade, merged into a long
// state-year population table.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::codes::{StateCode, join_codes};
use crate::error::{PanelError, Result};
use crate::join::{JoinKind, JoinLog, JoinReport, index_by};
use crate::table::{RawTable, parse_number, strip_punctuation};

/// Census files carry three title/notes lines above the header.
const CENSUS_PREAMBLE: usize = 3;

/// One cleaned census file: one row per state, one column per year.
///
/// Values stay as written until the table is reshaped, because columns that
/// are not years get dropped before anything is parsed. `sources[i]` is the
/// file `columns[i]` was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct WidePopulation {
    pub columns: Vec<String>,
    pub sources: Vec<PathBuf>,
    pub rows: Vec<WideRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WideRow {
    pub state: String,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopulationRow {
    pub state: String,
    pub code: String,
    pub year: i32,
    pub pop: f64,
}

/// Cleans one census estimates file.
///
/// Rows with any empty cell and columns with a hyphen in the name (ranges
/// such as "2010-2019") are dropped. State rows are the ones whose first cell
/// begins with '.'; regional aggregates lack the marker.
///
/// # Arguments
/// * `path` - A census CSV with three lines above the header row
///
/// # Returns
/// * `WidePopulation` with the state column split off and the year columns
///   still holding the raw text
#[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_clean_pop(path: &Path) -> Result<WidePopulation> {
    let mut raw = RawTable::read(path, CENSUS_PREAMBLE)?;
    raw.normalize_columns(str::to_lowercase);
    raw.drop_incomplete_rows();
    raw.retain_columns(|name| !name.contains('-'));

    let Some(first) = raw.columns.first() else {
        return Err(raw.schema_error("no columns left after dropping ranges"));
    };
    if !(first.is_empty() || first.contains("unnamed") || first == "geography") {
        return Err(raw.schema_error(format!(
            "first column `{first}` is neither unnamed nor `geography`"
        )));
    }

    let total = raw.rows.len();
    let rows: Vec<WideRow> = raw
        .rows
        .iter()
        .filter_map(|row| {
            let cells: Vec<String> = row.iter().flatten().cloned().collect();
            let (state, values) = cells.split_first()?;
            state.starts_with('.').then(|| WideRow {
                state: state.clone(),
                values: values.to_vec(),
            })
        })
        .collect();

    if rows.is_empty() {
        return Err(raw.schema_error("no state rows (first cell starting with '.') found"));
    }
    debug!(states = rows.len(), aggregates = total - rows.len(), "kept state rows");

    let columns = raw.columns[1..].to_vec();
    Ok(WidePopulation {
        sources: vec![path.to_path_buf(); columns.len()],
        columns,
        rows,
    })
}

/// Inner join of two cleaned census files on the state name. Year columns
/// present in both get `_x`/`_y` suffixes, which the length filter in
/// `build_pop` later discards.
pub fn merge_wide(
    left: WidePopulation,
    right: WidePopulation,
    joins: &mut JoinLog,
) -> Result<WidePopulation> {
    let suffixed = |columns: &[String], other: &[String], suffix: &str| -> Vec<String> {
        columns
            .iter()
            .map(|c| {
                if other.contains(c) {
                    format!("{c}{suffix}")
                } else {
                    c.clone()
                }
            })
            .collect()
    };
    let mut columns = suffixed(&left.columns, &right.columns, "_x");
    columns.extend(suffixed(&right.columns, &left.columns, "_y"));
    let mut sources = left.sources.clone();
    sources.extend(right.sources.iter().cloned());

    let by_state = index_by(&right.rows, |row| row.state.clone());
    let mut rows = Vec::new();
    let mut left_unmatched = 0;
    for row in &left.rows {
        let Some(positions) = by_state.get(&row.state) else {
            left_unmatched += 1;
            continue;
        };
        for &i in positions {
            let mut values = row.values.clone();
            values.extend(right.rows[i].values.iter().cloned());
            rows.push(WideRow {
                state: row.state.clone(),
                values,
            });
        }
    }

    let right_unmatched = right
        .rows
        .iter()
        .filter(|r| !left.rows.iter().any(|l| l.state == r.state))
        .count();

    joins.record(JoinReport {
        name: "population eras".to_string(),
        kind: JoinKind::Inner,
        left_rows: left.rows.len(),
        right_rows: right.rows.len(),
        output_rows: rows.len(),
        left_unmatched,
        right_unmatched,
    })?;

    Ok(WidePopulation {
        columns,
        sources,
        rows,
    })
}

/// Merges the census files, attaches state codes, and reshapes to one row
/// per state and year.
///
/// States or years missing from any era are dropped. Columns whose names are
/// longer than four characters are not years and are discarded. Output runs
/// year by year, states in code-table order within each year.
///
/// # Arguments
/// * `files` - Census files in era order, at least one
/// * `codes` - The state code table
/// * `joins` - Collects a report for each merge
///
/// # Returns
/// * `Vec<PopulationRow>`, one per state and year
#[tracing::instrument(level = "info", skip_all)]
pub fn build_pop(
    files: &[PathBuf],
    codes: &[StateCode],
    joins: &mut JoinLog,
) -> Result<Vec<PopulationRow>> {
    let Some((first, rest)) = files.split_first() else {
        return Err(PanelError::schema("", "no population files configured"));
    };

    let mut wide = load_clean_pop(first)?;
    for path in rest {
        wide = merge_wide(wide, load_clean_pop(path)?, joins)?;
    }

    for row in &mut wide.rows {
        row.state = strip_punctuation(&row.state).to_string();
    }
    let coded = join_codes("population codes", codes, &wide.rows, |row| row.state.as_str(), joins)?;

    let mut long = Vec::new();
    for (col, name) in wide.columns.iter().enumerate() {
        let name = name.trim();
        if name.len() > 4 {
            continue;
        }
        let origin = &wide.sources[col];
        let year: i32 = name
            .parse()
            .map_err(|_| PanelError::schema(origin, format!("column `{name}` is not a year")))?;

        for (code, row) in &coded {
            let raw = &row.values[col];
            let pop = parse_number(raw).ok_or_else(|| {
                PanelError::schema(
                    origin,
                    format!("population `{raw}` for {} in {year} is not a number", row.state),
                )
            })?;
            long.push(PopulationRow {
                state: row.state.clone(),
                code: code.clone(),
                year,
                pop,
            });
        }
    }

    info!(rows = long.len(), "built population table");
    Ok(long)
}

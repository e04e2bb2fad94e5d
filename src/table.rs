// table.rs
// Raw CSV loading shared by every cleaner: preamble skipping, header
// normalization, column lookup, and cell parsing.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{PanelError, Result};

/// Characters trimmed from both ends of state names and legislature cells.
pub const PUNCTUATION: &str = "!@#$%^&*.";

/// A CSV file read as strings, before any typing.
///
/// Empty cells are `None`; whitespace-only cells are kept as written.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub path: PathBuf,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    /// Opens `path`, skips `preamble` non-blank records, and takes the next
    /// record as the header.
    ///
    /// A record of empty fields (",,") is not blank: it counts toward the
    /// preamble and can be the header. Among data rows it carries nothing and
    /// is dropped.
    #[tracing::instrument(level = "debug", skip_all, fields(path = %path.display()))]
    pub fn read(path: &Path, preamble: usize) -> Result<Self> {
        let file = File::open(path).map_err(|source| PanelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(path, file, preamble)
    }

    pub fn from_reader<R: Read>(path: &Path, reader: R, preamble: usize) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let csv_error = |source: csv::Error| PanelError::Csv {
            path: path.to_path_buf(),
            source,
        };

        // Blank lines never count toward the preamble or the data.
        let mut records = rdr
            .records()
            .filter(|r| r.as_ref().map_or(true, |rec| !is_blank_line(rec)));

        for _ in 0..preamble {
            match records.next() {
                Some(record) => {
                    record.map_err(csv_error)?;
                }
                None => return Err(PanelError::schema(path, "file ends inside the preamble")),
            }
        }

        let header = records
            .next()
            .ok_or_else(|| PanelError::schema(path, "no header row"))?
            .map_err(csv_error)?;
        let columns: Vec<String> = header.iter().map(str::to_string).collect();
        debug!(?columns, "header");

        let mut rows = Vec::new();
        for (line, record) in records.enumerate() {
            let record = record.map_err(csv_error)?;
            if record.iter().all(str::is_empty) {
                continue;
            }
            if record.iter().skip(columns.len()).any(|v| !v.is_empty()) {
                return Err(PanelError::schema(
                    path,
                    format!("data row {} has more fields than the header", line + 1),
                ));
            }

            let row = (0..columns.len())
                .map(|i| record.get(i).filter(|v| !v.is_empty()).map(str::to_string))
                .collect();
            rows.push(row);
        }

        Ok(Self {
            path: path.to_path_buf(),
            columns,
            rows,
        })
    }

    pub fn normalize_columns(&mut self, normalize: impl Fn(&str) -> String) {
        for column in &mut self.columns {
            *column = normalize(column);
        }
    }

    /// Index of `name`, or a `MissingColumn` error naming this file.
    pub fn column(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| PanelError::missing_column(&self.path, name))
    }

    /// Drops every row with at least one empty cell.
    pub fn drop_incomplete_rows(&mut self) {
        self.rows.retain(|row| row.iter().all(Option::is_some));
    }

    pub fn retain_columns(&mut self, keep: impl Fn(&str) -> bool) {
        let kept: Vec<usize> = (0..self.columns.len())
            .filter(|&i| keep(&self.columns[i]))
            .collect();

        let columns: Vec<String> = kept.iter().map(|&i| self.columns[i].clone()).collect();
        self.columns = columns;
        for row in &mut self.rows {
            let picked: Vec<Option<String>> = kept.iter().map(|&i| row[i].take()).collect();
            *row = picked;
        }
    }

    pub fn schema_error(&self, message: impl Into<String>) -> PanelError {
        PanelError::schema(&self.path, message)
    }
}

/// The csv reader already skips empty lines; a lone whitespace field is one
/// too. Separator-only rows have several fields and do not qualify.
fn is_blank_line(record: &StringRecord) -> bool {
    record.len() <= 1 && record.iter().all(|v| v.trim().is_empty())
}

/// Parses a possibly thousands-separated number ("1,234,567").
pub fn parse_number(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().replace(',', "");
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn strip_punctuation(value: &str) -> &str {
    value.trim_matches(|c| PUNCTUATION.contains(c))
}

/// Lowercases a header and turns spaces and newlines into underscores.
pub fn snake_header(raw: &str) -> String {
    raw.to_lowercase().replace([' ', '\n'], "_")
}

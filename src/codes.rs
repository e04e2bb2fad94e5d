// codes.rs
// State name to two-letter postal code mapping.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::join::{JoinKind, JoinLog, JoinReport, index_by};
use crate::table::RawTable;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateCode {
    pub state: String,
    pub code: String,
}

/// Loads the code table. Headers are matched case-insensitively; codes are
/// uppercased.
#[tracing::instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_codes(path: &Path) -> Result<Vec<StateCode>> {
    let mut raw = RawTable::read(path, 0)?;
    raw.normalize_columns(str::to_lowercase);

    let state_col = raw.column("state")?;
    let code_col = raw.column("code")?;

    let mut codes = Vec::with_capacity(raw.rows.len());
    for (line, row) in raw.rows.iter().enumerate() {
        let (Some(state), Some(code)) = (&row[state_col], &row[code_col]) else {
            return Err(raw.schema_error(format!("row {} lacks a state or code", line + 1)));
        };

        let code = code.trim().to_uppercase();
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(raw.schema_error(format!("`{code}` is not a two-letter code")));
        }
        if codes.iter().any(|c: &StateCode| c.code == code) {
            return Err(raw.schema_error(format!("code `{code}` appears twice")));
        }

        codes.push(StateCode {
            state: state.clone(),
            code,
        });
    }

    info!(states = codes.len(), "loaded state codes");
    Ok(codes)
}

/// Inner join with the code table on the state name, in code-table order.
pub fn join_codes<T: Clone>(
    name: &str,
    codes: &[StateCode],
    rows: &[T],
    state_of: impl Fn(&T) -> &str,
    joins: &mut JoinLog,
) -> Result<Vec<(String, T)>> {
    let by_state = index_by(rows, |row| state_of(row).to_string());

    let mut joined = Vec::new();
    let mut left_unmatched = 0;
    for code in codes {
        match by_state.get(&code.state) {
            Some(positions) => {
                joined.extend(positions.iter().map(|&i| (code.code.clone(), rows[i].clone())));
            }
            None => left_unmatched += 1,
        }
    }

    let right_unmatched = rows
        .iter()
        .filter(|row| !codes.iter().any(|c| c.state == state_of(row)))
        .count();

    joins.record(JoinReport {
        name: name.to_string(),
        kind: JoinKind::Inner,
        left_rows: codes.len(),
        right_rows: rows.len(),
        output_rows: joined.len(),
        left_unmatched,
        right_unmatched,
    })?;

    Ok(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PanelError;
    use std::fs;

    #[test]
    fn test_headers_are_case_insensitive_and_codes_uppercased() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        fs::write(&path, "State,Abbrev,Code\nAlabama,Ala.,al\nAlaska,Alaska,AK\n").unwrap();

        let codes = load_codes(&path).unwrap();
        assert_eq!(
            codes,
            vec![
                StateCode { state: "Alabama".into(), code: "AL".into() },
                StateCode { state: "Alaska".into(), code: "AK".into() },
            ]
        );
    }

    #[test]
    fn test_missing_code_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        fs::write(&path, "state,abbrev\nAlabama,Ala.\n").unwrap();

        let err = load_codes(&path).unwrap_err();
        assert!(matches!(err, PanelError::MissingColumn { ref column, .. } if column == "code"));
    }

    #[test]
    fn test_duplicate_code_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.csv");
        fs::write(&path, "state,code\nAlabama,AL\nAlabama2,al\n").unwrap();

        assert!(matches!(load_codes(&path), Err(PanelError::Schema { .. })));
    }

    #[test]
    fn test_join_codes_follows_code_order() {
        let codes = vec![
            StateCode { state: "Alabama".into(), code: "AL".into() },
            StateCode { state: "Alaska".into(), code: "AK".into() },
            StateCode { state: "Arizona".into(), code: "AZ".into() },
        ];
        let rows = vec![("Alaska", 1), ("Puerto Rico", 2), ("Alabama", 3)];
        let mut joins = JoinLog::new(false);

        let joined = join_codes("test", &codes, &rows, |r| r.0, &mut joins).unwrap();
        assert_eq!(
            joined,
            vec![("AL".to_string(), ("Alabama", 3)), ("AK".to_string(), ("Alaska", 1))]
        );

        let report = &joins.reports()[0];
        assert_eq!(report.left_unmatched, 1);
        assert_eq!(report.right_unmatched, 1);
    }

    #[test]
    fn test_missing_file() {
        let err = load_codes(Path::new("/nonexistent/codes.csv")).unwrap_err();
        assert!(matches!(err, PanelError::Io { .. }));
    }
}

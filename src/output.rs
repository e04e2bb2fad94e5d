// output.rs
// CSV writers for the assembled panel, the source ranking, and state centroids.

use std::path::Path;

use csv::WriterBuilder;
use serde::Serialize;
use tracing::info;

use crate::assemble::{FullRow, SourceRank};
use crate::error::{PanelError, Result};
use crate::geography::StateShape;

/// Centroid columns of a `StateShape`; the polygon itself is not written.
#[derive(Debug, Serialize)]
struct CentroidRecord<'a> {
    fips: &'a str,
    code: &'a str,
    state: &'a str,
    centroid_lon: f64,
    centroid_lat: f64,
}

fn write_records<T: Serialize>(path: &Path, records: impl IntoIterator<Item = T>) -> Result<usize> {
    let csv_error = |source: csv::Error| PanelError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut wtr = WriterBuilder::new().from_path(path).map_err(csv_error)?;
    let mut written = 0;
    for record in records {
        wtr.serialize(record).map_err(csv_error)?;
        written += 1;
    }
    wtr.flush().map_err(|source| PanelError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    info!(path = %path.display(), rows = written, "wrote csv");
    Ok(written)
}

/// Writes the full panel; missing values become empty cells.
pub fn write_full_csv(path: &Path, rows: &[FullRow]) -> Result<usize> {
    write_records(path, rows)
}

pub fn write_rankings_csv(path: &Path, rankings: &[SourceRank]) -> Result<usize> {
    write_records(path, rankings)
}

pub fn write_centroids_csv(path: &Path, states: &[StateShape]) -> Result<usize> {
    write_records(
        path,
        states.iter().map(|s| CentroidRecord {
            fips: &s.fips,
            code: &s.code,
            state: &s.state,
            centroid_lon: s.centroid_lon,
            centroid_lat: s.centroid_lat,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::energy::Renewable;
    use std::fs;

    fn row(pop: Option<f64>) -> FullRow {
        FullRow {
            state: pop.map(|_| "Texas".to_string()),
            code: "TX".into(),
            year: 2019,
            pop,
            pol: pop.map(|_| "Republican".to_string()),
            src: "Wind".into(),
            renew: Renewable::Renewable,
            gen_mwh: 100.0,
            co2_tons: 0.0,
            so2_tons: 0.0,
            nox_tons: 0.0,
            co2_pp: pop.map(|p| 0.0 / p),
            mwh_pp: pop.map(|p| 100.0 / p),
            sum_gen_mwh: 100.0,
            sum_mwh_pp: pop.map_or(0.0, |p| 100.0 / p),
            mwh_pp_pct: pop.map(|_| 1.0),
            gen_mwh_pct: 1.0,
            rank: 4,
        }
    }

    #[test]
    fn test_full_csv_header_and_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("full.csv");

        let written = write_full_csv(&path, &[row(Some(50.0)), row(None)]).unwrap();
        assert_eq!(written, 2);

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines[0],
            "state,code,year,pop,pol,src,renew,gen_mwh,co2_tons,so2_tons,nox_tons,co2_pp,mwh_pp,sum_gen_mwh,sum_mwh_pp,mwh_pp_pct,gen_mwh_pct,rank"
        );
        assert!(lines[1].starts_with("Texas,TX,2019,50.0,Republican,Wind,Renewable,100.0,"));
        assert!(lines[2].starts_with(",TX,2019,,,Wind,Renewable,"));
    }

    #[test]
    fn test_rankings_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ranks.csv");
        let rankings = vec![SourceRank {
            src: "Coal".into(),
            gen_mwh: 10.0,
            co2_tons: 9.0,
            co2_mwh: 0.9,
            rank: 1,
        }];

        write_rankings_csv(&path, &rankings).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "src,gen_mwh,co2_tons,co2_mwh,rank\nCoal,10.0,9.0,0.9,1\n");
    }

    #[test]
    fn test_unwritable_path() {
        let err = write_rankings_csv(Path::new("/nonexistent/dir/ranks.csv"), &[]).unwrap_err();
        assert!(matches!(err, PanelError::Csv { .. }));
    }
}

// config.rs
// Input locations and join policy for one pipeline run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{PanelError, Result};

/// Every file the pipeline reads, plus how strictly joins are checked.
///
/// Passed explicitly to each builder; nothing in the crate reads paths from
/// global state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// State name to two-letter code mapping.
    pub codes: PathBuf,

    /// Census estimate files, ordered by era (1990s, 2000s, 2010s).
    pub populations: [PathBuf; 3],

    /// Partisan control of state legislatures, one column per year.
    pub legislature: PathBuf,

    /// EIA annual generation totals.
    pub generation: PathBuf,

    /// EIA annual emission totals.
    pub emissions: PathBuf,

    /// State boundary shapefile.
    pub shapes: PathBuf,

    /// Fail with `JoinMismatch` instead of warning when a join drops rows.
    pub strict_joins: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            codes: PathBuf::from("data/state_codes.csv"),
            populations: [
                PathBuf::from("data/pop_90-99.csv"),
                PathBuf::from("data/pop_00-10.csv"),
                PathBuf::from("data/pop_10-19.csv"),
            ],
            legislature: PathBuf::from("data/leg_90-19.csv"),
            generation: PathBuf::from("data/generation_annual.csv"),
            emissions: PathBuf::from("data/emission_annual.csv"),
            shapes: PathBuf::from("data/shapefiles/cb_2019_us_state_500k.shp"),
            strict_joins: false,
        }
    }
}

impl PipelineConfig {
    /// Loads a TOML file; keys it leaves out keep their default values.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|source| PanelError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| PanelError::Config {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "legislature = \"other/leg.csv\"\nstrict_joins = true").unwrap();

        let config = PipelineConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.legislature, PathBuf::from("other/leg.csv"));
        assert!(config.strict_joins);
        assert_eq!(config.codes, PathBuf::from("data/state_codes.csv"));
        assert_eq!(config.populations[2], PathBuf::from("data/pop_10-19.csv"));
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "populations = \"not a list\"").unwrap();

        let err = PipelineConfig::from_toml_file(file.path()).unwrap_err();
        assert!(matches!(err, PanelError::Config { .. }));
    }

    #[test]
    fn test_missing_config_file_is_io_error() {
        let err = PipelineConfig::from_toml_file(Path::new("/nonexistent/panel.toml")).unwrap_err();
        assert!(matches!(err, PanelError::Io { .. }));
    }
}

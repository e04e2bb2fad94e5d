//! Cleans U.S. state population, legislative control, electricity generation,
//! and emissions data and merges them into one state-year-source panel with
//! per-capita, share, and dirtiness-rank columns.

pub mod assemble;
pub mod codes;
pub mod config;
pub mod energy;
pub mod error;
pub mod geography;
pub mod join;
pub mod legislature;
pub mod output;
pub mod population;
pub mod table;

pub use assemble::{FullDataset, FullRow, SourceRank, build_full};
pub use config::PipelineConfig;
pub use energy::EnergyFormat;
pub use error::{PanelError, Result};

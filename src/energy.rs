// energy.rs
// EIA annual generation and emission totals by state, year, and energy source.

use std::fmt;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{PanelError, Result};
use crate::join::{JoinKind, JoinLog, JoinReport, index_by};
use crate::table::{RawTable, parse_number, snake_header};

/// Producer type of the aggregate rows; every other producer type is a subset.
pub const TOTAL_PRODUCER: &str = "Total Electric Power Industry";

const NONRENEWABLE_SOURCES: [&str; 3] = ["Coal", "Natural Gas", "Petroleum"];

const SOURCE_ALIASES: [(&str, &str); 3] = [
    ("Hydroelectric Conventional", "Hydroelectric"),
    ("Wood and Wood Derived Fuels", "Wood Derived Fuels"),
    ("Solar Thermal and Photovoltaic", "Solar"),
];

/// Which of the two EIA files is being read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergyFormat {
    Generation,
    Emissions,
}

impl EnergyFormat {
    fn producer_column(self) -> &'static str {
        match self {
            EnergyFormat::Generation => "type_of_producer",
            EnergyFormat::Emissions => "producer_type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Renewable {
    Renewable,
    Nonrenewable,
}

impl Renewable {
    pub fn of_source(src: &str) -> Self {
        if NONRENEWABLE_SOURCES.contains(&src) {
            Renewable::Nonrenewable
        } else {
            Renewable::Renewable
        }
    }
}

impl fmt::Display for Renewable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Renewable::Renewable => f.write_str("Renewable"),
            Renewable::Nonrenewable => f.write_str("Nonrenewable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRow {
    pub year: i32,
    pub state: String,
    pub src: String,
    pub renew: Renewable,
    pub gen_mwh: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmissionRow {
    pub year: i32,
    pub state: String,
    pub src: String,
    pub co2_tons: Option<f64>,
    pub so2_tons: Option<f64>,
    pub nox_tons: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnergyTable {
    Generation(Vec<GenerationRow>),
    Emissions(Vec<EmissionRow>),
}

/// Generation joined with emissions, one row per state, year, and source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnergyRow {
    pub year: i32,
    pub code: String,
    pub src: String,
    pub renew: Renewable,
    pub gen_mwh: f64,
    pub co2_tons: f64,
    pub so2_tons: f64,
    pub nox_tons: f64,
}

pub fn canonical_source(src: &str) -> String {
    SOURCE_ALIASES
        .iter()
        .fold(src.to_string(), |name, (long, short)| name.replace(long, short))
}

/// The columns a cleaned row is built from, resolved once per file.
struct Layout {
    year: usize,
    state: usize,
    src: usize,
    producer: usize,
    measures: Vec<usize>,
}

/// Cleans one EIA file, keeping only "Total Electric Power Industry" rows.
///
/// Headers are lowercased with spaces and newlines turned into underscores.
/// Generation rows additionally lose the "Total" source and gain a
/// renewable flag.
///
/// # Arguments
/// * `path` - An EIA annual generation or emissions CSV
/// * `format` - Which of the two layouts `path` has
///
/// # Returns
/// * `EnergyTable` variant matching `format`
#[tracing::instrument(level = "info", skip(path), fields(path = %path.display()))]
pub fn load_clean_eng(path: &Path, format: EnergyFormat) -> Result<EnergyTable> {
    let mut raw = RawTable::read(path, 0)?;
    raw.normalize_columns(snake_header);

    let measure_names: &[&str] = match format {
        EnergyFormat::Generation => &["generation_(megawatthours)"],
        EnergyFormat::Emissions => &["co2_(metric_tons)", "so2_(metric_tons)", "nox_(metric_tons)"],
    };
    let layout = Layout {
        year: raw.column("year")?,
        state: raw.column("state")?,
        src: raw.column("energy_source")?,
        producer: raw.column(format.producer_column())?,
        measures: measure_names
            .iter()
            .map(|name| raw.column(name))
            .collect::<Result<_>>()?,
    };

    let mut generation = Vec::new();
    let mut emissions = Vec::new();
    let mut skipped = 0;

    for (line, row) in raw.rows.iter().enumerate() {
        if row[layout.producer].as_deref() != Some(TOTAL_PRODUCER) {
            skipped += 1;
            continue;
        }

        let Some(raw_src) = row[layout.src].as_deref() else {
            return Err(raw.schema_error(format!("row {} has no energy source", line + 1)));
        };
        if format == EnergyFormat::Generation && raw_src == "Total" {
            skipped += 1;
            continue;
        }

        let year = row[layout.year]
            .as_deref()
            .and_then(|y| y.trim().parse::<i32>().ok())
            .ok_or_else(|| raw.schema_error(format!("row {} has no valid year", line + 1)))?;
        let state = row[layout.state].as_deref().unwrap_or_default().to_uppercase();
        let src = canonical_source(raw_src);

        let mut values = Vec::with_capacity(layout.measures.len());
        for &col in &layout.measures {
            let value = match row[col].as_deref() {
                None => None,
                Some(cell) => Some(parse_number(cell).ok_or_else(|| {
                    raw.schema_error(format!(
                        "`{cell}` in column `{}` (row {}) is not a number",
                        raw.columns[col],
                        line + 1
                    ))
                })?),
            };
            values.push(value);
        }

        match format {
            EnergyFormat::Generation => generation.push(GenerationRow {
                year,
                state,
                renew: Renewable::of_source(raw_src),
                src,
                gen_mwh: values[0],
            }),
            EnergyFormat::Emissions => emissions.push(EmissionRow {
                year,
                state,
                src,
                co2_tons: values[0],
                so2_tons: values[1],
                nox_tons: values[2],
            }),
        }
    }

    let kept = generation.len() + emissions.len();
    info!(kept, skipped, ?format, "cleaned energy file");

    Ok(match format {
        EnergyFormat::Generation => EnergyTable::Generation(generation),
        EnergyFormat::Emissions => EnergyTable::Emissions(emissions),
    })
}

fn expect_generation(path: &Path) -> Result<Vec<GenerationRow>> {
    match load_clean_eng(path, EnergyFormat::Generation)? {
        EnergyTable::Generation(rows) => Ok(rows),
        EnergyTable::Emissions(_) => Err(PanelError::schema(path, "expected generation rows")),
    }
}

fn expect_emissions(path: &Path) -> Result<Vec<EmissionRow>> {
    match load_clean_eng(path, EnergyFormat::Emissions)? {
        EnergyTable::Emissions(rows) => Ok(rows),
        EnergyTable::Generation(_) => Err(PanelError::schema(path, "expected emission rows")),
    }
}

/// National totals, blank state cells, and DC (too sparse to analyse).
fn excluded_state(state: &str) -> bool {
    matches!(state, "US-Total" | "US-TOTAL" | "DC") || state.trim().is_empty()
}

/// Left join of generation with emissions on state, year, and source.
///
/// Missing emissions (and missing generation) count as zero. National
/// totals, blank states, and DC are removed; `state` becomes `code`.
#[tracing::instrument(level = "info", skip_all)]
pub fn build_eng(
    generation: &Path,
    emissions: &Path,
    joins: &mut JoinLog,
) -> Result<Vec<EnergyRow>> {
    let gen_rows = expect_generation(generation)?;
    let emission_rows = expect_emissions(emissions)?;
    merge_energy(&gen_rows, &emission_rows, joins)
}

pub fn merge_energy(
    gen_rows: &[GenerationRow],
    emission_rows: &[EmissionRow],
    joins: &mut JoinLog,
) -> Result<Vec<EnergyRow>> {
    let by_key = index_by(emission_rows, |e| (e.state.clone(), e.year, e.src.clone()));

    let mut merged = Vec::new();
    let mut left_unmatched = 0;
    for g in gen_rows {
        let key = (g.state.clone(), g.year, g.src.clone());
        let matches: Vec<Option<&EmissionRow>> = match by_key.get(&key) {
            Some(positions) => positions.iter().map(|&i| Some(&emission_rows[i])).collect(),
            None => {
                left_unmatched += 1;
                vec![None]
            }
        };

        for e in matches {
            merged.push((
                g,
                EnergyRow {
                    year: g.year,
                    code: g.state.clone(),
                    src: g.src.clone(),
                    renew: g.renew,
                    gen_mwh: g.gen_mwh.unwrap_or(0.0),
                    co2_tons: e.and_then(|e| e.co2_tons).unwrap_or(0.0),
                    so2_tons: e.and_then(|e| e.so2_tons).unwrap_or(0.0),
                    nox_tons: e.and_then(|e| e.nox_tons).unwrap_or(0.0),
                },
            ));
        }
    }

    let gen_keys = index_by(gen_rows, |g| (g.state.clone(), g.year, g.src.clone()));
    let right_unmatched = emission_rows
        .iter()
        .filter(|e| !gen_keys.contains_key(&(e.state.clone(), e.year, e.src.clone())))
        .count();

    joins.record(JoinReport {
        name: "generation emissions".to_string(),
        kind: JoinKind::Left,
        left_rows: gen_rows.len(),
        right_rows: emission_rows.len(),
        output_rows: merged.len(),
        left_unmatched,
        right_unmatched,
    })?;

    let rows: Vec<EnergyRow> = merged
        .into_iter()
        .filter(|(g, _)| !excluded_state(&g.state))
        .map(|(_, row)| row)
        .collect();

    info!(rows = rows.len(), "built energy table");
    Ok(rows)
}

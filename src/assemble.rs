// assemble.rs
// Merges population, legislature, and energy tables into the final panel and
// derives per-capita, share, and dirtiness-rank columns.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::info;

use crate::codes::load_codes;
use crate::config::PipelineConfig;
use crate::energy::{EnergyRow, Renewable, build_eng};
use crate::error::Result;
use crate::join::{JoinKind, JoinLog, JoinReport, index_by};
use crate::legislature::{LegislatureRow, load_clean_pol};
use crate::population::{PopulationRow, build_pop};

/// Population with the party in control, before energy data is attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelRow {
    pub state: String,
    pub code: String,
    pub year: i32,
    pub pop: f64,
    pub pol: Option<String>,
}

/// One state, year, and energy source of the final panel.
///
/// `state`, `pop`, and `pol` are missing when the energy data covers a state
/// and year the population side does not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullRow {
    pub state: Option<String>,
    pub code: String,
    pub year: i32,
    pub pop: Option<f64>,
    pub pol: Option<String>,
    pub src: String,
    pub renew: Renewable,
    pub gen_mwh: f64,
    pub co2_tons: f64,
    pub so2_tons: f64,
    pub nox_tons: f64,
    pub co2_pp: Option<f64>,
    pub mwh_pp: Option<f64>,
    pub sum_gen_mwh: f64,
    pub sum_mwh_pp: f64,
    pub mwh_pp_pct: Option<f64>,
    pub gen_mwh_pct: f64,
    pub rank: usize,
}

/// Dataset-wide emissions per MWh of one energy source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRank {
    pub src: String,
    pub gen_mwh: f64,
    pub co2_tons: f64,
    pub co2_mwh: f64,
    pub rank: usize,
}

#[derive(Debug, Clone)]
pub struct FullDataset {
    pub rows: Vec<FullRow>,
    pub rankings: Vec<SourceRank>,
    pub joins: Vec<JoinReport>,
}

/// Loads every input named by `config` and assembles the panel.
///
/// # Arguments
/// * `config` - Input paths and whether lossy joins are errors
///
/// # Returns
/// * `FullDataset` with the panel rows, the source ranking, and one report
///   per join
#[tracing::instrument(level = "info", skip_all)]
pub fn build_full(config: &PipelineConfig) -> Result<FullDataset> {
    let mut joins = JoinLog::new(config.strict_joins);

    let codes = load_codes(&config.codes)?;
    let energy = build_eng(&config.generation, &config.emissions, &mut joins)?;
    let pop = build_pop(&config.populations, &codes, &mut joins)?;
    let pol = load_clean_pol(&config.legislature, &codes, &mut joins)?;

    let rows = assemble(&pop, &pol, &energy, &mut joins)?;
    let rankings = source_rankings(&rows);

    info!(rows = rows.len(), sources = rankings.len(), "assembled full panel");
    Ok(FullDataset {
        rows,
        rankings,
        joins: joins.into_reports(),
    })
}

/// The merge-and-derive sequence over already cleaned tables.
///
/// Order matters: control is forward-filled before energy rows multiply each
/// state-year, and shares need the per-capita columns.
pub fn assemble(
    pop: &[PopulationRow],
    pol: &[LegislatureRow],
    energy: &[EnergyRow],
    joins: &mut JoinLog,
) -> Result<Vec<FullRow>> {
    let mut panel = join_legislature(pop, pol, joins)?;
    forward_fill_pol(&mut panel);

    let mut rows = join_energy(&panel, energy, joins)?;
    add_state_shares(&mut rows);

    let rankings = source_rankings(&rows);
    let ranks: HashMap<&str, usize> = rankings.iter().map(|r| (r.src.as_str(), r.rank)).collect();
    for row in &mut rows {
        row.rank = ranks[row.src.as_str()];
    }

    Ok(rows)
}

/// Left join of population with legislature control on state, code, and year.
pub fn join_legislature(
    pop: &[PopulationRow],
    pol: &[LegislatureRow],
    joins: &mut JoinLog,
) -> Result<Vec<PanelRow>> {
    let by_key = index_by(pol, |p| (p.state.clone(), p.code.clone(), p.year));

    let mut panel = Vec::with_capacity(pop.len());
    let mut left_unmatched = 0;
    for p in pop {
        let row = |control: Option<String>| PanelRow {
            state: p.state.clone(),
            code: p.code.clone(),
            year: p.year,
            pop: p.pop,
            pol: control,
        };

        match by_key.get(&(p.state.clone(), p.code.clone(), p.year)) {
            Some(positions) => panel.extend(positions.iter().map(|&i| row(Some(pol[i].pol.clone())))),
            None => {
                left_unmatched += 1;
                panel.push(row(None));
            }
        }
    }

    let pop_keys = index_by(pop, |p| (p.state.clone(), p.code.clone(), p.year));
    let right_unmatched = pol
        .iter()
        .filter(|l| !pop_keys.contains_key(&(l.state.clone(), l.code.clone(), l.year)))
        .count();

    joins.record(JoinReport {
        name: "population legislature".to_string(),
        kind: JoinKind::Left,
        left_rows: pop.len(),
        right_rows: pol.len(),
        output_rows: panel.len(),
        left_unmatched,
        right_unmatched,
    })?;

    Ok(panel)
}

/// Replaces each missing `pol` with the last value seen for the same state
/// code, walking rows in their current order. Values before a state's first
/// known control stay missing.
pub fn forward_fill_pol(rows: &mut [PanelRow]) {
    let mut last: HashMap<String, String> = HashMap::new();
    for row in rows.iter_mut() {
        if let Some(pol) = &row.pol {
            last.insert(row.code.clone(), pol.clone());
        } else if let Some(prev) = last.get(&row.code) {
            row.pol = Some(prev.clone());
        }
    }
}

/// Right join of energy onto the panel on year and code, with per-capita
/// columns. Energy rows are all kept; panel rows without energy data go.
pub fn join_energy(
    panel: &[PanelRow],
    energy: &[EnergyRow],
    joins: &mut JoinLog,
) -> Result<Vec<FullRow>> {
    let by_key = index_by(panel, |p| (p.year, p.code.clone()));

    let mut rows = Vec::with_capacity(energy.len());
    let mut right_unmatched = 0;
    for e in energy {
        let matches: Vec<Option<&PanelRow>> = match by_key.get(&(e.year, e.code.clone())) {
            Some(positions) => positions.iter().map(|&i| Some(&panel[i])).collect(),
            None => {
                right_unmatched += 1;
                vec![None]
            }
        };

        for p in matches {
            let pop = p.map(|p| p.pop);
            rows.push(FullRow {
                state: p.map(|p| p.state.clone()),
                code: e.code.clone(),
                year: e.year,
                pop,
                pol: p.and_then(|p| p.pol.clone()),
                src: e.src.clone(),
                renew: e.renew,
                gen_mwh: e.gen_mwh,
                co2_tons: e.co2_tons,
                so2_tons: e.so2_tons,
                nox_tons: e.nox_tons,
                co2_pp: pop.map(|n| e.co2_tons / n),
                mwh_pp: pop.map(|n| e.gen_mwh / n),
                sum_gen_mwh: 0.0,
                sum_mwh_pp: 0.0,
                mwh_pp_pct: None,
                gen_mwh_pct: 0.0,
                rank: 0,
            });
        }
    }

    let energy_keys = index_by(energy, |e| (e.year, e.code.clone()));
    let left_unmatched = panel
        .iter()
        .filter(|p| !energy_keys.contains_key(&(p.year, p.code.clone())))
        .count();

    joins.record(JoinReport {
        name: "panel energy".to_string(),
        kind: JoinKind::Right,
        left_rows: panel.len(),
        right_rows: energy.len(),
        output_rows: rows.len(),
        left_unmatched,
        right_unmatched,
    })?;

    Ok(rows)
}

/// Sum that ignores missing and NaN values; empty input sums to zero.
fn skipna_sum(values: impl IntoIterator<Item = Option<f64>>) -> f64 {
    values.into_iter().flatten().filter(|v| !v.is_nan()).sum()
}

/// Each source's share of its state-year generation, in MWh and per capita.
pub fn add_state_shares(rows: &mut [FullRow]) {
    let mut groups: HashMap<(i32, String), (Vec<Option<f64>>, Vec<Option<f64>>)> = HashMap::new();
    for row in rows.iter() {
        let (gen_mwh, mwh_pp) = groups.entry((row.year, row.code.clone())).or_default();
        gen_mwh.push(Some(row.gen_mwh));
        mwh_pp.push(row.mwh_pp);
    }

    let sums: HashMap<(i32, String), (f64, f64)> = groups
        .into_iter()
        .map(|(key, (gen_mwh, mwh_pp))| (key, (skipna_sum(gen_mwh), skipna_sum(mwh_pp))))
        .collect();

    for row in rows.iter_mut() {
        let (sum_gen_mwh, sum_mwh_pp) = sums[&(row.year, row.code.clone())];
        row.sum_gen_mwh = sum_gen_mwh;
        row.sum_mwh_pp = sum_mwh_pp;
        row.gen_mwh_pct = row.gen_mwh / sum_gen_mwh;
        row.mwh_pp_pct = row.mwh_pp.map(|m| m / sum_mwh_pp);
    }
}

/// Ranks sources by total CO2 over total generation across all rows.
///
/// Rank 1 is the dirtiest source. Sources whose ratio is undefined (no
/// generation and no emissions) rank last; ties keep alphabetical order.
pub fn source_rankings(rows: &[FullRow]) -> Vec<SourceRank> {
    let mut totals: BTreeMap<&str, (f64, f64)> = BTreeMap::new();
    for row in rows {
        let (gen_mwh, co2_tons) = totals.entry(row.src.as_str()).or_default();
        *gen_mwh += row.gen_mwh;
        *co2_tons += row.co2_tons;
    }

    let mut ranks: Vec<SourceRank> = totals
        .into_iter()
        .map(|(src, (gen_mwh, co2_tons))| SourceRank {
            src: src.to_string(),
            gen_mwh,
            co2_tons,
            co2_mwh: co2_tons / gen_mwh,
            rank: 0,
        })
        .collect();

    ranks.sort_by(|a, b| match (a.co2_mwh.is_nan(), b.co2_mwh.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.co2_mwh.total_cmp(&a.co2_mwh),
    });
    for (i, rank) in ranks.iter_mut().enumerate() {
        rank.rank = i + 1;
    }

    ranks
}

// main.rs
// Builds the state energy panel from the configured inputs, prints the source
// dirtiness ranking, and saves the results as CSV.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use state_energy_panel::geography::load_states;
use state_energy_panel::output::{write_centroids_csv, write_full_csv, write_rankings_csv};
use state_energy_panel::{PipelineConfig, SourceRank, build_full};

#[derive(Parser)]
#[command(name = "state_energy_panel")]
#[command(about = "Merge state population, legislature, generation, and emissions data")]
struct Cli {
    /// TOML file overriding the default input paths
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where to write the full panel
    #[arg(long, default_value = "full_panel.csv")]
    output: PathBuf,

    /// Also write the source ranking here
    #[arg(long)]
    rankings: Option<PathBuf>,

    /// Also load the state shapefile and write centroids here
    #[arg(long)]
    centroids: Option<PathBuf>,

    /// Number of sources to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

/// Displays the dirtiest sources first.
fn display_rankings(rankings: &[SourceRank], top_n: usize) {
    println!(
        "{:<6} {:<28} {:>18} {:>18} {:>12}",
        "Rank", "Source", "Generation MWh", "CO2 tons", "CO2/MWh"
    );
    println!("{}", "-".repeat(86));

    for item in rankings.iter().take(top_n) {
        println!(
            "{:<6} {:<28} {:>18.0} {:>18.0} {:>12.4}",
            item.rank, item.src, item.gen_mwh, item.co2_tons, item.co2_mwh
        );
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder().with_env_filter(env).init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None => PipelineConfig::default(),
    };
    info!(?config, "starting");

    let full = build_full(&config).context("building the state panel")?;
    for report in full.joins.iter().filter(|r| r.dropped() > 0) {
        info!(join = %report.name, dropped = report.dropped(), "join summary");
    }

    println!("\nEnergy sources by CO2 per MWh generated:\n");
    display_rankings(&full.rankings, cli.top);

    write_full_csv(&cli.output, &full.rows)?;
    if let Some(path) = &cli.rankings {
        write_rankings_csv(path, &full.rankings)?;
    }
    if let Some(path) = &cli.centroids {
        let states = load_states(&config.shapes).context("loading state shapes")?;
        write_centroids_csv(path, &states)?;
    }

    info!("done");
    Ok(())
}

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::Table;
use hydroprep_core::config::PipelineConfig;
use hydroprep_core::pipelines::{run_facilities, run_watersheds, FacilitiesRun, WatershedsRun};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Facility and watershed preparation for spatial joins", long_about = None)]
struct Cli {
    /// TOML file overriding the default paths and column rules
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean and normalize the facility registry for one state
    Facilities(FacilitiesArgs),
    /// Load hydrologic unit boundaries and add area and centroid columns
    Watersheds(WatershedsArgs),
    /// Run both pipelines
    All,
}

#[derive(Args, Debug, Default)]
struct FacilitiesArgs {
    /// Two-letter state code
    #[arg(long)]
    state: Option<String>,
    /// Raw facility parquet file
    #[arg(long)]
    input: Option<PathBuf>,
    /// Destination parquet file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
struct WatershedsArgs {
    /// Boundary container directory holding one GeoJSON file per layer
    #[arg(long)]
    container: Option<PathBuf>,
    /// Hydrologic unit level (2, 4, 6, 8, 10 or 12)
    #[arg(long)]
    level: Option<u8>,
    /// Directory receiving the parquet and GeoJSON outputs
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Facilities(args) => handle_facilities(config, args),
        Command::Watersheds(args) => handle_watersheds(config, args),
        Command::All => {
            handle_facilities(config.clone(), FacilitiesArgs::default())?;
            handle_watersheds(config, WatershedsArgs::default())
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn handle_facilities(config: PipelineConfig, args: FacilitiesArgs) -> Result<()> {
    let mut facilities = config.facilities;
    if let Some(state) = args.state {
        facilities.state = state;
    }
    if let Some(input) = args.input {
        facilities.input = input.to_string_lossy().into_owned();
    }
    if let Some(output) = args.output {
        facilities.output = output.to_string_lossy().into_owned();
    }

    let run = run_facilities(&facilities)?;
    print_facilities_summary(&run);
    Ok(())
}

fn handle_watersheds(config: PipelineConfig, args: WatershedsArgs) -> Result<()> {
    let mut watersheds = config.watersheds;
    if let Some(container) = args.container {
        watersheds.container = container;
    }
    if let Some(level) = args.level {
        watersheds.level = level;
    }
    if let Some(output_dir) = args.output_dir {
        watersheds.output_dir = output_dir;
    }

    let run = run_watersheds(&watersheds)?;
    print_watersheds_summary(&run);
    Ok(())
}

fn print_facilities_summary(run: &FacilitiesRun) {
    println!("Saved: {}", run.output_path.display());
    println!("Rows: {}", run.rows);
    println!("Columns: {:?}", run.columns);

    let report = &run.report;
    let mut table = Table::new();
    table.set_header(vec!["Metric", "Count"]);
    table.add_row(vec!["rows read".to_string(), report.rows_in.to_string()]);
    table.add_row(vec![
        "dropped (missing lat/lon)".to_string(),
        report.rows_dropped_missing_position.to_string(),
    ]);
    table.add_row(vec![
        "duplicates removed".to_string(),
        report.duplicate_rows_removed.to_string(),
    ]);
    for coercion in report.coercions.iter().filter(|c| c.coerced_to_null > 0) {
        table.add_row(vec![
            format!("{} coerced to null", coercion.column),
            coercion.coerced_to_null.to_string(),
        ]);
    }
    println!("{table}");

    if !report.missing_optional_columns.is_empty() {
        println!(
            "Optional columns absent from source: {}",
            report.missing_optional_columns.join(", ")
        );
    }
    if report.state_defaulted {
        info!("state column absent from source; filled with configured state");
    }
}

fn print_watersheds_summary(run: &WatershedsRun) {
    println!(
        "Saved {} {} watersheds.",
        group_thousands(run.units),
        run.level
    );
    println!("  parquet: {}", run.artifacts.parquet_path.display());
    println!("  geojson: {}", run.artifacts.geojson_path.display());
    println!("Columns: {:?}", run.columns);

    if !run.report.failures.is_empty() {
        let mut table = Table::new();
        table.set_header(vec!["Index", "HUC", "Reason"]);
        for failure in &run.report.failures {
            table.add_row(vec![
                failure.index.to_string(),
                failure.huc.clone().unwrap_or_default(),
                failure.reason.clone(),
            ]);
        }
        println!("Units without area/centroid: {}", run.report.failures.len());
        println!("{table}");
    }
}

fn group_thousands(value: usize) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

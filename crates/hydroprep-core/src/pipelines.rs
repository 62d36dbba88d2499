//! The two batch pipelines: load, normalize or enrich, persist.
//! Each run reads its whole source into memory and writes its output once;
//! any fatal error returns before an output file is touched.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::config::{FacilitiesConfig, WatershedsConfig};
use crate::facilities::{load_facility_table, normalize_facilities};
use crate::outputs::{save_watershed_outputs, write_parquet, WatershedArtifacts};
use crate::report::{EnrichmentReport, NormalizeReport};
use crate::watersheds::{enrich_watersheds, load_boundaries, HucLevel};

#[derive(Debug, Clone)]
pub struct FacilitiesRun {
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: Vec<String>,
    pub report: NormalizeReport,
}

#[derive(Debug, Clone)]
pub struct WatershedsRun {
    pub level: HucLevel,
    pub artifacts: WatershedArtifacts,
    pub units: usize,
    pub columns: Vec<String>,
    pub report: EnrichmentReport,
}

pub fn run_facilities(config: &FacilitiesConfig) -> Result<FacilitiesRun> {
    config.validate()?;

    let input = config.input_path();
    let output_path = config.output_path();
    let state = config.state_code();

    let raw = load_facility_table(&input)
        .with_context(|| format!("failed to load facility table {}", input.display()))?;
    info!(path = %input.display(), rows = raw.height(), "loaded facility table");

    let outcome = normalize_facilities(&raw, &config.columns, &state)
        .with_context(|| format!("failed to normalize facility table {}", input.display()))?;

    write_parquet(&outcome.dataframe, &output_path)
        .with_context(|| format!("failed to write {}", output_path.display()))?;

    let columns = outcome
        .dataframe
        .get_column_names()
        .into_iter()
        .map(|name| name.to_string())
        .collect();

    info!(
        state = %state,
        rows_in = outcome.report.rows_in,
        rows_out = outcome.report.rows_out,
        dropped_missing_position = outcome.report.rows_dropped_missing_position,
        duplicates_removed = outcome.report.duplicate_rows_removed,
        "facility normalization complete"
    );

    Ok(FacilitiesRun {
        output_path,
        rows: outcome.dataframe.height(),
        columns,
        report: outcome.report,
    })
}

pub fn run_watersheds(config: &WatershedsConfig) -> Result<WatershedsRun> {
    let level = config.huc_level()?;
    let crs = config.enrichment_crs()?;

    let table = load_boundaries(&config.container, level).with_context(|| {
        format!(
            "failed to load {} boundaries from {}",
            level,
            config.container.display()
        )
    })?;

    let outcome = enrich_watersheds(&table, &crs).context("failed to enrich watershed units")?;

    let artifacts = save_watershed_outputs(&outcome.table, &config.output_dir)
        .with_context(|| format!("failed to write outputs to {}", config.output_dir.display()))?;

    Ok(WatershedsRun {
        level,
        artifacts,
        units: outcome.table.len(),
        columns: outcome.table.column_names(),
        report: outcome.report,
    })
}

use std::fs::File;
use std::path::Path;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use polars::prelude::*;
use tracing::{debug, warn};

use crate::config::ColumnSpec;
use crate::error::NormalizeError;
use crate::report::{ColumnCoercion, NormalizeReport};

pub const STATE_COLUMN: &str = "state";
pub const LAT_COLUMN: &str = "lat";
pub const LON_COLUMN: &str = "lon";

const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];
const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Numeric,
    Date,
    /// Indicator columns carried through with their source dtype.
    Flag,
}

/// One allow-listed facility column: its name in the ECHO extract, its
/// canonical name, and how its values are coerced.
#[derive(Debug, Clone, Copy)]
pub struct ColumnRule {
    pub source: &'static str,
    pub canonical: &'static str,
    pub kind: ColumnKind,
}

impl ColumnRule {
    const fn new(source: &'static str, canonical: &'static str, kind: ColumnKind) -> Self {
        Self {
            source,
            canonical,
            kind,
        }
    }
}

static FACILITY_COLUMNS: Lazy<Vec<ColumnRule>> = Lazy::new(|| {
    vec![
        ColumnRule::new("SourceID", "source_id", ColumnKind::Text),
        ColumnRule::new("CWPName", "facility_name", ColumnKind::Text),
        ColumnRule::new("CWPState", "state", ColumnKind::Text),
        ColumnRule::new("CWPCity", "city", ColumnKind::Text),
        ColumnRule::new("CWPStateDistrict", "state_district", ColumnKind::Text),
        ColumnRule::new("FacLat", "lat", ColumnKind::Numeric),
        ColumnRule::new("FacLong", "lon", ColumnKind::Numeric),
        ColumnRule::new("CWPTotalDesignFlowNmbr", "design_flow", ColumnKind::Numeric),
        ColumnRule::new("CWPEffectiveDate", "permit_effective_date", ColumnKind::Date),
        ColumnRule::new("AcsPopulationDensity", "acs_pop_density", ColumnKind::Numeric),
        ColumnRule::new("PercentPeopleOfColor", "pct_people_of_color", ColumnKind::Numeric),
        ColumnRule::new("FacStdCountyName", "county", ColumnKind::Text),
        ColumnRule::new("Statute", "statute", ColumnKind::Text),
        ColumnRule::new("FacFederalAgencyName", "federal_agency", ColumnKind::Text),
        ColumnRule::new("CWPIndianCntryFlg", "in_indian_country_flag", ColumnKind::Flag),
        ColumnRule::new("FacIndianSpatialFlg", "indian_spatial_flag", ColumnKind::Flag),
    ]
});

/// The allow-list in output column order.
pub fn facility_columns() -> &'static [ColumnRule] {
    FACILITY_COLUMNS.as_slice()
}

#[derive(Debug, Clone)]
pub struct NormalizeOutcome {
    pub dataframe: DataFrame,
    pub report: NormalizeReport,
}

pub fn load_facility_table(path: &Path) -> Result<DataFrame, NormalizeError> {
    let file = File::open(path).map_err(|source| NormalizeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(ParquetReader::new(file).finish()?)
}

/// Projects, renames, coerces, geo-filters and de-duplicates a raw facility
/// extract. Only a missing required column is an error; every other defect
/// degrades to nulls or dropped rows and is recorded in the report.
pub fn normalize_facilities(
    source: &DataFrame,
    spec: &ColumnSpec,
    state: &str,
) -> Result<NormalizeOutcome, NormalizeError> {
    let rows_in = source.height();

    let missing_required: Vec<String> = spec
        .required
        .iter()
        .filter(|name| !has_column(source, name))
        .cloned()
        .collect();
    if !missing_required.is_empty() {
        return Err(NormalizeError::MissingRequiredColumns {
            columns: missing_required,
        });
    }

    let mut report = NormalizeReport {
        rows_in,
        ..NormalizeReport::default()
    };
    let mut columns: Vec<Column> = Vec::new();

    for rule in facility_columns() {
        if !spec.is_selected(rule.source) {
            continue;
        }
        let Ok(column) = source.column(rule.source) else {
            debug!(column = rule.source, "optional column absent from source");
            report.missing_optional_columns.push(rule.source.to_string());
            continue;
        };

        let series = column.as_materialized_series();
        let (coerced, coerced_to_null) = match rule.kind {
            ColumnKind::Numeric => coerce_numeric(series)?,
            ColumnKind::Text => coerce_text(series)?,
            ColumnKind::Date => coerce_date(series)?,
            ColumnKind::Flag => (series.clone(), 0),
        };

        if rule.kind != ColumnKind::Flag {
            if coerced_to_null > 0 {
                warn!(
                    column = rule.canonical,
                    coerced = coerced_to_null,
                    "values could not be coerced and were set to null"
                );
            }
            report.coercions.push(ColumnCoercion {
                column: rule.canonical.to_string(),
                coerced_to_null,
            });
        }

        columns.push(coerced.with_name(rule.canonical.into()).into());
    }

    let mut frame = DataFrame::new(columns)?;

    if !has_column(&frame, STATE_COLUMN) {
        frame.with_column(Series::new(STATE_COLUMN.into(), vec![state; rows_in]))?;
        report.state_defaulted = true;
    }

    if has_column(&frame, LAT_COLUMN) && has_column(&frame, LON_COLUMN) {
        let before = frame.height();
        frame = frame
            .lazy()
            .filter(col(LAT_COLUMN).is_not_null().and(col(LON_COLUMN).is_not_null()))
            .collect()?;
        report.rows_dropped_missing_position = before - frame.height();
    }

    let before = frame.height();
    frame = frame
        .lazy()
        .unique_stable(None, UniqueKeepStrategy::First)
        .collect()?;
    report.duplicate_rows_removed = before - frame.height();
    report.rows_out = frame.height();

    Ok(NormalizeOutcome {
        dataframe: frame,
        report,
    })
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_index(name).is_some()
}

fn present_count(series: &Series) -> usize {
    series.len() - series.null_count()
}

fn coerce_numeric(series: &Series) -> PolarsResult<(Series, usize)> {
    let values: Vec<Option<f64>> = match series.dtype() {
        DataType::String => series
            .str()?
            .into_iter()
            .map(|value| value.and_then(parse_number))
            .collect(),
        _ => match series.cast(&DataType::Float64) {
            Ok(cast) => cast
                .f64()?
                .into_iter()
                .map(|value| value.filter(|v| !v.is_nan()))
                .collect(),
            Err(_) => vec![None; series.len()],
        },
    };
    let coerced = Series::new(series.name().clone(), values);
    let lost = present_count(series).saturating_sub(present_count(&coerced));
    Ok((coerced, lost))
}

fn coerce_text(series: &Series) -> PolarsResult<(Series, usize)> {
    if series.dtype() == &DataType::String {
        return Ok((series.clone(), 0));
    }
    let coerced = series.cast(&DataType::String).unwrap_or_else(|_| {
        Series::full_null(series.name().clone(), series.len(), &DataType::String)
    });
    let lost = present_count(series).saturating_sub(present_count(&coerced));
    Ok((coerced, lost))
}

fn coerce_date(series: &Series) -> PolarsResult<(Series, usize)> {
    let name = series.name().clone();
    let coerced = match series.dtype() {
        DataType::Date => series.clone(),
        DataType::Datetime(_, _) => series.cast(&DataType::Date)?,
        DataType::String => dates_to_series(
            name,
            series.str()?.into_iter().map(|value| value.and_then(parse_date)),
        )?,
        _ => match series.cast(&DataType::String) {
            Ok(text) => dates_to_series(
                name,
                text.str()?.into_iter().map(|value| value.and_then(parse_date)),
            )?,
            Err(_) => Series::full_null(name, series.len(), &DataType::Date),
        },
    };
    let lost = present_count(series).saturating_sub(present_count(&coerced));
    Ok((coerced, lost))
}

fn dates_to_series(
    name: PlSmallStr,
    values: impl Iterator<Item = Option<NaiveDate>>,
) -> PolarsResult<Series> {
    let days: Vec<Option<i32>> = values
        .map(|date| date.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
        .collect();
    Series::new(name, days).cast(&DataType::Date)
}

/// Parses a numeric cell; blanks, `NaN` and malformed text are missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Parses the calendar dates found in ECHO extracts; a time-of-day part is
/// discarded.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(value, format).ok())
        .or_else(|| {
            DATETIME_FORMATS.iter().find_map(|format| {
                NaiveDateTime::parse_from_str(value, format)
                    .ok()
                    .map(|dt| dt.date())
            })
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

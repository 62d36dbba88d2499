use std::ffi::OsString;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use geo::Geometry;
use geojson::{Feature, FeatureCollection, JsonObject};
use polars::io::parquet::write::{ParquetCompression, ParquetWriter, StatisticsOptions};
use polars::prelude::{Column, DataFrame, NamedFrom, Series};
use serde_json::json;
use tracing::info;

use crate::error::OutputError;
use crate::watersheds::{
    WatershedTable, AREA_COLUMN, CENTROID_LAT_COLUMN, CENTROID_LON_COLUMN, GEOMETRY_COLUMN,
    NAME_COLUMN, STATES_COLUMN,
};

/// Where the two watershed artifacts were written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatershedArtifacts {
    pub parquet_path: PathBuf,
    pub geojson_path: PathBuf,
}

/// Serializes `df` to parquet and replaces `path` with it.
pub fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), OutputError> {
    let bytes = create_parquet_bytes(df)?;
    write_atomically(path, &bytes)?;
    info!(path = %path.display(), rows = df.height(), "wrote parquet output");
    Ok(())
}

/// Writes `<level>.parquet` and `<level>.geojson` (e.g. `huc4.parquet`) into
/// `out_dir`. Both files are staged before either replaces its target; if
/// anything fails the previous pair is left in place.
pub fn save_watershed_outputs(
    table: &WatershedTable,
    out_dir: &Path,
) -> Result<WatershedArtifacts, OutputError> {
    let stem = table.level.id_column();
    let parquet_path = out_dir.join(format!("{stem}.parquet"));
    let geojson_path = out_dir.join(format!("{stem}.geojson"));

    let frame = watershed_frame(table)?;
    let parquet_bytes = create_parquet_bytes(&frame)?;
    let geojson_bytes = serde_json::to_vec(&watershed_feature_collection(table)?)?;

    let parquet = stage(&parquet_path, &parquet_bytes)?;
    let geojson = match stage(&geojson_path, &geojson_bytes) {
        Ok(staged) => staged,
        Err(err) => {
            parquet.discard();
            return Err(err);
        }
    };
    commit(vec![parquet, geojson])?;

    info!(
        parquet = %parquet_path.display(),
        geojson = %geojson_path.display(),
        units = table.len(),
        "wrote watershed outputs"
    );

    Ok(WatershedArtifacts {
        parquet_path,
        geojson_path,
    })
}

/// Columnar view of the table. Geometry is stored as GeoJSON geometry text.
pub fn watershed_frame(table: &WatershedTable) -> Result<DataFrame, OutputError> {
    let units = &table.units;
    let mut columns: Vec<Column> = Vec::new();

    if table.columns.huc {
        let values: Vec<Option<&str>> = units.iter().map(|u| u.huc.as_deref()).collect();
        columns.push(Series::new(table.level.id_column().into(), values).into());
    }
    if table.columns.name {
        let values: Vec<Option<&str>> =
            units.iter().map(|u| u.watershed_name.as_deref()).collect();
        columns.push(Series::new(NAME_COLUMN.into(), values).into());
    }
    if table.columns.states {
        let values: Vec<Option<&str>> = units.iter().map(|u| u.states.as_deref()).collect();
        columns.push(Series::new(STATES_COLUMN.into(), values).into());
    }
    if table.columns.geometry {
        let values = units
            .iter()
            .map(|u| u.geometry.as_ref().map(geometry_text).transpose())
            .collect::<Result<Vec<Option<String>>, _>>()?;
        columns.push(Series::new(GEOMETRY_COLUMN.into(), values).into());
    }
    if table.columns.derived {
        let area: Vec<Option<f64>> = units.iter().map(|u| u.area_km2).collect();
        let lon: Vec<Option<f64>> = units.iter().map(|u| u.centroid_lon).collect();
        let lat: Vec<Option<f64>> = units.iter().map(|u| u.centroid_lat).collect();
        columns.push(Series::new(AREA_COLUMN.into(), area).into());
        columns.push(Series::new(CENTROID_LON_COLUMN.into(), lon).into());
        columns.push(Series::new(CENTROID_LAT_COLUMN.into(), lat).into());
    }

    Ok(DataFrame::new(columns)?)
}

pub fn watershed_feature_collection(
    table: &WatershedTable,
) -> Result<FeatureCollection, OutputError> {
    let id_column = table.level.id_column();
    let features = table
        .units
        .iter()
        .map(|unit| {
            let mut properties = JsonObject::new();
            if table.columns.huc {
                properties.insert(id_column.clone(), json!(unit.huc));
            }
            if table.columns.name {
                properties.insert(NAME_COLUMN.to_string(), json!(unit.watershed_name));
            }
            if table.columns.states {
                properties.insert(STATES_COLUMN.to_string(), json!(unit.states));
            }
            if table.columns.derived {
                properties.insert(AREA_COLUMN.to_string(), json!(unit.area_km2));
                properties.insert(CENTROID_LON_COLUMN.to_string(), json!(unit.centroid_lon));
                properties.insert(CENTROID_LAT_COLUMN.to_string(), json!(unit.centroid_lat));
            }
            Feature {
                bbox: None,
                geometry: unit
                    .geometry
                    .as_ref()
                    .map(|g| geojson::Geometry::new(geojson::Value::from(g))),
                id: None,
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn geometry_text(geometry: &Geometry<f64>) -> Result<String, serde_json::Error> {
    serde_json::to_string(&geojson::Geometry::new(geojson::Value::from(geometry)))
}

fn create_parquet_bytes(df: &DataFrame) -> Result<Vec<u8>, OutputError> {
    let mut buffer = Vec::new();
    {
        let mut cursor = Cursor::new(&mut buffer);
        let mut clone = df.clone();
        ParquetWriter::new(&mut cursor)
            .with_compression(ParquetCompression::Zstd(None))
            .with_statistics(StatisticsOptions::default())
            .finish(&mut clone)?;
    }
    Ok(buffer)
}

/// Full overwrite through a sibling temp file, so a failed write never
/// leaves a truncated artifact in place of the previous one.
fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), OutputError> {
    let staged = stage(path, bytes)?;
    commit(vec![staged])
}

/// Bytes written next to their target, not yet moved into place.
#[derive(Debug)]
struct StagedFile {
    temp: PathBuf,
    backup: PathBuf,
    target: PathBuf,
}

impl StagedFile {
    /// Moves any previous target aside, then the staged file into place.
    /// Returns whether a previous target existed.
    fn replace(&self) -> Result<bool, OutputError> {
        let had_prior = self.target.is_file();
        if had_prior {
            fs::rename(&self.target, &self.backup).map_err(|source| OutputError::Write {
                path: self.target.clone(),
                source,
            })?;
        }
        if let Err(source) = fs::rename(&self.temp, &self.target) {
            if had_prior {
                let _ = fs::rename(&self.backup, &self.target);
            }
            return Err(OutputError::Write {
                path: self.target.clone(),
                source,
            });
        }
        Ok(had_prior)
    }

    fn restore(&self, had_prior: bool) {
        if had_prior {
            let _ = fs::rename(&self.backup, &self.target);
        } else {
            let _ = fs::remove_file(&self.target);
        }
    }

    fn discard(&self) {
        let _ = fs::remove_file(&self.temp);
    }
}

fn stage(path: &Path, bytes: &[u8]) -> Result<StagedFile, OutputError> {
    if path.is_dir() {
        return Err(OutputError::TargetIsDirectory(path.to_path_buf()));
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| OutputError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let temp = sibling_path(path, "tmp");
    if let Err(source) = fs::write(&temp, bytes) {
        let _ = fs::remove_file(&temp);
        return Err(OutputError::Write { path: temp, source });
    }
    Ok(StagedFile {
        temp,
        backup: sibling_path(path, "bak"),
        target: path.to_path_buf(),
    })
}

/// Replaces every target or none: a failure part way through puts the
/// already-replaced targets back and drops the remaining staged files.
fn commit(files: Vec<StagedFile>) -> Result<(), OutputError> {
    let mut committed: Vec<(&StagedFile, bool)> = Vec::with_capacity(files.len());
    for (index, file) in files.iter().enumerate() {
        match file.replace() {
            Ok(had_prior) => committed.push((file, had_prior)),
            Err(err) => {
                for (done, had_prior) in committed.iter().rev() {
                    done.restore(*had_prior);
                }
                files[index..].iter().for_each(StagedFile::discard);
                return Err(err);
            }
        }
    }
    for (file, had_prior) in committed {
        if had_prior {
            let _ = fs::remove_file(&file.backup);
        }
    }
    Ok(())
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

// crates/hydroprep-core/src/error.rs

use std::path::PathBuf;

use hydroprep_projection::ProjectionError;
use polars::error::PolarsError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("column '{0}' is not in the facility allow-list")]
    UnknownColumn(String),

    #[error("{role} CRS {crs} cannot be used in that role")]
    CrsRole { role: &'static str, crs: String },

    #[error("unsupported hydrologic unit level {0} (expected 2, 4, 6, 8, 10 or 12)")]
    InvalidLevel(u8),

    #[error("state code must not be empty")]
    EmptyState,

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("failed to read facility table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("facility table is missing required columns: {}", columns.join(", "))]
    MissingRequiredColumns { columns: Vec<String> },

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),
}

#[derive(Debug, Error)]
pub enum BoundaryError {
    #[error("boundary container {0} does not exist or is not a directory")]
    ContainerNotFound(PathBuf),

    #[error("layer {layer} not found in {container} (available: {})", available.join(", "))]
    LayerNotFound {
        container: PathBuf,
        layer: String,
        available: Vec<String>,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("layer {path} is not valid GeoJSON: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },

    #[error("layer {0} does not contain features")]
    NotFeatures(PathBuf),

    #[error(transparent)]
    Projection(#[from] ProjectionError),
}

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("output path {0} is a directory")]
    TargetIsDirectory(PathBuf),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("polars operation failed: {0}")]
    Polars(#[from] PolarsError),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

use std::fs;
use std::path::Path;

use geo::Geometry;
use geojson::{Feature, GeoJson};
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use super::{HucLevel, LayerColumns, WatershedTable, WatershedUnit};
use crate::error::BoundaryError;

const SOURCE_NAME_PROPERTY: &str = "name";
const SOURCE_STATES_PROPERTY: &str = "states";
const LAYER_EXTENSION: &str = "geojson";

/// Loads one hydrologic unit layer from a boundary container.
///
/// The container is a directory holding one GeoJSON FeatureCollection per
/// layer (`WBDHU4.geojson`, `WBDHU8.geojson`, ...). Only the identifier,
/// name, states and geometry are kept; properties the layer lacks are
/// omitted. Identifiers are zero-padded to the level's width.
pub fn load_boundaries(container: &Path, level: HucLevel) -> Result<WatershedTable, BoundaryError> {
    if !container.is_dir() {
        return Err(BoundaryError::ContainerNotFound(container.to_path_buf()));
    }

    let layer = level.layer_name();
    let layer_path = container.join(format!("{layer}.{LAYER_EXTENSION}"));
    if !layer_path.is_file() {
        return Err(BoundaryError::LayerNotFound {
            container: container.to_path_buf(),
            layer,
            available: available_layers(container)?,
        });
    }

    let content = fs::read_to_string(&layer_path).map_err(|source| BoundaryError::Io {
        path: layer_path.clone(),
        source,
    })?;
    let geojson: GeoJson = content.parse().map_err(|source| BoundaryError::GeoJson {
        path: layer_path.clone(),
        source: Box::new(source),
    })?;

    let features = match geojson {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => return Err(BoundaryError::NotFeatures(layer_path)),
    };

    let id_property = level.id_column();
    let width = usize::from(level.digits());
    let mut columns = LayerColumns::default();
    let mut units = Vec::with_capacity(features.len());

    for (index, feature) in features.into_iter().enumerate() {
        let huc = property(&feature, &id_property, &mut columns.huc)
            .map(|code| zero_pad(&code, width));
        let watershed_name = property(&feature, SOURCE_NAME_PROPERTY, &mut columns.name);
        let states = property(&feature, SOURCE_STATES_PROPERTY, &mut columns.states);

        let geometry = match feature.geometry {
            Some(geometry) => {
                columns.geometry = true;
                match Geometry::<f64>::try_from(geometry) {
                    Ok(converted) => Some(converted),
                    Err(err) => {
                        warn!(index, huc = ?huc, error = %err, "unsupported geometry; keeping unit without it");
                        None
                    }
                }
            }
            None => {
                debug!(index, huc = ?huc, "feature has no geometry");
                None
            }
        };

        units.push(WatershedUnit {
            huc,
            watershed_name,
            states,
            geometry,
            ..WatershedUnit::default()
        });
    }

    info!(
        layer = %level.layer_name(),
        units = units.len(),
        path = %layer_path.display(),
        "loaded boundary layer"
    );

    Ok(WatershedTable {
        level,
        columns,
        units,
    })
}

/// Left-pads a code with zeros to `width` characters. Codes already at or
/// beyond the width, whitespace included, are returned unchanged.
pub fn zero_pad(code: &str, width: usize) -> String {
    let len = code.chars().count();
    if len >= width {
        return code.to_string();
    }
    let mut padded = "0".repeat(width - len);
    padded.push_str(code);
    padded
}

fn available_layers(container: &Path) -> Result<Vec<String>, BoundaryError> {
    let entries = fs::read_dir(container).map_err(|source| BoundaryError::Io {
        path: container.to_path_buf(),
        source,
    })?;
    let mut layers: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|ext| ext.to_str()) == Some(LAYER_EXTENSION))
        .filter_map(|path| path.file_stem().and_then(|stem| stem.to_str()).map(str::to_string))
        .collect();
    layers.sort();
    Ok(layers)
}

/// Reads a property as text, marking the column present when the key exists
/// on the feature even if its value is null.
fn property(feature: &Feature, key: &str, present: &mut bool) -> Option<String> {
    let value = feature.properties.as_ref()?.get(key)?;
    *present = true;
    value_text(value)
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number_text(number)),
        other => Some(other.to_string()),
    }
}

/// Integral numbers lose any fractional rendering so `45.0` pads to `0045`.
fn number_text(number: &Number) -> String {
    if let Some(value) = number.as_i64() {
        return value.to_string();
    }
    if let Some(value) = number.as_u64() {
        return value.to_string();
    }
    match number.as_f64() {
        Some(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{}", value as i64),
        _ => number.to_string(),
    }
}

use geo::{Area, Centroid, Coord, Geometry, MapCoords};
use hydroprep_projection::{ProjectionError, Transformer};
use thiserror::Error;
use tracing::{info, warn};

use super::{EnrichmentCrs, WatershedTable};
use crate::error::BoundaryError;
use crate::report::{EnrichmentReport, UnitFailure};

const SQUARE_METRES_PER_SQUARE_KM: f64 = 1_000_000.0;

#[derive(Debug, Clone)]
pub struct EnrichmentOutcome {
    pub table: WatershedTable,
    pub report: EnrichmentReport,
}

#[derive(Debug, Error)]
enum MeasureError {
    #[error("unit has no geometry")]
    MissingGeometry,
    #[error("geometry is empty")]
    EmptyGeometry,
    #[error("projection failed: {0}")]
    Projection(#[from] ProjectionError),
    #[error("projected area is not finite")]
    NonFiniteArea,
}

struct Measures {
    area_km2: f64,
    centroid_lon: f64,
    centroid_lat: f64,
}

/// Adds `area_km2`, `centroid_lon` and `centroid_lat` to every unit.
///
/// Each geometry is projected once into the working equal-area system;
/// area and centroid are taken there and the centroid is projected back to
/// geographic coordinates. Stored geometries are not modified. A unit whose
/// geometry is missing, empty or unprojectable keeps null derived values and
/// is listed in the report.
pub fn enrich_watersheds(
    table: &WatershedTable,
    crs: &EnrichmentCrs,
) -> Result<EnrichmentOutcome, BoundaryError> {
    let forward = Transformer::new(&crs.geographic, &crs.working)?;
    let inverse = Transformer::new(&crs.working, &crs.geographic)?;

    let mut enriched = table.clone();
    enriched.columns.derived = true;

    let mut report = EnrichmentReport {
        units: table.len(),
        ..EnrichmentReport::default()
    };

    for (index, unit) in enriched.units.iter_mut().enumerate() {
        match measure(unit.geometry.as_ref(), &forward, &inverse) {
            Ok(measures) => {
                unit.area_km2 = Some(measures.area_km2);
                unit.centroid_lon = Some(measures.centroid_lon);
                unit.centroid_lat = Some(measures.centroid_lat);
                report.enriched += 1;
            }
            Err(err) => {
                unit.area_km2 = None;
                unit.centroid_lon = None;
                unit.centroid_lat = None;
                warn!(index, huc = ?unit.huc, error = %err, "could not enrich unit");
                report.failures.push(UnitFailure {
                    index,
                    huc: unit.huc.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    info!(
        working_crs = %crs.working,
        units = report.units,
        enriched = report.enriched,
        failed = report.failures.len(),
        "enriched watershed units"
    );

    Ok(EnrichmentOutcome {
        table: enriched,
        report,
    })
}

fn measure(
    geometry: Option<&Geometry<f64>>,
    forward: &Transformer,
    inverse: &Transformer,
) -> Result<Measures, MeasureError> {
    let geometry = geometry.ok_or(MeasureError::MissingGeometry)?;

    let projected = geometry
        .try_map_coords(|coord| forward.transform(coord.x, coord.y).map(|(x, y)| Coord { x, y }))?;

    let centroid = projected.centroid().ok_or(MeasureError::EmptyGeometry)?;
    let area_m2 = projected.unsigned_area();
    if !area_m2.is_finite() {
        return Err(MeasureError::NonFiniteArea);
    }

    let (centroid_lon, centroid_lat) = inverse.transform(centroid.x(), centroid.y())?;

    Ok(Measures {
        area_km2: area_m2 / SQUARE_METRES_PER_SQUARE_KM,
        centroid_lon,
        centroid_lat,
    })
}

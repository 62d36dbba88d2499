//! Coordinate reference systems understood by the pipelines and transforms
//! between them.

use std::fmt;
use std::str::FromStr;

use crate::albers::{AlbersEqualArea, AlbersParams};
use crate::errors::ProjectionError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Crs {
    /// Geographic WGS84 longitude/latitude in degrees (EPSG:4326).
    Wgs84,
    /// NAD83 / Conus Albers equal-area (EPSG:5070).
    ConusAlbers,
    /// Any other Albers equal-area parameterization.
    Albers(AlbersParams),
}

impl Crs {
    /// Parse an `EPSG:<code>` identifier. Only the two reference systems the
    /// pipelines depend on are accepted.
    pub fn from_code(code: &str) -> Result<Self, ProjectionError> {
        let normalized = code.trim().to_ascii_uppercase();
        match normalized.as_str() {
            "EPSG:4326" | "WGS84" => Ok(Crs::Wgs84),
            "EPSG:5070" => Ok(Crs::ConusAlbers),
            _ => Err(ProjectionError::UnsupportedCrs(code.to_string())),
        }
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Crs::Wgs84 => Some(4326),
            Crs::ConusAlbers => Some(5070),
            Crs::Albers(_) => None,
        }
    }

    pub fn is_geographic(&self) -> bool {
        matches!(self, Crs::Wgs84)
    }

    fn projection(&self) -> Result<Projection, ProjectionError> {
        match self {
            Crs::Wgs84 => Ok(Projection::Geographic),
            Crs::ConusAlbers => Ok(Projection::Albers(AlbersEqualArea::new(
                AlbersParams::CONUS,
            )?)),
            Crs::Albers(params) => Ok(Projection::Albers(AlbersEqualArea::new(*params)?)),
        }
    }
}

impl FromStr for Crs {
    type Err = ProjectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Crs::from_code(s)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.epsg() {
            Some(code) => write!(f, "EPSG:{code}"),
            None => f.write_str("custom Albers equal-area"),
        }
    }
}

#[derive(Debug, Clone)]
enum Projection {
    Geographic,
    Albers(AlbersEqualArea),
}

impl Projection {
    fn unproject(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        match self {
            Projection::Geographic => Ok((x, y)),
            Projection::Albers(albers) => albers.inverse(x, y),
        }
    }

    fn project(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        match self {
            Projection::Geographic => Ok((lon, lat)),
            Projection::Albers(albers) => albers.forward(lon, lat),
        }
    }
}

/// Converts coordinates from one `Crs` to another via geographic coordinates.
///
/// All supported systems share the GRS80/WGS84 datum at the precision these
/// pipelines need, so no datum shift is applied.
#[derive(Debug, Clone)]
pub struct Transformer {
    source: Projection,
    target: Projection,
}

impl Transformer {
    pub fn new(source: &Crs, target: &Crs) -> Result<Self, ProjectionError> {
        Ok(Self {
            source: source.projection()?,
            target: target.projection()?,
        })
    }

    pub fn transform(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }
        let (lon, lat) = self.source.unproject(x, y)?;
        let (tx, ty) = self.target.project(lon, lat)?;
        if !tx.is_finite() || !ty.is_finite() {
            return Err(ProjectionError::NonFinite { x: tx, y: ty });
        }
        Ok((tx, ty))
    }
}

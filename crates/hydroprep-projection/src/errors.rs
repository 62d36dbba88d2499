use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProjectionError {
    #[error("unsupported CRS '{0}' (expected EPSG:4326 or EPSG:5070)")]
    UnsupportedCrs(String),

    #[error("invalid projection parameters: {0}")]
    InvalidParameters(String),

    #[error("coordinate ({x}, {y}) is not finite")]
    NonFinite { x: f64, y: f64 },

    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error("inverse projection did not converge for ({x}, {y})")]
    NoConvergence { x: f64, y: f64 },
}

pub mod albers;
pub mod crs;
pub mod ellipsoid;
pub mod errors;

pub use albers::{AlbersEqualArea, AlbersParams};
pub use crs::{Crs, Transformer};
pub use ellipsoid::Ellipsoid;
pub use errors::ProjectionError;

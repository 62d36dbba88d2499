//! Hydrologic unit boundaries: loading from a layered container and
//! enrichment with equal-area statistics.

mod enrich;
mod loader;

use std::fmt;

use geo::Geometry;
use hydroprep_projection::Crs;

pub use enrich::{enrich_watersheds, EnrichmentOutcome};
pub use loader::{load_boundaries, zero_pad};

pub const NAME_COLUMN: &str = "watershed_name";
pub const STATES_COLUMN: &str = "states";
pub const GEOMETRY_COLUMN: &str = "geometry";
pub const AREA_COLUMN: &str = "area_km2";
pub const CENTROID_LON_COLUMN: &str = "centroid_lon";
pub const CENTROID_LAT_COLUMN: &str = "centroid_lat";

/// A Watershed Boundary Dataset level, named by the number of digits in
/// its hydrologic unit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HucLevel(u8);

impl HucLevel {
    pub const HU2: HucLevel = HucLevel(2);
    pub const HU4: HucLevel = HucLevel(4);
    pub const HU8: HucLevel = HucLevel(8);

    pub fn new(digits: u8) -> Option<Self> {
        matches!(digits, 2 | 4 | 6 | 8 | 10 | 12).then_some(Self(digits))
    }

    pub fn digits(&self) -> u8 {
        self.0
    }

    /// Layer holding this level inside the boundary container, e.g. `WBDHU4`.
    pub fn layer_name(&self) -> String {
        format!("WBDHU{}", self.0)
    }

    /// Identifier column, e.g. `huc4`. Used for both the source property
    /// and the output column.
    pub fn id_column(&self) -> String {
        format!("huc{}", self.0)
    }
}

impl Default for HucLevel {
    fn default() -> Self {
        Self::HU4
    }
}

impl fmt::Display for HucLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HUC{}", self.0)
    }
}

/// The two coordinate systems enrichment works with: stored geometry and
/// output scalars are geographic, area and centroid are computed in the
/// equal-area working system.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentCrs {
    pub working: Crs,
    pub geographic: Crs,
}

impl Default for EnrichmentCrs {
    fn default() -> Self {
        Self {
            working: Crs::ConusAlbers,
            geographic: Crs::Wgs84,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WatershedUnit {
    pub huc: Option<String>,
    pub watershed_name: Option<String>,
    pub states: Option<String>,
    pub geometry: Option<Geometry<f64>>,
    pub area_km2: Option<f64>,
    pub centroid_lon: Option<f64>,
    pub centroid_lat: Option<f64>,
}

/// Which columns the source layer actually carried, plus whether the derived
/// columns have been computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerColumns {
    pub huc: bool,
    pub name: bool,
    pub states: bool,
    pub geometry: bool,
    pub derived: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WatershedTable {
    pub level: HucLevel,
    pub columns: LayerColumns,
    pub units: Vec<WatershedUnit>,
}

impl WatershedTable {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Output column names in persisted order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.columns.huc {
            names.push(self.level.id_column());
        }
        if self.columns.name {
            names.push(NAME_COLUMN.to_string());
        }
        if self.columns.states {
            names.push(STATES_COLUMN.to_string());
        }
        if self.columns.geometry {
            names.push(GEOMETRY_COLUMN.to_string());
        }
        if self.columns.derived {
            names.extend(
                [AREA_COLUMN, CENTROID_LON_COLUMN, CENTROID_LAT_COLUMN]
                    .iter()
                    .map(|name| name.to_string()),
            );
        }
        names
    }
}

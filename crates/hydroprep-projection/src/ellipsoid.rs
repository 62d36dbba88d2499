/// Reference ellipsoid given by semi-major axis (metres) and flattening.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub semi_major_axis: f64,
    pub flattening: f64,
}

impl Ellipsoid {
    /// GRS 1980, the ellipsoid of NAD83 and therefore of EPSG:5070.
    pub const GRS80: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        flattening: 1.0 / 298.257_222_101,
    };

    pub const WGS84: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_137.0,
        flattening: 1.0 / 298.257_223_563,
    };

    pub const CLARKE_1866: Ellipsoid = Ellipsoid {
        semi_major_axis: 6_378_206.4,
        flattening: 1.0 / 294.978_698_2,
    };

    /// A sphere of the given radius.
    pub fn sphere(radius: f64) -> Self {
        Self {
            semi_major_axis: radius,
            flattening: 0.0,
        }
    }

    /// First eccentricity squared.
    pub fn eccentricity_squared(&self) -> f64 {
        2.0 * self.flattening - self.flattening * self.flattening
    }

    pub fn eccentricity(&self) -> f64 {
        self.eccentricity_squared().sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grs80_eccentricity_matches_published_value() {
        let e2 = Ellipsoid::GRS80.eccentricity_squared();
        assert!((e2 - 0.006_694_380_022_90).abs() < 1e-12);
    }

    #[test]
    fn sphere_has_zero_eccentricity() {
        assert_eq!(Ellipsoid::sphere(6_371_000.0).eccentricity(), 0.0);
    }
}

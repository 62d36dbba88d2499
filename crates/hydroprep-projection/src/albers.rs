//! Albers Equal-Area Conic on the ellipsoid (Snyder 1987, USGS Prof. Paper 1395,
//! pp. 98-103). Forward is closed form; the inverse iterates on latitude
//! (Snyder eq. 3-16).

use crate::ellipsoid::Ellipsoid;
use crate::errors::ProjectionError;

const INVERSE_TOLERANCE: f64 = 1e-12;
const INVERSE_MAX_ITERATIONS: usize = 25;

/// Defining parameters of an Albers projection. Angles are in degrees,
/// offsets in metres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlbersParams {
    pub ellipsoid: Ellipsoid,
    pub latitude_of_origin: f64,
    pub central_meridian: f64,
    pub standard_parallel_1: f64,
    pub standard_parallel_2: f64,
    pub false_easting: f64,
    pub false_northing: f64,
}

impl AlbersParams {
    /// NAD83 / Conus Albers (EPSG:5070).
    pub const CONUS: AlbersParams = AlbersParams {
        ellipsoid: Ellipsoid::GRS80,
        latitude_of_origin: 23.0,
        central_meridian: -96.0,
        standard_parallel_1: 29.5,
        standard_parallel_2: 45.5,
        false_easting: 0.0,
        false_northing: 0.0,
    };
}

/// An Albers projection with its derived constants precomputed.
#[derive(Debug, Clone, PartialEq)]
pub struct AlbersEqualArea {
    params: AlbersParams,
    a: f64,
    e: f64,
    e2: f64,
    lon0: f64,
    n: f64,
    c: f64,
    rho0: f64,
}

impl AlbersEqualArea {
    pub fn new(params: AlbersParams) -> Result<Self, ProjectionError> {
        let a = params.ellipsoid.semi_major_axis;
        let e2 = params.ellipsoid.eccentricity_squared();
        let e = e2.sqrt();

        if !(a.is_finite() && a > 0.0) {
            return Err(ProjectionError::InvalidParameters(format!(
                "semi-major axis must be positive, got {a}"
            )));
        }
        if !(0.0..1.0).contains(&e2) {
            return Err(ProjectionError::InvalidParameters(format!(
                "eccentricity squared must be in [0, 1), got {e2}"
            )));
        }
        for lat in [
            params.latitude_of_origin,
            params.standard_parallel_1,
            params.standard_parallel_2,
        ] {
            if !(-90.0..=90.0).contains(&lat) {
                return Err(ProjectionError::LatitudeOutOfRange(lat));
            }
        }

        let phi0 = params.latitude_of_origin.to_radians();
        let phi1 = params.standard_parallel_1.to_radians();
        let phi2 = params.standard_parallel_2.to_radians();

        let m1 = m(phi1, e2);
        let m2 = m(phi2, e2);
        let q0 = q(phi0.sin(), e, e2);
        let q1 = q(phi1.sin(), e, e2);
        let q2 = q(phi2.sin(), e, e2);

        // Snyder eq. 14-14; the tangent case collapses to eq. 14-15.
        let n = if (phi1 - phi2).abs() < 1e-10 {
            phi1.sin()
        } else {
            (m1 * m1 - m2 * m2) / (q2 - q1)
        };
        if n.abs() < 1e-10 {
            return Err(ProjectionError::InvalidParameters(
                "standard parallels are symmetric about the equator".to_string(),
            ));
        }

        let c = m1 * m1 + n * q1;
        let rho0 = a * (c - n * q0).max(0.0).sqrt() / n;

        Ok(Self {
            params,
            a,
            e,
            e2,
            lon0: params.central_meridian.to_radians(),
            n,
            c,
            rho0,
        })
    }

    pub fn params(&self) -> &AlbersParams {
        &self.params
    }

    /// Geographic degrees to projected metres.
    pub fn forward(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(ProjectionError::NonFinite { x: lon, y: lat });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(ProjectionError::LatitudeOutOfRange(lat));
        }

        let phi = lat.to_radians();
        let q = q(phi.sin(), self.e, self.e2);
        let rho = self.a * (self.c - self.n * q).max(0.0).sqrt() / self.n;
        let theta = self.n * wrap_pi(lon.to_radians() - self.lon0);

        let x = rho * theta.sin() + self.params.false_easting;
        let y = self.rho0 - rho * theta.cos() + self.params.false_northing;
        Ok((x, y))
    }

    /// Projected metres to geographic degrees, longitude wrapped to [-180, 180].
    pub fn inverse(&self, x: f64, y: f64) -> Result<(f64, f64), ProjectionError> {
        if !x.is_finite() || !y.is_finite() {
            return Err(ProjectionError::NonFinite { x, y });
        }

        let dx = x - self.params.false_easting;
        let dy = self.rho0 - (y - self.params.false_northing);

        let (rho, theta) = if self.n >= 0.0 {
            ((dx * dx + dy * dy).sqrt(), dx.atan2(dy))
        } else {
            (-(dx * dx + dy * dy).sqrt(), (-dx).atan2(-dy))
        };

        let q = (self.c - (rho * self.n / self.a).powi(2)) / self.n;
        let phi = self.latitude_from_q(q).ok_or(ProjectionError::NoConvergence { x, y })?;
        let lambda = wrap_pi(self.lon0 + theta / self.n);

        Ok((lambda.to_degrees(), phi.to_degrees()))
    }

    fn latitude_from_q(&self, q: f64) -> Option<f64> {
        if self.e < 1e-12 {
            return Some((q / 2.0).clamp(-1.0, 1.0).asin());
        }

        // q at the poles (Snyder eq. 14-20); beyond it the point maps to a pole.
        let q_pole = 1.0
            - (1.0 - self.e2) / (2.0 * self.e) * ((1.0 - self.e) / (1.0 + self.e)).ln();
        if (q.abs() - q_pole.abs()).abs() < 1e-12 || q.abs() > q_pole.abs() {
            return Some(std::f64::consts::FRAC_PI_2.copysign(q));
        }

        let mut phi = (q / 2.0).clamp(-1.0, 1.0).asin();
        for _ in 0..INVERSE_MAX_ITERATIONS {
            let sin_phi = phi.sin();
            let cos_phi = phi.cos();
            let one_minus = 1.0 - self.e2 * sin_phi * sin_phi;
            let delta = one_minus * one_minus / (2.0 * cos_phi)
                * (q / (1.0 - self.e2) - sin_phi / one_minus
                    + 1.0 / (2.0 * self.e)
                        * ((1.0 - self.e * sin_phi) / (1.0 + self.e * sin_phi)).ln());
            phi += delta;
            if delta.abs() < INVERSE_TOLERANCE {
                return Some(phi);
            }
        }
        None
    }
}

/// Snyder eq. 14-15.
fn m(phi: f64, e2: f64) -> f64 {
    let sin_phi = phi.sin();
    phi.cos() / (1.0 - e2 * sin_phi * sin_phi).sqrt()
}

/// Snyder eq. 3-12; reduces to `2 sin(phi)` on the sphere.
fn q(sin_phi: f64, e: f64, e2: f64) -> f64 {
    if e < 1e-12 {
        return 2.0 * sin_phi;
    }
    let es = e * sin_phi;
    (1.0 - e2) * (sin_phi / (1.0 - es * es) - (1.0 / (2.0 * e)) * ((1.0 - es) / (1.0 + es)).ln())
}

fn wrap_pi(angle: f64) -> f64 {
    use std::f64::consts::PI;
    if (-PI..=PI).contains(&angle) {
        angle
    } else {
        (angle + PI).rem_euclid(2.0 * PI) - PI
    }
}

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// A sky position in the ICRS frame, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkyCoord {
    pub ra: f64,
    pub dec: f64,
}

impl SkyCoord {
    pub fn new(ra: f64, dec: f64) -> Self {
        Self { ra, dec }
    }

    /// Unit vector in ICRS axes.
    pub fn unit_vector(&self) -> Vector3<f64> {
        let (ra, dec) = (self.ra.to_radians(), self.dec.to_radians());
        Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
    }
}

impl From<(f64, f64)> for SkyCoord {
    fn from((ra, dec): (f64, f64)) -> Self {
        Self { ra, dec }
    }
}

/// Geodetic observatory location on the WGS84 ellipsoid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EarthLocation {
    /// Latitude in degrees, north positive
    pub lat: f64,
    /// Longitude in degrees, east positive
    pub lon: f64,
    /// Height above the ellipsoid in metres
    pub height: f64,
}

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;

impl EarthLocation {
    pub fn from_geodetic(lat: f64, lon: f64, height: f64) -> Self {
        Self { lat, lon, height }
    }

    /// Earth-fixed geocentric cartesian position in metres.
    pub fn geocentric(&self) -> Vector3<f64> {
        let (lat, lon) = (self.lat.to_radians(), self.lon.to_radians());
        let e2 = WGS84_F * (2.0 - WGS84_F);
        let n = WGS84_A / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        Vector3::new(
            (n + self.height) * lat.cos() * lon.cos(),
            (n + self.height) * lat.cos() * lon.sin(),
            (n * (1.0 - e2) + self.height) * lat.sin(),
        )
    }
}

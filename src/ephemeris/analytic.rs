//! Low precision analytic Earth ephemeris.

use hifitime::Epoch;
use nalgebra::{Rotation3, Vector3};
use std::f64::consts::TAU;

use super::{Ephemeris, AU_KM};
use crate::error::Result;

const J2000_JD: f64 = 2_451_545.0;
const DAYS_PER_CENTURY: f64 = 36_525.0;
/// Mean obliquity of the ecliptic at J2000, degrees
const OBLIQUITY_J2000: f64 = 23.439_279_44;
const EARTH_RADIUS_KM: f64 = 6_378.14;
const EARTH_MOON_MASS_RATIO: f64 = 81.300_57;

/// Mean Keplerian orbital elements at J2000 with their rates per Julian
/// century (a, e, I, L, longitude of perihelion, longitude of node).
#[derive(Debug, Clone, Copy)]
struct Elements {
    a: [f64; 2],
    e: [f64; 2],
    incl: [f64; 2],
    mean_long: [f64; 2],
    long_peri: [f64; 2],
    long_node: [f64; 2],
}

const EM_BARY: Elements = Elements {
    a: [1.000_002_61, 0.000_005_62],
    e: [0.016_711_23, -0.000_043_92],
    incl: [-0.000_015_31, -0.012_946_68],
    mean_long: [100.464_571_66, 35_999.372_449_81],
    long_peri: [102.937_681_93, 0.323_273_64],
    long_node: [0.0, 0.0],
};

/// Giant planets with their mass as a fraction of the Sun's.
const GIANTS: [(Elements, f64); 4] = [
    (
        Elements {
            a: [5.202_887_00, -0.000_116_07],
            e: [0.048_386_24, -0.000_132_53],
            incl: [1.304_396_95, -0.001_837_14],
            mean_long: [34.396_440_51, 3_034.746_127_75],
            long_peri: [14.728_479_83, 0.212_526_68],
            long_node: [100.473_909_09, 0.204_691_06],
        },
        1.0 / 1_047.348_6,
    ),
    (
        Elements {
            a: [9.536_675_94, -0.001_250_60],
            e: [0.053_861_79, -0.000_509_91],
            incl: [2.485_991_87, 0.001_936_09],
            mean_long: [49.954_244_23, 1_222.493_622_01],
            long_peri: [92.598_878_31, -0.418_972_16],
            long_node: [113.662_424_48, -0.288_677_94],
        },
        1.0 / 3_497.898,
    ),
    (
        Elements {
            a: [19.189_164_64, -0.001_961_76],
            e: [0.047_257_44, -0.000_043_97],
            incl: [0.772_637_83, -0.002_429_39],
            mean_long: [313.238_104_51, 428.482_027_85],
            long_peri: [170.954_276_30, 0.408_052_81],
            long_node: [74.016_925_03, 0.042_405_89],
        },
        1.0 / 22_902.98,
    ),
    (
        Elements {
            a: [30.069_922_76, 0.000_262_91],
            e: [0.008_590_48, 0.000_051_05],
            incl: [1.770_043_47, 0.000_353_72],
            mean_long: [-55.120_029_69, 218.459_453_25],
            long_peri: [44.964_762_27, -0.322_414_64],
            long_node: [131.784_225_74, -0.005_086_64],
        },
        1.0 / 19_412.24,
    ),
];

impl Elements {
    /// Heliocentric position in AU, ecliptic J2000 axes, `t` in Julian centuries.
    fn heliocentric(&self, t: f64) -> Vector3<f64> {
        let at = |el: [f64; 2]| el[0] + el[1] * t;
        let a = at(self.a);
        let e = at(self.e);
        let long_peri = at(self.long_peri);
        let long_node = at(self.long_node);
        let mean_anomaly = (at(self.mean_long) - long_peri).to_radians();

        let ecc_anomaly = solve_kepler(mean_anomaly, e);
        let in_plane = Vector3::new(
            a * (ecc_anomaly.cos() - e),
            a * (1.0 - e * e).sqrt() * ecc_anomaly.sin(),
            0.0,
        );
        let orientation = Rotation3::from_axis_angle(&Vector3::z_axis(), long_node.to_radians())
            * Rotation3::from_axis_angle(&Vector3::x_axis(), at(self.incl).to_radians())
            * Rotation3::from_axis_angle(&Vector3::z_axis(), (long_peri - long_node).to_radians());
        orientation * in_plane
    }
}

/// Eccentric anomaly for a mean anomaly (radians) by Newton iteration.
fn solve_kepler(mean_anomaly: f64, e: f64) -> f64 {
    let m = mean_anomaly.rem_euclid(TAU);
    let mut ecc = if e < 0.8 { m } else { std::f64::consts::PI };
    for _ in 0..30 {
        let delta = (ecc - e * ecc.sin() - m) / (1.0 - e * ecc.cos());
        ecc -= delta;
        if delta.abs() < 1e-14 {
            break;
        }
    }
    ecc
}

fn ecliptic_to_equatorial(v: Vector3<f64>) -> Vector3<f64> {
    Rotation3::from_axis_angle(&Vector3::x_axis(), OBLIQUITY_J2000.to_radians()) * v
}

/// Geocentric Moon in AU, ecliptic axes, from a truncated lunar series.
fn moon_geocentric(t: f64) -> Vector3<f64> {
    let sin_d = |deg: f64| deg.to_radians().sin();
    let cos_d = |deg: f64| deg.to_radians().cos();
    let lon = 218.32 + 481_267.881 * t + 6.29 * sin_d(135.0 + 477_198.87 * t)
        - 1.27 * sin_d(259.3 - 413_335.36 * t)
        + 0.66 * sin_d(235.7 + 890_534.22 * t)
        + 0.21 * sin_d(269.9 + 954_397.74 * t)
        - 0.19 * sin_d(357.5 + 35_999.05 * t)
        - 0.11 * sin_d(186.5 + 966_404.03 * t);
    let lat = 5.13 * sin_d(93.3 + 483_202.02 * t) + 0.28 * sin_d(228.2 + 960_400.89 * t)
        - 0.28 * sin_d(318.3 + 6_003.15 * t)
        - 0.17 * sin_d(217.6 - 407_332.21 * t);
    let parallax = 0.9508
        + 0.0518 * cos_d(135.0 + 477_198.87 * t)
        + 0.0095 * cos_d(259.3 - 413_335.36 * t)
        + 0.0078 * cos_d(235.7 + 890_534.22 * t)
        + 0.0028 * cos_d(269.9 + 954_397.74 * t);
    let distance = EARTH_RADIUS_KM / parallax.to_radians().sin() / AU_KM;
    let (lon, lat) = (lon.to_radians(), lat.to_radians());
    distance * Vector3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

/// Keplerian mean elements for the Earth-Moon barycenter and the giant
/// planets, plus a truncated lunar series. Positions are good to a few 1e-4
/// AU over 1800-2050, i.e. the light travel time to about a tenth of a
/// second. Use an [`SpkEphemeris`](super::SpkEphemeris) when that matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalyticEphemeris;

impl AnalyticEphemeris {
    /// Barycentric position of the Sun, ecliptic axes.
    fn sun(t: f64) -> Vector3<f64> {
        let total: f64 = 1.0 + GIANTS.iter().map(|(_, mu)| mu).sum::<f64>();
        GIANTS
            .iter()
            .map(|(elements, mu)| -mu / total * elements.heliocentric(t))
            .sum()
    }
}

impl Ephemeris for AnalyticEphemeris {
    fn earth_position(&self, epoch: &Epoch) -> Result<Vector3<f64>> {
        let t = (epoch.to_jde_tdb_days() - J2000_JD) / DAYS_PER_CENTURY;
        let moon_share = 1.0 / (1.0 + EARTH_MOON_MASS_RATIO);
        let ecliptic = Self::sun(t) + EM_BARY.heliocentric(t) - moon_share * moon_geocentric(t);
        Ok(ecliptic_to_equatorial(ecliptic))
    }
}

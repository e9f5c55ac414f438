//! Barycentric time correction.
//!
//! The light travel time between the observer and the solar system
//! barycenter along the line of sight is added to the observation time,
//! expressed in TDB.

use nalgebra::{Rotation3, Vector3};
use std::f64::consts::TAU;

use crate::coords::SkyCoord;
use crate::ephemeris::{Ephemeris, AU_KM};
use crate::error::{Error, Result};
use crate::time::ObsTime;

/// Light travel time across one astronomical unit, in seconds.
pub const AU_LIGHT_SECONDS: f64 = 499.004_783_836;
const J2000_JD: f64 = 2_451_545.0;

/// Observer position relative to the geocenter in AU. Only the Earth's
/// rotation is applied; precession and nutation of the pole move the
/// delay by well under a millisecond.
fn observer_offset(geocentric: Vector3<f64>, jd_ut: f64) -> Vector3<f64> {
    let era = TAU * (0.779_057_273_264 + 1.002_737_811_911_354_5 * (jd_ut - J2000_JD));
    Rotation3::from_axis_angle(&Vector3::z_axis(), era.rem_euclid(TAU)) * geocentric
        / (AU_KM * 1e3)
}

/// Light travel time in seconds from the observer to the barycenter along
/// the direction of `target`; positive when the observer is nearer the target.
pub fn light_travel_time(
    obstime: &ObsTime,
    target: &SkyCoord,
    ephemeris: &dyn Ephemeris,
) -> Result<f64> {
    let location = obstime.location.ok_or(Error::MissingLocation)?;
    let earth = ephemeris.earth_position(&obstime.to_tdb().epoch)?;
    let observer = observer_offset(location.geocentric(), obstime.jd());
    Ok((earth + observer).dot(&target.unit_vector()) * AU_LIGHT_SECONDS)
}

/// Observation time moved to the solar system barycenter, in TDB.
pub fn correct_barycentric(
    obstime: &ObsTime,
    target: &SkyCoord,
    ephemeris: &dyn Ephemeris,
) -> Result<ObsTime> {
    let delay = light_travel_time(obstime, target, ephemeris)?;
    Ok(obstime.to_tdb().add_seconds(delay))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::EarthLocation;
    use crate::ephemeris::spk::tests::{write_spk, TestSegment};
    use crate::ephemeris::spk::{EARTH, EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER};
    use crate::ephemeris::{AnalyticEphemeris, SpkEphemeris};
    use approx::assert_abs_diff_eq;
    use hifitime::{Epoch, TimeScale};

    const SPEED_OF_LIGHT_KM_S: f64 = 299_792.458;

    fn obstime() -> ObsTime {
        ObsTime::new(
            Epoch::from_jde_utc(J2000_JD),
            Some(EarthLocation::from_geodetic(28.76, -17.88, 2382.0)),
        )
    }

    #[test]
    fn test_observer_offset_is_earth_radius() {
        let site = EarthLocation::from_geodetic(28.76, -17.88, 2382.0).geocentric();
        let offset = observer_offset(site, J2000_JD + 0.37);
        assert_abs_diff_eq!(offset.norm(), site.norm() / (AU_KM * 1e3), epsilon = 1e-15);
        assert_abs_diff_eq!(offset.z, site.z / (AU_KM * 1e3), epsilon = 1e-15);
    }

    #[test]
    fn test_delay_against_kernel_geometry() {
        // Earth 1.2e8 km from the barycenter along +x, split over the
        // Earth-Moon barycenter chain; a polar observer does not move with
        // the Earth's rotation, so the delay toward (0, 0) is the x offset
        // over c.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reference.bsp");
        let year = 365.25 * 86_400.0;
        write_spk(
            &path,
            &[
                TestSegment::fixed(
                    EARTH_MOON_BARYCENTER,
                    SOLAR_SYSTEM_BARYCENTER,
                    [1.2e8 + 4_670.0, 3.0e7, -2.0e7],
                    -year,
                    2.0 * year,
                ),
                TestSegment::fixed(EARTH, EARTH_MOON_BARYCENTER, [-4_670.0, 0.0, 0.0], -year, 2.0 * year),
            ],
        );
        let kernel = SpkEphemeris::open(&path).unwrap();
        let obs = ObsTime::new(
            Epoch::from_gregorian_utc(2000, 6, 1, 3, 0, 0, 0),
            Some(EarthLocation::from_geodetic(90.0, 0.0, 0.0)),
        );
        let target = SkyCoord::new(0.0, 0.0);

        let delay = light_travel_time(&obs, &target, &kernel).unwrap();
        assert_abs_diff_eq!(delay, 1.2e8 / SPEED_OF_LIGHT_KM_S, epsilon = 1e-6);
        assert_abs_diff_eq!(delay, 400.276_914_237_782_5, epsilon = 1e-6);

        let corrected = correct_barycentric(&obs, &target, &kernel).unwrap();
        assert_abs_diff_eq!(
            (corrected.epoch - obs.to_tdb().epoch).to_seconds(),
            400.276_914_237_782_5,
            epsilon = 1e-6
        );

        // The analytic model is only good to a fraction of a second
        let analytic = light_travel_time(&obs, &target, &AnalyticEphemeris).unwrap();
        assert!((analytic - delay).abs() > 1.0);
    }

    #[test]
    fn test_kernel_coverage_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("short.bsp");
        write_spk(
            &path,
            &[
                TestSegment::fixed(EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER, [AU_KM, 0.0, 0.0], 0.0, 86_400.0),
                TestSegment::fixed(EARTH, EARTH_MOON_BARYCENTER, [0.0, 0.0, 0.0], 0.0, 86_400.0),
            ],
        );
        let kernel = SpkEphemeris::open(&path).unwrap();
        let late = ObsTime::new(
            Epoch::from_gregorian_utc_at_midnight(2010, 1, 1),
            Some(EarthLocation::from_geodetic(0.0, 0.0, 0.0)),
        );
        assert!(matches!(
            correct_barycentric(&late, &SkyCoord::new(0.0, 0.0), &kernel),
            Err(Error::Ephemeris(_))
        ));
    }

    #[test]
    fn test_correction_sign_and_scale() {
        let toward_earth = SkyCoord::new(101.0, 23.0);
        let toward_sun = SkyCoord::new(281.0, -23.0);
        let ahead = light_travel_time(&obstime(), &toward_earth, &AnalyticEphemeris).unwrap();
        let behind = light_travel_time(&obstime(), &toward_sun, &AnalyticEphemeris).unwrap();
        assert!(ahead > 480.0 && ahead < 505.0, "delay {ahead}");
        assert!(behind < -480.0 && behind > -505.0, "delay {behind}");
    }

    #[test]
    fn test_corrected_time_is_tdb() {
        let obs = obstime();
        let target = SkyCoord::new(30.0, 10.0);
        let corrected = correct_barycentric(&obs, &target, &AnalyticEphemeris).unwrap();
        let delay = light_travel_time(&obs, &target, &AnalyticEphemeris).unwrap();
        assert_eq!(corrected.epoch.time_scale, TimeScale::TDB);
        assert_abs_diff_eq!((corrected.epoch - obs.epoch).to_seconds(), delay, epsilon = 1e-6);
        // TDB runs 64.184 s ahead of UTC in 2000
        let shift = (corrected.jd_tdb() - obs.jd()) * 86_400.0;
        assert_abs_diff_eq!(shift, 64.184 + delay, epsilon = 0.01);
        assert_eq!(corrected.location, obs.location);
    }

    #[test]
    fn test_location_required() {
        let obs = ObsTime::new(Epoch::from_jde_utc(J2000_JD), None);
        assert!(matches!(
            correct_barycentric(&obs, &SkyCoord::new(0.0, 0.0), &AnalyticEphemeris),
            Err(Error::MissingLocation)
        ));
    }
}

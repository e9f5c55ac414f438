mod common;

use approx::assert_abs_diff_eq;
use common::{fits_file, sites, with_tan_wcs, with_zpn_wcs, Hdu};
use fitsnorm::time::{header_time, TimeFormat};
use fitsnorm::ephemeris::EPHEMERIS_ENV;
use fitsnorm::{AnalyticEphemeris, Error, ErrorKind, Loader, ObType, SkyCoord};
use hifitime::TimeScale;
use ndarray::Array2;

const SHAPE: (usize, usize) = (40, 40);

fn hawki_primary() -> Hdu {
    Hdu::new()
        .card("TELESCOP", "ESO-VLT-U4")
        .card("INSTRUME", "HAWKI")
        .card("ORIGIN", "ESO-PARANAL")
        .card("PRODCATG", "SCIENCE.MEFIMAGE")
        .card("ESO OCS DET1 IMGNAME", "HAWKI_img_AutoJitter")
        .card("DATE-OBS", "2021-03-04T05:06:07.000")
        .card("EXPTIME", 120.0)
        .card("FILTER", "J")
}

type Projection = fn(Hdu, f64, f64, (usize, usize)) -> Hdu;

const CHIP_CENTRES: [(f64, f64); 4] = [(150.0, 2.0), (150.02, 2.0), (150.0, 2.02), (150.02, 2.02)];

/// Four chips on a 2x2 grid, each 40 arcsec across and filled with its own index.
fn hawki_chips(dir: &tempfile::TempDir, name: &str, projection: Projection) -> std::path::PathBuf {
    let mut hdus = vec![hawki_primary()];
    for (k, (ra, dec)) in CHIP_CENTRES.iter().enumerate() {
        let chip = Hdu::new()
            .card("EXTNAME", format!("CHIP{}.INT1", k + 1))
            .data(Array2::from_elem(SHAPE, (k + 1) as f64));
        hdus.push(projection(chip, *ra, *dec, SHAPE));
    }
    fits_file(dir, name, &hdus)
}

fn hawki_file(dir: &tempfile::TempDir) -> std::path::PathBuf {
    hawki_chips(dir, "hawki.fits", with_tan_wcs)
}

#[test]
fn test_hawki_selects_chip_containing_target() {
    let dir = tempfile::tempdir().unwrap();
    let path = hawki_file(&dir);
    let loader = Loader::new()
        .with_sites(sites())
        .with_ephemeris(AnalyticEphemeris);

    let target = SkyCoord::new(150.0, 2.02);
    let loaded = loader.load(&path, Some(target)).unwrap();
    assert_eq!(loaded.instrument, "HAWKI");
    assert_eq!(loaded.extension, 3);

    let image = &loaded.image;
    assert_eq!(image.shape(), SHAPE);
    assert!(image.pixels().iter().all(|&v| v == 3.0));
    assert_eq!(image.ob_type, Some(ObType::Autojitter));
    assert_eq!(image.photfilter.as_deref(), Some("J"));
    assert_eq!(image.site.as_ref().unwrap().siteid, Some(2));
    // Header of the container is the primary header
    assert_eq!(image.header().get_string("INSTRUME").as_deref(), Some("HAWKI"));

    let obstime = image.obstime.unwrap();
    assert_eq!(obstime.epoch.time_scale, TimeScale::TDB);
}

#[test]
fn test_hawki_zenithal_polynomial_chips() {
    let dir = tempfile::tempdir().unwrap();
    let path = hawki_chips(&dir, "hawki_zpn.fits", with_zpn_wcs);
    let loader = Loader::new()
        .with_sites(sites())
        .with_ephemeris(AnalyticEphemeris);

    // Reference point of the third chip
    let loaded = loader.load(&path, Some(SkyCoord::new(150.0, 2.02))).unwrap();
    assert_eq!(loaded.extension, 3);
    assert!(loaded.image.pixels().iter().all(|&v| v == 3.0));

    let loaded = loader.load(&path, Some(SkyCoord::new(150.023, 2.003))).unwrap();
    assert_eq!(loaded.extension, 2);
}

#[test]
fn test_hawki_unusable_chip_wcs_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let unknown: Projection = |hdu, ra, dec, shape| {
        with_tan_wcs(hdu, ra, dec, shape)
            .card("CTYPE1", "RA---XYZ")
            .card("CTYPE2", "DEC--XYZ")
    };
    let path = hawki_chips(&dir, "hawki_xyz.fits", unknown);
    let err = Loader::new()
        .with_sites(sites())
        .load(&path, Some(SkyCoord::new(150.0, 2.02)))
        .unwrap_err();
    assert!(matches!(err, Error::Wcs(_)));
}

#[test]
fn test_target_without_ephemeris_kernel() {
    if std::env::var_os(EPHEMERIS_ENV).is_some() {
        return;
    }
    let dir = tempfile::tempdir().unwrap();
    let path = hawki_file(&dir);
    let err = Loader::new()
        .with_sites(sites())
        .load(&path, Some(SkyCoord::new(150.0, 2.02)))
        .unwrap_err();
    assert!(matches!(err, Error::NoEphemeris));
}

#[test]
fn test_hawki_needs_target_on_a_chip() {
    let dir = tempfile::tempdir().unwrap();
    let path = hawki_file(&dir);
    let loader = Loader::new().with_sites(sites());

    let err = loader.load(&path, None).unwrap_err();
    assert!(matches!(err, Error::TargetRequired(_)));

    let err = loader
        .load(&path, Some(SkyCoord::new(10.0, -40.0)))
        .unwrap_err();
    assert!(matches!(err, Error::TargetNotOnImage));
    assert_eq!(err.kind(), ErrorKind::NoMatch);
}

#[test]
fn test_start_time_becomes_midpoint() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_file(
        &dir,
        "efosc.fits",
        &[Hdu::new()
            .card("TELESCOP", "ESO-NTT")
            .card("INSTRUME", "EFOSC")
            .card("DATE-OBS", "2019-11-02T03:04:05.500")
            .card("EXPTIME", 300.0)
            .card("FILTER", "V641")
            .data(Array2::from_elem((8, 8), 100.0))],
    );
    let loaded = Loader::new().with_sites(sites()).load(&path, None).unwrap();
    let image = &loaded.image;
    assert_eq!(loaded.instrument, "EFOSC");
    assert_eq!(image.photfilter.as_deref(), Some("V"));

    let start = header_time(image.header(), "DATE-OBS", TimeFormat::Isot).unwrap();
    let obstime = image.obstime.unwrap();
    assert_abs_diff_eq!((obstime.epoch - start).to_seconds(), 150.0, epsilon = 1e-6);
    assert_eq!(obstime.location.unwrap().lat, -29.257);
}

fn lcogt_primary() -> Hdu {
    Hdu::new()
        .card("ORIGIN", "LCOGT")
        .card("TELESCOP", "1m0-08")
        .card("SITE", "elp")
        .card("LATITUDE", 30.67)
        .card("LONGITUD", -104.02)
        .card("HEIGHT", 2070.0)
        .card("DATE-OBS", "2022-05-06T07:08:09.000")
        .card("EXPTIME", 60.0)
        .card("FILTER", "zs")
        .data(Array2::from_elem((10, 10), 500.0))
}

#[test]
fn test_lcogt_bad_pixel_map() {
    let dir = tempfile::tempdir().unwrap();
    let mut bpm = Array2::zeros((10, 10));
    bpm[[2, 7]] = 1.0;
    bpm[[9, 0]] = 4.0;
    let path = fits_file(
        &dir,
        "lcogt.fits",
        &[lcogt_primary(), Hdu::new().card("EXTNAME", "BPM").data(bpm)],
    );
    let image = Loader::new()
        .with_sites(sites())
        .load(&path, None)
        .unwrap()
        .image;

    assert_eq!(image.peakmax, Some(60000.0));
    assert_eq!(image.photfilter.as_deref(), Some("zp"));
    assert_eq!(image.site.as_ref().unwrap().siteid, Some(1));
    assert!(image.mask()[[2, 7]]);
    assert!(image.mask()[[9, 0]]);
    assert_eq!(image.clean().unwrap().count_masked(), 2);
    assert!(image.pixels()[[2, 7]].is_nan());
}

#[test]
fn test_lcogt_without_bad_pixel_map() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_file(&dir, "lcogt.fits", &[lcogt_primary().card("SITE", "xyz")]);
    let image = Loader::new()
        .with_sites(sites())
        .load(&path, None)
        .unwrap()
        .image;
    assert!(image.mask().iter().all(|&m| !m));
    // Unknown site keyword falls back to the sentinel site
    assert_eq!(image.site.as_ref().unwrap().siteid, None);
    assert!(image.obstime.is_some());
}

#[test]
fn test_unknown_instrument() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_file(
        &dir,
        "unknown.fits",
        &[Hdu::new()
            .card("TELESCOP", "Backyard 8in")
            .card("INSTRUME", "WebCam")
            .data(Array2::zeros((4, 4)))],
    );
    let err = Loader::new().load(&path, None).unwrap_err();
    assert!(matches!(err, Error::NoInstrument { .. }));
    assert_eq!(err.kind(), ErrorKind::NoMatch);
}

fn alfosc_primary() -> Hdu {
    Hdu::new()
        .card("TELESCOP", "NOT")
        .card("INSTRUME", "ALFOSC_FASU")
        .card("OBS_MODE", "imaging")
        .card("DATE-AVG", "2020-01-02T03:04:05.000")
        .card("EXPTIME", 200.0)
        .data(Array2::from_elem((6, 6), 1.0))
}

#[test]
fn test_alfosc_filter_wheels() {
    let dir = tempfile::tempdir().unwrap();
    let loader = Loader::new().with_sites(sites());

    let one = fits_file(
        &dir,
        "one.fits",
        &[alfosc_primary()
            .card("ALFLTNM", "Open")
            .card("FAFLTNM", "g'_SDSS 480_145")
            .card("FBFLTNM", "Open")],
    );
    let image = loader.load(&one, None).unwrap().image;
    assert_eq!(image.photfilter.as_deref(), Some("gp"));
    assert_eq!(image.peakmax, Some(80000.0));
    // DATE-AVG is already the midpoint
    let recorded = header_time(image.header(), "DATE-AVG", TimeFormat::Isot).unwrap();
    assert_abs_diff_eq!(
        (image.obstime.unwrap().epoch - recorded).to_seconds(),
        0.0,
        epsilon = 1e-6
    );

    let two = fits_file(
        &dir,
        "two.fits",
        &[alfosc_primary()
            .card("ALFLTNM", "Open")
            .card("FAFLTNM", "g'_SDSS 480_145")
            .card("FBFLTNM", "r'_SDSS 618_148")],
    );
    let err = loader.load(&two, None).unwrap_err();
    assert!(matches!(err, Error::AmbiguousFilter(ref c) if c.len() == 2));
    assert_eq!(err.kind(), ErrorKind::Ambiguous);

    let keyword = fits_file(
        &dir,
        "keyword.fits",
        &[alfosc_primary().card("FILTER", "g SDSS")],
    );
    let image = loader.load(&keyword, None).unwrap().image;
    assert_eq!(image.photfilter.as_deref(), Some("gp"));
}

#[test]
fn test_non_finite_pixels_are_masked() {
    let dir = tempfile::tempdir().unwrap();
    let mut data = Array2::from_elem((5, 5), 10.0);
    data[[0, 0]] = f64::NAN;
    data[[3, 4]] = f64::INFINITY;
    data[[4, 1]] = f64::NEG_INFINITY;
    let path = fits_file(
        &dir,
        "nan.fits",
        &[alfosc_primary().card("FILTER", "V_Bes").data(data)],
    );
    let image = Loader::new()
        .with_sites(sites())
        .load(&path, None)
        .unwrap()
        .image;
    assert_eq!(image.photfilter.as_deref(), Some("V"));
    let clean = image.clean().unwrap();
    assert_eq!(clean.count_masked(), 3);
    assert!(image.mask()[[0, 0]] && image.mask()[[3, 4]] && image.mask()[[4, 1]]);
    assert_eq!(clean.compressed().len(), 22);
    assert!(clean.compressed().iter().all(|&v| v == 10.0));
}

#[test]
fn test_missing_site_fails_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = fits_file(
        &dir,
        "notcam.fits",
        &[Hdu::new()
            .card("TELESCOP", "NOT")
            .card("INSTRUME", "NOTCAM")
            .card("OBS_MODE", "imaging")
            .card("DATE-AVG", "2020-01-02T03:04:05.000")
            .card("EXPTIME", 20.0)
            .card("NCFLTNM1", "Ks")
            .card("NCFLTNM2", "Open")
            .data(Array2::zeros((4, 4)))],
    );
    // No site catalog: the fixed site id cannot be resolved
    let err = Loader::new().load(&path, None).unwrap_err();
    assert!(matches!(err, Error::SiteNotFound(5)));

    let image = Loader::new()
        .with_sites(sites())
        .load(&path, None)
        .unwrap()
        .image;
    assert_eq!(image.photfilter.as_deref(), Some("K"));
}

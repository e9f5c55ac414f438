//! Minimal FITS writer for building synthetic test files.

#![allow(dead_code)]

use fitsnorm::HeaderValue;
use ndarray::Array2;
use std::io::Write;
use std::path::{Path, PathBuf};

const BLOCK: usize = 2880;

/// One header data unit: extra header cards and optional 2-D f64 pixels.
#[derive(Debug, Clone, Default)]
pub struct Hdu {
    pub cards: Vec<(String, HeaderValue)>,
    pub data: Option<Array2<f64>>,
}

impl Hdu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn card(mut self, key: &str, value: impl Into<HeaderValue>) -> Self {
        self.cards.push((key.to_string(), value.into()));
        self
    }

    pub fn data(mut self, data: Array2<f64>) -> Self {
        self.data = Some(data);
        self
    }
}

fn format_card(key: &str, value: &HeaderValue) -> String {
    let value = match value {
        HeaderValue::Str(s) => format!("'{:<8}'", s.replace('\'', "''")),
        HeaderValue::Int(i) => format!("{i:>20}"),
        HeaderValue::Float(f) => format!("{:>20}", format_float(*f)),
        HeaderValue::Bool(b) => format!("{:>20}", if *b { "T" } else { "F" }),
    };
    let card = if key.len() > 8 || key.contains(' ') {
        format!("HIERARCH {key} = {value}")
    } else {
        format!("{key:<8}= {value}")
    };
    assert!(card.len() <= 80, "card too long: {card}");
    format!("{card:<80}")
}

fn format_float(f: f64) -> String {
    let s = format!("{f:?}");
    s.replace('e', "E")
}

fn write_hdu(out: &mut Vec<u8>, hdu: &Hdu, primary: bool) {
    let shape = hdu.data.as_ref().map(|d| d.dim());
    let mut header = String::new();
    if primary {
        header += &format_card("SIMPLE", &HeaderValue::Bool(true));
    } else {
        header += &format_card("XTENSION", &HeaderValue::Str("IMAGE".into()));
    }
    header += &format_card("BITPIX", &HeaderValue::Int(-64));
    match shape {
        Some((rows, cols)) => {
            header += &format_card("NAXIS", &HeaderValue::Int(2));
            header += &format_card("NAXIS1", &HeaderValue::Int(cols as i64));
            header += &format_card("NAXIS2", &HeaderValue::Int(rows as i64));
        }
        None => header += &format_card("NAXIS", &HeaderValue::Int(0)),
    }
    if primary {
        header += &format_card("EXTEND", &HeaderValue::Bool(true));
    } else {
        header += &format_card("PCOUNT", &HeaderValue::Int(0));
        header += &format_card("GCOUNT", &HeaderValue::Int(1));
    }
    for (key, value) in &hdu.cards {
        header += &format_card(key, value);
    }
    header += &format!("{:<80}", "END");
    out.extend_from_slice(header.as_bytes());
    pad(out, b' ');

    if let Some(data) = &hdu.data {
        for v in data.iter() {
            out.extend_from_slice(&v.to_be_bytes());
        }
        pad(out, 0);
    }
}

fn pad(out: &mut Vec<u8>, fill: u8) {
    let rem = out.len() % BLOCK;
    if rem != 0 {
        out.resize(out.len() + BLOCK - rem, fill);
    }
}

/// Write `hdus` as a FITS file; the first is the primary HDU.
pub fn write_fits(path: &Path, hdus: &[Hdu]) -> std::io::Result<()> {
    let mut out = Vec::new();
    for (i, hdu) in hdus.iter().enumerate() {
        write_hdu(&mut out, hdu, i == 0);
    }
    std::fs::File::create(path)?.write_all(&out)
}

/// Write into `dir` under `name` and return the path.
pub fn fits_file(dir: &tempfile::TempDir, name: &str, hdus: &[Hdu]) -> PathBuf {
    let path = dir.path().join(name);
    write_fits(&path, hdus).expect("write test FITS file");
    path
}

/// Celestial TAN world coordinates centred on the image, 1 arcsec pixels.
pub fn with_tan_wcs(hdu: Hdu, ra: f64, dec: f64, shape: (usize, usize)) -> Hdu {
    let scale = 1.0 / 3600.0;
    hdu.card("CTYPE1", "RA---TAN")
        .card("CTYPE2", "DEC--TAN")
        .card("CRPIX1", (shape.1 as f64 + 1.0) / 2.0)
        .card("CRPIX2", (shape.0 as f64 + 1.0) / 2.0)
        .card("CRVAL1", ra)
        .card("CRVAL2", dec)
        .card("CD1_1", -scale)
        .card("CD1_2", 0.0)
        .card("CD2_1", 0.0)
        .card("CD2_2", scale)
}

/// Zenithal polynomial world coordinates with the reference point at the
/// image centre, 1 arcsec pixels.
pub fn with_zpn_wcs(hdu: Hdu, ra: f64, dec: f64, shape: (usize, usize)) -> Hdu {
    with_tan_wcs(hdu, ra, dec, shape)
        .card("CTYPE1", "RA---ZPN")
        .card("CTYPE2", "DEC--ZPN")
        .card("PV2_1", 1.0)
        .card("PV2_3", 0.3)
}

pub const SITES: &str = r#"[
    {"siteid": 1, "sitename": "LCOGT node at McDonald Observatory", "site_keyword": "elp",
     "location": {"lat": 30.67, "lon": -104.02, "height": 2070.0}},
    {"siteid": 2, "sitename": "ESO Paranal Observatory", "site_keyword": "VLT",
     "location": {"lat": -24.627, "lon": -70.404, "height": 2635.0}},
    {"siteid": 5, "sitename": "Nordic Optical Telescope", "site_keyword": "NOT",
     "location": {"lat": 28.757, "lon": -17.885, "height": 2382.0}},
    {"siteid": 15, "sitename": "ESO La Silla Observatory", "site_keyword": "NTT",
     "location": {"lat": -29.257, "lon": -70.738, "height": 2400.0}}
]"#;

pub fn sites() -> fitsnorm::SiteCatalog {
    fitsnorm::SiteCatalog::from_json_str(SITES).expect("valid site catalog")
}

//! Celestial world coordinate system of an image HDU.
//!
//! The projection work is done by the `wcs` crate, which covers the zenithal,
//! cylindrical, conic and other FITS projections together with SIP and TPV
//! distortion. This module feeds it the WCS cards of a [`Header`] and works in
//! 0-based pixel coordinates (the centre of the first pixel is `(0, 0)`),
//! matching array indexing.

use log::trace;
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use wcs::{ImgXY, LonLat, WCSParams, WCS};

use crate::coords::SkyCoord;
use crate::error::{Error, Result};
use crate::header::{Header, HeaderValue};

/// Keys copied as strings; every other WCS key is numeric.
const STRING_KEYS: &[&str] = &["CTYPE1", "CTYPE2", "CTYPE3", "RADESYS"];

/// Prefixes of the numeric keys that take part in the transform.
const NUMERIC_PREFIXES: &[&str] = &[
    "NAXIS", "ZNAXIS", "CRPIX", "CRVAL", "CDELT", "CROTA", "A_", "B_", "AP_", "BP_", "LONPOLE",
    "LATPOLE", "EQUINOX",
];

/// Matrix and projection parameter keys: `CDi_j`, `PCi_j`, `PVi_m`.
fn is_indexed_key(key: &str) -> bool {
    ["CD", "PC", "PV"].iter().any(|p| {
        key.strip_prefix(p)
            .and_then(|rest| rest.split_once('_'))
            .is_some_and(|(i, m)| {
                !i.is_empty()
                    && !m.is_empty()
                    && i.bytes().all(|b| b.is_ascii_digit())
                    && m.bytes().all(|b| b.is_ascii_digit())
            })
    })
}

/// Integer valued keys.
fn is_integer_key(key: &str) -> bool {
    key.starts_with("NAXIS") || key.starts_with("ZNAXIS") || key.ends_with("_ORDER")
}

/// Pixel <-> sky transform built from one header.
#[derive(Debug, Clone)]
pub struct Wcs {
    inner: Arc<WCS>,
}

impl Wcs {
    /// Build the celestial WCS of `header`.
    ///
    /// Returns `Ok(None)` when the header carries no celestial axes at all, and
    /// an error when it does but they cannot be used, including projections
    /// the transform does not implement.
    pub fn from_header(header: &Header) -> Result<Option<Self>> {
        let (ctype1, ctype2) = match (header.get_string("CTYPE1"), header.get_string("CTYPE2")) {
            (Some(c1), Some(c2)) => (c1, c2),
            _ => return Ok(None),
        };
        if ctype1.len() < 8 || ctype2.len() < 8 {
            return Err(Error::Wcs(format!(
                "unsupported axis types {ctype1:?}/{ctype2:?}"
            )));
        }

        let params: WCSParams = serde_json::from_value(Value::Object(wcs_cards(header)))
            .map_err(|e| Error::Wcs(format!("unusable WCS cards: {e}")))?;
        let inner = WCS::new(&params)
            .map_err(|e| Error::Wcs(format!("{ctype1}/{ctype2}: {e}")))?;
        Ok(Some(Self {
            inner: Arc::new(inner),
        }))
    }

    /// Sky position of the 0-based pixel `(x, y)`, or `None` outside the
    /// projection's domain.
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Option<SkyCoord> {
        let lonlat = self.inner.unproj(&ImgXY::new(x + 1.0, y + 1.0))?;
        Some(SkyCoord::new(
            lonlat.lon().to_degrees().rem_euclid(360.0),
            lonlat.lat().to_degrees(),
        ))
    }

    /// 0-based pixel position of `coord`, or `None` when it cannot be
    /// projected (e.g. behind the tangent plane).
    pub fn world_to_pixel(&self, coord: &SkyCoord) -> Option<(f64, f64)> {
        let lonlat = LonLat::new(coord.ra.to_radians(), coord.dec.to_radians());
        let xy = self.inner.proj(&lonlat)?;
        (xy.x().is_finite() && xy.y().is_finite()).then(|| (xy.x() - 1.0, xy.y() - 1.0))
    }

    /// Whether `coord` projects onto an image of `shape` (rows, columns),
    /// allowing half a pixel beyond each edge.
    pub fn footprint_contains(&self, coord: &SkyCoord, shape: (usize, usize)) -> bool {
        let (rows, cols) = shape;
        match self.world_to_pixel(coord) {
            Some((x, y)) => {
                (-0.5..=cols as f64 - 0.5).contains(&x) && (-0.5..=rows as f64 - 0.5).contains(&y)
            }
            None => false,
        }
    }
}

/// The WCS cards of `header` as a JSON object keyed by FITS keyword.
fn wcs_cards(header: &Header) -> Map<String, Value> {
    let mut cards = Map::new();
    for (key, value) in header.iter() {
        let key = key.to_ascii_uppercase();
        let json = if STRING_KEYS.contains(&key.as_str()) {
            value.as_str().map(|s| Value::String(s.to_string()))
        } else if is_indexed_key(&key) || NUMERIC_PREFIXES.iter().any(|p| key.starts_with(p)) {
            numeric_card(&key, value)
        } else {
            continue;
        };
        match json {
            Some(json) => {
                cards.insert(key, json);
            }
            None => trace!("ignoring WCS card {key} = {value}"),
        }
    }
    // Headers assembled by hand may leave out the axis count
    cards
        .entry("NAXIS")
        .or_insert_with(|| Value::Number(Number::from(2)));
    cards
}

fn numeric_card(key: &str, value: &HeaderValue) -> Option<Value> {
    if is_integer_key(key) {
        let v = match value {
            HeaderValue::Int(i) => *i,
            other => {
                let f = other.as_f64()?;
                (f.fract() == 0.0).then_some(f as i64)?
            }
        };
        Some(Value::Number(Number::from(v)))
    } else {
        Number::from_f64(value.as_f64()?).map(Value::Number)
    }
}

//! Observation timestamps and the header time formats instruments use.

use hifitime::{Epoch, TimeScale, Unit};
use std::fmt;

use crate::coords::EarthLocation;
use crate::error::{Error, Result};
use crate::header::{Header, HeaderValue};

/// How a header value encodes a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeFormat {
    /// Julian date (UTC)
    Jd,
    /// Modified Julian date (UTC)
    Mjd,
    /// `YYYY-MM-DDThh:mm:ss[.fff]` (UTC)
    Isot,
    /// `YYYY-MM-DD hh:mm:ss[.fff]` (UTC)
    Iso,
}

/// Observation time together with the observatory it was recorded at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObsTime {
    pub epoch: Epoch,
    pub location: Option<EarthLocation>,
}

impl ObsTime {
    pub fn new(epoch: Epoch, location: Option<EarthLocation>) -> Self {
        Self { epoch, location }
    }

    pub fn jd(&self) -> f64 {
        self.epoch.to_jde_utc_days()
    }

    pub fn mjd(&self) -> f64 {
        self.epoch.to_mjd_utc_days()
    }

    pub fn jd_tdb(&self) -> f64 {
        self.epoch.to_jde_tdb_days()
    }

    /// Shift by a number of seconds.
    pub fn add_seconds(self, seconds: f64) -> Self {
        Self {
            epoch: self.epoch + Unit::Second * seconds,
            ..self
        }
    }

    /// Same instant expressed in barycentric dynamical time.
    pub fn to_tdb(self) -> Self {
        Self {
            epoch: self.epoch.to_time_scale(TimeScale::TDB),
            ..self
        }
    }

    /// Midpoint between two times; the location of `self` is kept.
    pub fn midpoint(self, other: ObsTime) -> Self {
        let half = (other.epoch - self.epoch).to_seconds() / 2.0;
        self.add_seconds(half)
    }
}

impl fmt::Display for ObsTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.epoch)
    }
}

/// Parse a header value in the given format into a UTC epoch.
pub fn parse_time(value: &HeaderValue, format: TimeFormat) -> Result<Epoch> {
    match format {
        TimeFormat::Jd => numeric(value).map(Epoch::from_jde_utc),
        TimeFormat::Mjd => numeric(value).map(Epoch::from_mjd_utc),
        TimeFormat::Isot | TimeFormat::Iso => {
            let text = value.as_str().ok_or_else(|| Error::InvalidTime {
                value: value.to_string(),
                reason: "expected a date string".into(),
            })?;
            parse_calendar(text)
        }
    }
}

/// Read `key` from `header` as a time in `format`.
pub fn header_time(header: &Header, key: &str, format: TimeFormat) -> Result<Epoch> {
    let value = header
        .get(key)
        .ok_or_else(|| Error::MissingHeader(key.to_string()))?;
    parse_time(value, format)
}

fn numeric(value: &HeaderValue) -> Result<f64> {
    value.as_f64().ok_or_else(|| Error::InvalidTime {
        value: value.to_string(),
        reason: "expected a number of days".into(),
    })
}

/// ISO 8601 calendar time; a space may replace the `T`, and a `Z`, UTC
/// offset or time scale suffix is honoured. The result is in UTC.
fn parse_calendar(text: &str) -> Result<Epoch> {
    Epoch::from_gregorian_str(text.trim())
        .map(|epoch| epoch.to_time_scale(TimeScale::UTC))
        .map_err(|e| Error::InvalidTime {
            value: text.to_string(),
            reason: e.to_string(),
        })
}

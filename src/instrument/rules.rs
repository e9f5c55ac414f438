//! Building blocks of an instrument variant. Each rule's `Default` is the
//! behaviour shared by instruments that do not override it.

use log::{debug, warn};
use ndarray::Array2;
use std::ops::RangeInclusive;

use super::Identity;
use crate::coords::{EarthLocation, SkyCoord};
use crate::error::{Error, Result};
use crate::filters;
use crate::fits::{image_shape, FitsHandle};
use crate::header::{Header, HeaderValue};
use crate::image::ImageContainer;
use crate::site::{Site, SiteLookup};
use crate::time::{header_time, ObsTime, TimeFormat};
use crate::wcs::Wcs;

/// Label translation table, instrument label to canonical name.
pub type Table = &'static [(&'static str, &'static str)];

fn translate(table: Table, label: &str) -> Option<&'static str> {
    table.iter().find(|(from, _)| *from == label).map(|(_, to)| *to)
}

fn required<'h>(header: &'h Header, key: &str) -> Result<&'h HeaderValue> {
    header
        .get(key)
        .ok_or_else(|| Error::MissingHeader(key.to_string()))
}

fn required_f64(header: &Header, key: &str) -> Result<f64> {
    required(header, key)?
        .as_f64()
        .ok_or_else(|| Error::InvalidHeader {
            key: key.to_string(),
            reason: "not a number".into(),
        })
}

// ---------------------------------------------------------------------------
// Matching
// ---------------------------------------------------------------------------

/// Exact value required for a header key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HeaderMatch {
    Str(&'static str),
    Num(f64),
}

impl HeaderMatch {
    /// Typed equality; a numeric string never matches `Num`.
    pub fn matches(&self, value: Option<&HeaderValue>) -> bool {
        match (self, value) {
            (HeaderMatch::Str(s), Some(HeaderValue::Str(v))) => v == s,
            (HeaderMatch::Num(n), Some(HeaderValue::Int(v))) => *v as f64 == *n,
            (HeaderMatch::Num(n), Some(HeaderValue::Float(v))) => v == n,
            _ => false,
        }
    }
}

/// Criteria-based identification. Empty strings and an empty key set mean
/// "no constraint", so a value with no criteria matches every file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchCriteria {
    /// Substring of TELESCOP
    pub telescope: &'static str,
    /// Exact ORIGIN
    pub origin: &'static str,
    /// Substring of INSTRUME
    pub instrument: &'static str,
    /// Keys that must be present with exactly these values
    pub unique_headers: Vec<(&'static str, HeaderMatch)>,
}

impl MatchCriteria {
    pub fn matches(&self, identity: &Identity<'_>, header: &Header) -> bool {
        (self.telescope.is_empty() || identity.telescope.contains(self.telescope))
            && (self.origin.is_empty() || identity.origin == self.origin)
            && (self.instrument.is_empty() || identity.instrument.contains(self.instrument))
            && self
                .unique_headers
                .iter()
                .all(|(key, expected)| expected.matches(header.get(key)))
    }

    pub fn is_catch_all(&self) -> bool {
        self.telescope.is_empty()
            && self.origin.is_empty()
            && self.instrument.is_empty()
            && self.unique_headers.is_empty()
    }

    /// Whether every file matching `other` also matches `self`.
    pub fn covers(&self, other: &MatchCriteria) -> bool {
        let substring_covers = |mine: &str, theirs: &str| {
            mine.is_empty() || (!theirs.is_empty() && theirs.contains(mine))
        };
        substring_covers(self.telescope, other.telescope)
            && (self.origin.is_empty() || self.origin == other.origin)
            && substring_covers(self.instrument, other.instrument)
            && self
                .unique_headers
                .iter()
                .all(|required| other.unique_headers.contains(required))
    }
}

/// How a variant recognises its files.
#[derive(Clone)]
pub enum Matcher {
    Criteria(MatchCriteria),
    /// Hand-written predicate for dialects the criteria cannot express
    Custom(fn(&Identity<'_>, &Header) -> bool),
}

impl std::fmt::Debug for Matcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Matcher::Criteria(criteria) => f.debug_tuple("Criteria").field(criteria).finish(),
            Matcher::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Matcher::Criteria(MatchCriteria::default())
    }
}

impl Matcher {
    pub fn matches(&self, identity: &Identity<'_>, header: &Header) -> bool {
        match self {
            Matcher::Criteria(criteria) => criteria.matches(identity, header),
            Matcher::Custom(predicate) => predicate(identity, header),
        }
    }
}

// ---------------------------------------------------------------------------
// Site
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SiteRule {
    /// The variant's configured site id; no site when none is configured.
    #[default]
    Fixed,
    /// Match the header value of this key against `site_keyword` of all
    /// known sites, falling back to the sentinel site.
    HeaderKeyword(&'static str),
}

impl SiteRule {
    pub fn resolve(
        &self,
        siteid: Option<i64>,
        header: &Header,
        sites: &dyn SiteLookup,
    ) -> Result<Option<Site>> {
        match self {
            SiteRule::Fixed => siteid.map(|id| sites.get_site(id)).transpose(),
            SiteRule::HeaderKeyword(key) => {
                let keyword = required(header, key)?.to_string();
                let site = sites
                    .get_all_sites()?
                    .into_iter()
                    .find(|s| s.site_keyword == keyword)
                    .unwrap_or_else(|| {
                        debug!("no site with keyword {keyword:?}, using sentinel site");
                        Site::none()
                    });
                Ok(Some(site))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Exposure time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ExptimeRule {
    /// Seconds from a single keyword
    Keyword(&'static str),
    /// Single-frame exposure time multiplied by the integer number of combined frames
    TimesCount {
        key: &'static str,
        count: &'static str,
    },
    /// First keyword present wins
    FirstOf(Vec<&'static str>),
}

impl Default for ExptimeRule {
    fn default() -> Self {
        ExptimeRule::Keyword("EXPTIME")
    }
}

impl ExptimeRule {
    pub fn resolve(&self, header: &Header) -> Result<f64> {
        match self {
            ExptimeRule::Keyword(key) => required_f64(header, key),
            ExptimeRule::TimesCount { key, count } => {
                let exptime = required_f64(header, key)?;
                let n = header.get_i64(count).ok_or_else(|| {
                    if header.contains(count) {
                        Error::InvalidHeader {
                            key: count.to_string(),
                            reason: "not an integer".into(),
                        }
                    } else {
                        Error::MissingHeader(count.to_string())
                    }
                })?;
                Ok(exptime * n as f64)
            }
            ExptimeRule::FirstOf(keys) => {
                let key = keys
                    .iter()
                    .find(|k| header.contains(k))
                    .ok_or_else(|| Error::MissingHeader(keys.join(" or ")))?;
                required_f64(header, key)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Observation time
// ---------------------------------------------------------------------------

/// One header time keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeKey {
    pub key: &'static str,
    pub format: TimeFormat,
    /// The keyword records exposure start; half the exposure time is added
    pub is_start: bool,
}

impl TimeKey {
    pub const fn start(key: &'static str, format: TimeFormat) -> Self {
        Self {
            key,
            format,
            is_start: true,
        }
    }

    /// The keyword already records the exposure midpoint (or is used as recorded).
    pub const fn midpoint(key: &'static str, format: TimeFormat) -> Self {
        Self {
            key,
            format,
            is_start: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TimeSource {
    /// First keyword present wins
    FirstOf(Vec<TimeKey>),
    /// Midpoint of explicit start and stop keywords
    Interval {
        start: &'static str,
        stop: &'static str,
        format: TimeFormat,
    },
}

/// Where the observatory location attached to the time comes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LocationRule {
    /// Location of the resolved site; required
    #[default]
    Site,
    /// Geodetic latitude, longitude (degrees) and height (metres) keywords
    Header {
        lat: &'static str,
        lon: &'static str,
        height: &'static str,
    },
}

impl LocationRule {
    fn resolve(&self, image: &ImageContainer) -> Result<EarthLocation> {
        match self {
            LocationRule::Site => image
                .site
                .as_ref()
                .and_then(|s| s.location)
                .ok_or(Error::MissingLocation),
            LocationRule::Header { lat, lon, height } => {
                let header = image.header();
                Ok(EarthLocation::from_geodetic(
                    required_f64(header, lat)?,
                    required_f64(header, lon)?,
                    required_f64(header, height)?,
                ))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObstimeRule {
    pub source: TimeSource,
    pub location: LocationRule,
}

impl Default for ObstimeRule {
    /// Julian date keyword `JD`, used as recorded.
    fn default() -> Self {
        Self::from_key(TimeKey::midpoint("JD", TimeFormat::Jd))
    }
}

impl ObstimeRule {
    pub fn from_key(key: TimeKey) -> Self {
        Self::first_of(vec![key])
    }

    pub fn first_of(keys: Vec<TimeKey>) -> Self {
        Self {
            source: TimeSource::FirstOf(keys),
            location: LocationRule::Site,
        }
    }

    pub fn interval(start: &'static str, stop: &'static str, format: TimeFormat) -> Self {
        Self {
            source: TimeSource::Interval {
                start,
                stop,
                format,
            },
            location: LocationRule::Site,
        }
    }

    pub fn with_location(mut self, location: LocationRule) -> Self {
        self.location = location;
        self
    }

    /// Needs `image.exptime` for start-time keywords and `image.site` for
    /// [`LocationRule::Site`].
    pub fn resolve(&self, image: &ImageContainer) -> Result<ObsTime> {
        let location = Some(self.location.resolve(image)?);
        let header = image.header();
        match &self.source {
            TimeSource::FirstOf(keys) => {
                let key = keys
                    .iter()
                    .find(|k| header.contains(k.key))
                    .or(keys.last())
                    .ok_or_else(|| Error::MissingHeader("observation time".into()))?;
                let obstime = ObsTime::new(header_time(header, key.key, key.format)?, location);
                if key.is_start {
                    let exptime = image.exptime.ok_or_else(|| {
                        Error::MissingHeader("exposure time for midpoint correction".into())
                    })?;
                    Ok(obstime.add_seconds(0.5 * exptime))
                } else {
                    Ok(obstime)
                }
            }
            TimeSource::Interval {
                start,
                stop,
                format,
            } => {
                let start = ObsTime::new(header_time(header, start, *format)?, location);
                let stop = ObsTime::new(header_time(header, stop, *format)?, location);
                Ok(start.midpoint(stop))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

/// Clean-up applied to a filter label before table lookup.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Normalize {
    #[default]
    Verbatim,
    UnderscoreToSpace,
    CollapseDoubleSpace,
}

impl Normalize {
    fn apply(self, label: &str) -> String {
        match self {
            Normalize::Verbatim => label.to_string(),
            Normalize::UnderscoreToSpace => label.replace('_', " "),
            Normalize::CollapseDoubleSpace => label.replace("  ", " "),
        }
    }
}

/// A label read from the header and translated through a table. Labels not
/// in the table are returned untranslated.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterKey {
    pub key: &'static str,
    pub table: Table,
    pub normalize: Normalize,
}

impl FilterKey {
    pub fn new(key: &'static str, table: Table) -> Self {
        Self {
            key,
            table,
            normalize: Normalize::Verbatim,
        }
    }

    pub fn normalized(mut self, normalize: Normalize) -> Self {
        self.normalize = normalize;
        self
    }

    fn translate(&self, label: &str) -> String {
        translate(self.table, &self.normalize.apply(label))
            .map(str::to_string)
            .unwrap_or_else(|| label.to_string())
    }
}

/// Several filter-wheel keywords of which exactly one may hold a filter
/// other than "open".
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSearch {
    pub keys: Vec<&'static str>,
    pub table: Table,
    pub normalize: Normalize,
}

impl FilterSearch {
    fn resolve(&self, header: &Header) -> Result<String> {
        let used: Vec<String> = self
            .keys
            .iter()
            .filter_map(|key| header.get_string(key))
            .map(|label| label.trim().to_string())
            .filter(|label| !label.is_empty() && label.to_lowercase() != "open")
            .collect();
        match used.as_slice() {
            [label] => Ok(translate(self.table, &self.normalize.apply(label))
                .map(str::to_string)
                .unwrap_or_else(|| label.clone())),
            _ => Err(Error::AmbiguousFilter(used)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FilterRule {
    Keyword(FilterKey),
    /// The keyword when present, otherwise a search of filter-wheel keywords
    KeywordOrSearch {
        keyword: FilterKey,
        search: FilterSearch,
    },
    /// Only the search; the `forbidden` keyword must be absent
    SearchOnly {
        forbidden: &'static str,
        search: FilterSearch,
    },
    /// Match the label against the canonical filter table: `x-sloan` style
    /// labels become `xp`, then the label itself, the label plus `p` and,
    /// when enabled, its first letter are tried.
    Canonical {
        key: &'static str,
        first_letter: bool,
    },
}

impl Default for FilterRule {
    fn default() -> Self {
        FilterRule::Keyword(FilterKey::new("FILTER", &[]))
    }
}

impl FilterRule {
    pub fn resolve(&self, instrument: &str, header: &Header) -> Result<String> {
        match self {
            FilterRule::Keyword(keyword) => {
                let label = required(header, keyword.key)?.to_string();
                Ok(keyword.translate(&label))
            }
            FilterRule::KeywordOrSearch { keyword, search } => match header.get(keyword.key) {
                Some(value) => Ok(keyword.translate(&value.to_string())),
                None => search.resolve(header),
            },
            FilterRule::SearchOnly { forbidden, search } => {
                if header.contains(forbidden) {
                    return Err(Error::UnexpectedFilterKeyword {
                        instrument: instrument.to_string(),
                        key: forbidden.to_string(),
                    });
                }
                search.resolve(header)
            }
            FilterRule::Canonical { key, first_letter } => {
                let label = required(header, key)?.to_string();
                canonical_filter(&label, *first_letter)
            }
        }
    }
}

fn canonical_filter(label: &str, first_letter: bool) -> Result<String> {
    let first = label.chars().next().map(String::from).unwrap_or_default();
    if label.to_lowercase().contains("sloan") {
        return Ok(format!("{first}p"));
    }
    if filters::is_canonical(label) {
        return Ok(label.to_string());
    }
    let with_p = format!("{label}p");
    if filters::is_canonical(&with_p) {
        return Ok(with_p);
    }
    if first_letter && filters::is_canonical(&first) {
        return Ok(first);
    }
    Err(Error::UnknownFilter {
        filter: label.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Extension and mask
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq)]
pub enum ExtRule {
    /// Science pixels in the primary HDU
    #[default]
    Primary,
    /// Search these extensions for the one whose footprint holds the target
    TargetSearch {
        extensions: RangeInclusive<usize>,
        fallback: Option<usize>,
    },
}

impl ExtRule {
    pub fn resolve(
        &self,
        instrument: &str,
        file: &FitsHandle,
        target: Option<&SkyCoord>,
    ) -> Result<usize> {
        match self {
            ExtRule::Primary => Ok(0),
            ExtRule::TargetSearch {
                extensions,
                fallback,
            } => {
                let target = target.ok_or_else(|| Error::TargetRequired(instrument.to_string()))?;
                match find_target_extension(file.headers(), extensions.clone(), target)? {
                    Some(ext) => Ok(ext),
                    None => fallback.ok_or(Error::TargetNotOnImage),
                }
            }
        }
    }
}

/// First extension in `extensions` whose world coordinate footprint contains
/// `target`, within half a pixel of its edges. Extensions past the end of the
/// file are not searched, nor are extensions without celestial axes. A
/// celestial WCS that cannot be evaluated is an error.
pub fn find_target_extension(
    headers: &[Header],
    extensions: RangeInclusive<usize>,
    target: &SkyCoord,
) -> Result<Option<usize>> {
    for k in extensions {
        let Some(header) = headers.get(k) else {
            break;
        };
        let shape = image_shape(header).ok_or_else(|| {
            Error::MissingHeader(format!("NAXIS1/NAXIS2 of extension {k}"))
        })?;
        let Some(wcs) = Wcs::from_header(header).map_err(|e| match e {
            Error::Wcs(reason) => Error::Wcs(format!("extension {k}: {reason}")),
            other => other,
        })?
        else {
            debug!("extension {k} has no celestial WCS, skipping");
            continue;
        };
        if wcs.footprint_contains(target, shape) {
            debug!("target ({}, {}) lies on extension {k}", target.ra, target.dec);
            return Ok(Some(k));
        }
    }
    Ok(None)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum MaskRule {
    #[default]
    None,
    /// Bad-pixel map in the extension with this EXTNAME; non-zero is bad.
    /// A missing extension is tolerated with a warning.
    Extension(&'static str),
}

impl MaskRule {
    pub fn resolve(&self, instrument: &str, file: &mut FitsHandle) -> Result<Option<Array2<bool>>> {
        match self {
            MaskRule::None => Ok(None),
            MaskRule::Extension(name) => match file.find_extension(name) {
                Some(index) => {
                    let bpm = file.read_image(index)?;
                    Ok(Some(bpm.mapv(|v| v != 0.0)))
                }
                None => {
                    warn!("{instrument} image does not contain bad pixel map. Not applying mask.");
                    Ok(None)
                }
            },
        }
    }
}

use ndarray::Array2;

use super::rules::{
    ExptimeRule, ExtRule, FilterRule, MaskRule, MatchCriteria, Matcher, ObstimeRule, SiteRule,
};
use super::{Identity, Instrument};
use crate::coords::SkyCoord;
use crate::error::{Error, Result};
use crate::fits::FitsHandle;
use crate::header::Header;
use crate::image::{ImageContainer, InstrumentDefaults, ObType};
use crate::site::{Site, SiteLookup};
use crate::time::ObsTime;

/// One supported telescope/instrument combination.
///
/// Start from [`Variant::new`], which carries the default rule for every
/// capability, and override only what the instrument does differently.
#[derive(Debug, Clone)]
pub struct Variant {
    name: &'static str,
    matcher: Matcher,
    siteid: Option<i64>,
    peakmax: Option<f64>,
    site: SiteRule,
    exptime: ExptimeRule,
    obstime: ObstimeRule,
    filter: FilterRule,
    ext: ExtRule,
    mask: MaskRule,
    ob_type_key: Option<&'static str>,
    defaults: InstrumentDefaults,
}

impl Variant {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            matcher: Matcher::default(),
            siteid: None,
            peakmax: None,
            site: SiteRule::default(),
            exptime: ExptimeRule::default(),
            obstime: ObstimeRule::default(),
            filter: FilterRule::default(),
            ext: ExtRule::default(),
            mask: MaskRule::default(),
            ob_type_key: None,
            defaults: InstrumentDefaults::default(),
        }
    }

    pub fn matching(mut self, criteria: MatchCriteria) -> Self {
        self.matcher = Matcher::Criteria(criteria);
        self
    }

    pub fn matched_by(mut self, predicate: fn(&Identity<'_>, &Header) -> bool) -> Self {
        self.matcher = Matcher::Custom(predicate);
        self
    }

    pub fn siteid(mut self, siteid: i64) -> Self {
        self.siteid = Some(siteid);
        self
    }

    pub fn peakmax(mut self, peakmax: f64) -> Self {
        self.peakmax = Some(peakmax);
        self
    }

    pub fn site(mut self, rule: SiteRule) -> Self {
        self.site = rule;
        self
    }

    pub fn exptime(mut self, rule: ExptimeRule) -> Self {
        self.exptime = rule;
        self
    }

    pub fn obstime(mut self, rule: ObstimeRule) -> Self {
        self.obstime = rule;
        self
    }

    pub fn filter(mut self, rule: FilterRule) -> Self {
        self.filter = rule;
        self
    }

    pub fn ext(mut self, rule: ExtRule) -> Self {
        self.ext = rule;
        self
    }

    pub fn mask(mut self, rule: MaskRule) -> Self {
        self.mask = rule;
        self
    }

    /// Derive the observation block type from the last `_` token of this keyword.
    pub fn ob_type_from(mut self, key: &'static str) -> Self {
        self.ob_type_key = Some(key);
        self
    }

    pub fn defaults(mut self, defaults: InstrumentDefaults) -> Self {
        self.defaults = defaults;
        self
    }
}

fn parse_ob_type(value: &str) -> Result<ObType> {
    let token = value.rsplit('_').next().unwrap_or(value);
    if token.contains("Auto") {
        Ok(ObType::Autojitter)
    } else if token.contains("Fixed") {
        Ok(ObType::FixedOffset)
    } else {
        Err(Error::ObType(token.to_string()))
    }
}

impl Instrument for Variant {
    fn name(&self) -> &str {
        self.name
    }

    fn identifier(&self, identity: &Identity<'_>, header: &Header) -> bool {
        self.matcher.matches(identity, header)
    }

    fn match_criteria(&self) -> Option<&MatchCriteria> {
        match &self.matcher {
            Matcher::Criteria(criteria) => Some(criteria),
            Matcher::Custom(_) => None,
        }
    }

    fn peakmax(&self) -> Option<f64> {
        self.peakmax
    }

    fn get_site(&self, image: &ImageContainer, sites: &dyn SiteLookup) -> Result<Option<Site>> {
        self.site.resolve(self.siteid, image.header(), sites)
    }

    fn get_exptime(&self, image: &ImageContainer) -> Result<f64> {
        self.exptime.resolve(image.header())
    }

    fn get_obstime(&self, image: &ImageContainer) -> Result<ObsTime> {
        self.obstime.resolve(image)
    }

    fn get_photfilter(&self, image: &ImageContainer) -> Result<String> {
        self.filter.resolve(self.name, image.header())
    }

    fn get_ext(&self, file: &FitsHandle, target: Option<&SkyCoord>) -> Result<usize> {
        self.ext.resolve(self.name, file, target)
    }

    fn get_mask(&self, file: &mut FitsHandle) -> Result<Option<Array2<bool>>> {
        self.mask.resolve(self.name, file)
    }

    fn prepare(&self, image: &mut ImageContainer) -> Result<()> {
        if let Some(key) = self.ob_type_key {
            let value = image
                .header()
                .get_string(key)
                .ok_or_else(|| Error::MissingHeader(key.to_string()))?;
            image.ob_type = Some(parse_ob_type(&value)?);
        }
        Ok(())
    }

    fn instrument_defaults(&self) -> InstrumentDefaults {
        self.defaults
    }
}

//! Instrument capability set and the per-instrument extraction rules.
//!
//! Every supported telescope/instrument combination is one [`Variant`]: an
//! immutable rule-set value assembled from defaults plus named overrides.
//! The [`registry`] holds them in dispatch priority order.

pub mod registry;
pub mod rules;
mod variant;
pub mod variants;

use ndarray::Array2;

use crate::coords::SkyCoord;
use crate::error::Result;
use crate::fits::FitsHandle;
use crate::header::Header;
use crate::image::{ImageContainer, InstrumentDefaults};
use crate::site::{Site, SiteLookup};
use crate::time::ObsTime;

pub use registry::{builtin, Registry, RegistryBuilder};
pub use rules::MatchCriteria;
pub use variant::Variant;

/// Primary-header identification fields (`TELESCOP`, `ORIGIN`, `INSTRUME`).
/// Absent keywords are empty strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identity<'a> {
    pub telescope: &'a str,
    pub origin: &'a str,
    pub instrument: &'a str,
}

/// What the loader needs from an instrument.
///
/// Implementations are stateless and shared between loads; all per-image
/// state lives in the [`ImageContainer`] being normalized.
pub trait Instrument: Send + Sync {
    fn name(&self) -> &str;

    /// Whether files with this identity and primary header belong to this instrument.
    fn identifier(&self, identity: &Identity<'_>, header: &Header) -> bool;

    /// Declarative match criteria, when the predicate is criteria-based.
    /// Custom predicates return `None` and are opaque to reachability checks.
    fn match_criteria(&self) -> Option<&MatchCriteria> {
        None
    }

    fn peakmax(&self) -> Option<f64> {
        None
    }

    fn get_site(&self, image: &ImageContainer, sites: &dyn SiteLookup) -> Result<Option<Site>>;

    fn get_exptime(&self, image: &ImageContainer) -> Result<f64>;

    fn get_obstime(&self, image: &ImageContainer) -> Result<ObsTime>;

    fn get_photfilter(&self, image: &ImageContainer) -> Result<String>;

    /// Index of the HDU holding the science pixels.
    fn get_ext(&self, _file: &FitsHandle, _target: Option<&SkyCoord>) -> Result<usize> {
        Ok(0)
    }

    /// Instrument-supplied bad-pixel mask; non-finite pixels are masked regardless.
    fn get_mask(&self, _file: &mut FitsHandle) -> Result<Option<Array2<bool>>> {
        Ok(None)
    }

    /// Per-image checks run when the instrument is bound to a fresh container.
    fn prepare(&self, _image: &mut ImageContainer) -> Result<()> {
        Ok(())
    }

    fn instrument_defaults(&self) -> InstrumentDefaults {
        InstrumentDefaults::default()
    }

    /// Fill in the container's metadata and materialize the masked image.
    ///
    /// Fields are resolved in order (site, exposure time, observation time,
    /// filter) because later rules read earlier results.
    fn process_image(&self, image: &mut ImageContainer, sites: &dyn SiteLookup) -> Result<()> {
        image.peakmax = self.peakmax();
        image.site = self.get_site(image, sites)?;
        image.exptime = Some(self.get_exptime(image)?);
        image.obstime = Some(self.get_obstime(image)?);
        image.photfilter = Some(self.get_photfilter(image)?);
        image.create_masked_image();
        image.instrument_defaults = Some(self.instrument_defaults());
        Ok(())
    }
}

//! Load a FITS file into a normalized [`ImageContainer`].
//!
//! A load walks through these stages, and any failure aborts it without a
//! partial result:
//!
//! 1. open the file and read the identity fields of the primary header
//! 2. select the first matching instrument from the registry
//! 3. resolve the science extension and the instrument's bad-pixel mask
//! 4. build the container from that extension's pixels and the primary header
//! 5. resolve site, exposure time, observation time and filter
//! 6. move the observation time to the barycenter when a target is given
//!
//! The barycentric step needs an [`Ephemeris`]. By default that is the JPL
//! kernel named by `FITSNORM_EPHEMERIS`; without one, loads given a target
//! fail with [`Error::NoEphemeris`] unless an ephemeris is set explicitly.

use log::{debug, info};
use std::path::Path;

use crate::barycentric::correct_barycentric;
use crate::coords::SkyCoord;
use crate::ephemeris::{default_kernel, Ephemeris};
use crate::error::{Error, Result};
use crate::fits::FitsHandle;
use crate::image::ImageContainer;
use crate::instrument::{builtin, Identity, Registry};
use crate::site::{SiteCatalog, SiteLookup};

/// A successfully loaded image together with how it was resolved.
#[derive(Debug)]
pub struct LoadedImage {
    pub image: ImageContainer,
    /// Name of the instrument variant that claimed the file
    pub instrument: String,
    /// HDU the pixels were read from
    pub extension: usize,
}

/// Resolves files against an instrument registry.
///
/// The registry, site lookup and ephemeris are only read, so one loader can
/// serve any number of loads.
pub struct Loader<'a> {
    registry: &'a Registry,
    sites: Box<dyn SiteLookup + 'a>,
    ephemeris: Option<Box<dyn Ephemeris + 'a>>,
}

impl Default for Loader<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> Loader<'a> {
    /// Built-in registry, no known sites, the default ephemeris kernel if any.
    pub fn new() -> Self {
        Self {
            registry: builtin(),
            sites: Box::new(SiteCatalog::default()),
            ephemeris: default_kernel().map(|k| Box::new(k) as Box<dyn Ephemeris + 'a>),
        }
    }

    pub fn with_registry(mut self, registry: &'a Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_sites(mut self, sites: impl SiteLookup + 'a) -> Self {
        self.sites = Box::new(sites);
        self
    }

    /// Replace the default kernel, e.g. with another SPK file or with
    /// [`AnalyticEphemeris`](crate::ephemeris::AnalyticEphemeris) where a
    /// tenth of a second is good enough.
    pub fn with_ephemeris(mut self, ephemeris: impl Ephemeris + 'a) -> Self {
        self.ephemeris = Some(Box::new(ephemeris));
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Load and normalize one file. `target` is needed by instruments that
    /// locate the science extension from the target position, and enables
    /// the barycentric time correction.
    pub fn load(&self, path: &Path, target: Option<SkyCoord>) -> Result<LoadedImage> {
        let mut file = FitsHandle::open(path)?;
        let primary = file.primary_header().clone();
        let telescope = primary.get_or_empty("TELESCOP");
        let origin = primary.get_or_empty("ORIGIN");
        let instrument_name = primary.get_or_empty("INSTRUME");
        let identity = Identity {
            telescope: &telescope,
            origin: &origin,
            instrument: &instrument_name,
        };

        let (_, instrument) =
            self.registry
                .find(&identity, &primary)
                .ok_or_else(|| Error::NoInstrument {
                    telescope: telescope.clone(),
                    origin: origin.clone(),
                    instrument: instrument_name.clone(),
                })?;

        let extension = instrument.get_ext(&file, target.as_ref())?;
        let mask = instrument.get_mask(&mut file)?;
        let pixels = file.read_image(extension)?;
        debug!(
            "{}: {} extension {extension}, {}x{} pixels",
            path.display(),
            instrument.name(),
            pixels.nrows(),
            pixels.ncols()
        );
        drop(file);

        let mut image = ImageContainer::new(pixels, primary, mask)?;
        instrument.prepare(&mut image)?;
        instrument.process_image(&mut image, self.sites.as_ref())?;

        if let Some(target) = target {
            let ephemeris = self.ephemeris.as_deref().ok_or(Error::NoEphemeris)?;
            let obstime = image.obstime.ok_or(Error::MissingObstime)?;
            let corrected = correct_barycentric(&obstime, &target, ephemeris)?;
            debug!(
                "barycentric correction {:.3} s",
                (corrected.epoch - obstime.epoch).to_seconds()
            );
            image.obstime = Some(corrected);
        }

        info!(
            "loaded {} as {} (filter {}, exptime {} s)",
            path.display(),
            instrument.name(),
            image.photfilter.as_deref().unwrap_or("?"),
            image.exptime.unwrap_or(f64::NAN)
        );
        Ok(LoadedImage {
            image,
            instrument: instrument.name().to_string(),
            extension,
        })
    }
}

/// Load one file with the built-in registry.
pub fn load_image(
    path: &Path,
    target: Option<SkyCoord>,
    sites: &dyn SiteLookup,
) -> Result<ImageContainer> {
    Loader::new()
        .with_sites(sites)
        .load(path, target)
        .map(|loaded| loaded.image)
}

//! Normalize astronomical images from many telescopes into one container.
//!
//! Each supported telescope/instrument writes its own header dialect. The
//! [`instrument`] registry recognises the file, and the matched variant's
//! rules extract exposure time, observation time, filter, site, science
//! extension and bad-pixel mask into an [`ImageContainer`].
//!
//! ```no_run
//! use fitsnorm::{Loader, SiteCatalog, SkyCoord, SpkEphemeris};
//! use std::path::Path;
//!
//! let sites = SiteCatalog::from_json_file(Path::new("sites.json"))?;
//! let kernel = SpkEphemeris::open("de440s.bsp")?;
//! let loaded = Loader::new()
//!     .with_sites(sites)
//!     .with_ephemeris(kernel)
//!     .load(Path::new("image.fits"), Some(SkyCoord::new(150.1, 2.2)))?;
//! println!("{} {:?}", loaded.instrument, loaded.image.photfilter);
//! # Ok::<(), fitsnorm::Error>(())
//! ```

pub mod barycentric;
pub mod coords;
pub mod ephemeris;
pub mod error;
pub mod filters;
pub mod fits;
pub mod header;
pub mod image;
pub mod instrument;
pub mod loader;
pub mod site;
pub mod time;
pub mod wcs;

pub use coords::{EarthLocation, SkyCoord};
pub use ephemeris::{AnalyticEphemeris, Ephemeris, SpkEphemeris};
pub use error::{Error, ErrorKind, Result};
pub use header::{Header, HeaderValue};
pub use image::{get_edge_mask, ImageContainer, InstrumentDefaults, ObType};
pub use loader::{load_image, LoadedImage, Loader};
pub use site::{Site, SiteCatalog, SiteLookup};
pub use time::ObsTime;

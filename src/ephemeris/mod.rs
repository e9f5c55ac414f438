//! Barycentric position of the Earth.
//!
//! The default source is a JPL development ephemeris (DE430, DE440, ...)
//! read from a binary SPK kernel. The kernel is taken from the
//! `FITSNORM_EPHEMERIS` environment variable or handed over explicitly. A
//! low precision [`AnalyticEphemeris`] is available for callers that can
//! accept errors of about a tenth of a second in the light travel time.

mod analytic;
pub mod daf;
pub mod spk;

use hifitime::Epoch;
use log::{debug, warn};
use nalgebra::Vector3;
use once_cell::sync::Lazy;

use crate::error::Result;

pub use analytic::AnalyticEphemeris;
pub use spk::SpkEphemeris;

/// Environment variable naming the default SPK kernel.
pub const EPHEMERIS_ENV: &str = "FITSNORM_EPHEMERIS";

/// Kilometres per astronomical unit (IAU 2012).
pub const AU_KM: f64 = 149_597_870.7;

/// Source of the Earth's position relative to the solar system barycenter.
pub trait Ephemeris: Send + Sync {
    /// Barycentric position of the geocenter at `epoch`, in AU on ICRS axes.
    fn earth_position(&self, epoch: &Epoch) -> Result<Vector3<f64>>;
}

impl<T: Ephemeris + ?Sized> Ephemeris for &T {
    fn earth_position(&self, epoch: &Epoch) -> Result<Vector3<f64>> {
        (**self).earth_position(epoch)
    }
}

impl<T: Ephemeris + ?Sized> Ephemeris for Box<T> {
    fn earth_position(&self, epoch: &Epoch) -> Result<Vector3<f64>> {
        (**self).earth_position(epoch)
    }
}

static DEFAULT_KERNEL: Lazy<Option<SpkEphemeris>> = Lazy::new(|| {
    let path = match std::env::var_os(EPHEMERIS_ENV) {
        Some(path) => path,
        None => {
            debug!("{EPHEMERIS_ENV} is not set, no default ephemeris kernel");
            return None;
        }
    };
    match SpkEphemeris::open(&path) {
        Ok(kernel) => {
            debug!("loaded ephemeris kernel {}", path.to_string_lossy());
            Some(kernel)
        }
        Err(e) => {
            warn!("cannot use ephemeris kernel {}: {e}", path.to_string_lossy());
            None
        }
    }
});

/// The kernel named by `FITSNORM_EPHEMERIS`, opened once per process.
pub fn default_kernel() -> Option<&'static SpkEphemeris> {
    DEFAULT_KERNEL.as_ref()
}

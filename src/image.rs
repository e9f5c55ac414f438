//! The normalized image container handed to photometry.

use log::debug;
use ndarray::{Array2, ArrayView2, Axis, Zip};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::header::Header;
use crate::site::Site;
use crate::time::ObsTime;
use crate::wcs::Wcs;

/// Seed values (arcseconds) for later PSF fitting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InstrumentDefaults {
    pub radius: f64,
    /// Best initial guess
    pub fwhm: f64,
    pub fwhm_min: f64,
    pub fwhm_max: f64,
}

impl Default for InstrumentDefaults {
    fn default() -> Self {
        Self {
            radius: 10.0,
            fwhm: 6.0,
            fwhm_min: 3.5,
            fwhm_max: 18.0,
        }
    }
}

/// Observation block type of a dithered infrared sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ObType {
    Autojitter,
    FixedOffset,
}

/// Masked view of the image, as produced by [`ImageContainer::create_masked_image`].
///
/// Masked positions hold NaN in `data` and `true` in `mask`.
#[derive(Debug, Clone, Copy)]
pub struct MaskedView<'a> {
    pub data: ArrayView2<'a, f64>,
    pub mask: ArrayView2<'a, bool>,
}

impl MaskedView<'_> {
    /// Unmasked pixel values.
    pub fn compressed(&self) -> Vec<f64> {
        Zip::from(&self.data)
            .and(&self.mask)
            .fold(Vec::new(), |mut acc, &v, &m| {
                if !m {
                    acc.push(v);
                }
                acc
            })
    }

    pub fn count_masked(&self) -> usize {
        self.mask.iter().filter(|&&m| m).count()
    }
}

/// Pixel data, mask and derived metadata of one observation.
///
/// Invariant: every non-finite pixel is masked, whatever else the mask holds.
#[derive(Debug, Clone)]
pub struct ImageContainer {
    pixels: Array2<f64>,
    header: Header,
    mask: Array2<bool>,
    wcs: Option<Wcs>,
    masked_materialized: bool,

    pub peakmax: Option<f64>,
    pub exptime: Option<f64>,
    pub photfilter: Option<String>,
    pub instrument_defaults: Option<InstrumentDefaults>,
    pub site: Option<Site>,
    pub obstime: Option<ObsTime>,
    pub ob_type: Option<ObType>,
}

impl ImageContainer {
    /// Build a container from pixels and header, with an optional initial mask.
    pub fn new(pixels: Array2<f64>, header: Header, mask: Option<Array2<bool>>) -> Result<Self> {
        let mask = match mask {
            Some(mask) => {
                check_shape(&pixels, &mask)?;
                mask
            }
            None => Array2::from_elem(pixels.dim(), false),
        };
        let wcs = create_wcs(&header);
        let mut image = Self {
            pixels,
            header,
            mask,
            wcs,
            masked_materialized: false,
            peakmax: None,
            exptime: None,
            photfilter: None,
            instrument_defaults: None,
            site: None,
            obstime: None,
            ob_type: None,
        };
        image.check_finite();
        Ok(image)
    }

    pub fn pixels(&self) -> &Array2<f64> {
        &self.pixels
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    pub fn wcs(&self) -> Option<&Wcs> {
        self.wcs.as_ref()
    }

    /// (rows, columns)
    pub fn shape(&self) -> (usize, usize) {
        self.pixels.dim()
    }

    fn check_finite(&mut self) {
        Zip::from(&mut self.mask)
            .and(&self.pixels)
            .for_each(|m, &v| *m |= !v.is_finite());
    }

    /// Replace the mask. Non-finite pixels stay masked.
    pub fn update_mask(&mut self, mask: Array2<bool>) -> Result<()> {
        check_shape(&self.pixels, &mask)?;
        self.mask = mask;
        self.check_finite();
        Ok(())
    }

    /// Overwrite masked pixels with NaN and expose the result through [`Self::clean`].
    ///
    /// Destructive: the original values of masked pixels are lost.
    pub fn create_masked_image(&mut self) {
        Zip::from(&mut self.pixels)
            .and(&self.mask)
            .for_each(|v, &m| {
                if m {
                    *v = f64::NAN;
                }
            });
        self.masked_materialized = true;
    }

    /// Masked view, available once [`Self::create_masked_image`] has run.
    pub fn clean(&self) -> Option<MaskedView<'_>> {
        self.masked_materialized.then(|| MaskedView {
            data: self.pixels.view(),
            mask: self.mask.view(),
        })
    }

    pub fn set_edge_rows_to_value(&mut self, rows: &[usize], value: f64) {
        for &row in rows {
            if row < self.pixels.nrows() {
                self.pixels.row_mut(row).fill(value);
            }
        }
    }

    pub fn set_edge_columns_to_value(&mut self, cols: &[usize], value: f64) {
        for &col in cols {
            if col < self.pixels.ncols() {
                self.pixels.column_mut(col).fill(value);
            }
        }
    }

    /// Zero the given rows and columns, then replace the mask with the edge
    /// mask of the result and materialize the masked image.
    ///
    /// With `apply_existing_mask_first`, currently masked pixels are set to NaN
    /// before the mask is replaced.
    pub fn apply_edge_mask(
        &mut self,
        rows: Option<&[usize]>,
        cols: Option<&[usize]>,
        apply_existing_mask_first: bool,
    ) {
        if rows.is_none() && cols.is_none() {
            debug!("no rows or columns given when applying edge mask, only border detection runs");
        }
        if apply_existing_mask_first {
            self.create_masked_image();
        }
        if let Some(rows) = rows {
            self.set_edge_rows_to_value(rows, 0.0);
        }
        if let Some(cols) = cols {
            self.set_edge_columns_to_value(cols, 0.0);
        }
        self.mask = get_edge_mask(&self.pixels, 0.0);
        self.check_finite();
        self.create_masked_image();
    }
}

fn check_shape(pixels: &Array2<f64>, mask: &Array2<bool>) -> Result<()> {
    if pixels.dim() != mask.dim() {
        return Err(Error::ShapeMismatch {
            image: pixels.dim(),
            mask: mask.dim(),
        });
    }
    Ok(())
}

fn create_wcs(header: &Header) -> Option<Wcs> {
    match Wcs::from_header(header) {
        Ok(wcs) => wcs,
        Err(e) => {
            debug!("ignoring unusable world coordinate system: {e}");
            None
        }
    }
}

/// Mask pixels equal to `value` that form a band touching the image border.
///
/// Whole rows and columns consisting only of `value` are masked. Then, column
/// by column and row by row, the run of `value` pixels starting at each border
/// is masked, which handles padding that is not perfectly rectangular.
pub fn get_edge_mask(img: &Array2<f64>, value: f64) -> Array2<bool> {
    let is_value = img.mapv(|v| v == value);
    let mut mask = Array2::from_elem(img.dim(), false);
    let (rows, cols) = img.dim();
    if rows == 0 || cols == 0 {
        return mask;
    }

    for (r, row) in is_value.axis_iter(Axis(0)).enumerate() {
        if row.iter().all(|&b| b) {
            mask.row_mut(r).fill(true);
        }
    }
    for (c, col) in is_value.axis_iter(Axis(1)).enumerate() {
        if col.iter().all(|&b| b) {
            mask.column_mut(c).fill(true);
        }
    }

    for c in 0..cols {
        let col = is_value.column(c);
        let lead = col.iter().take_while(|&&b| b).count();
        let trail = col.iter().rev().take_while(|&&b| b).count();
        for r in 0..lead {
            mask[[r, c]] = true;
        }
        for r in rows - trail..rows {
            mask[[r, c]] = true;
        }
    }
    for r in 0..rows {
        let row = is_value.row(r);
        let lead = row.iter().take_while(|&&b| b).count();
        let trail = row.iter().rev().take_while(|&&b| b).count();
        for c in 0..lead {
            mask[[r, c]] = true;
        }
        for c in cols - trail..cols {
            mask[[r, c]] = true;
        }
    }
    mask
}

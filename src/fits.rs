use fitsio::FitsFile;
#[allow(unused_imports)]
use fitsio::images::ReadImage; // trait needed for hdu.read_image()
use log::debug;
use ndarray::Array2;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::header::{Header, HeaderValue};

const BLOCK_SIZE: usize = 2880;
const CARD_SIZE: usize = 80;

/// A FITS file opened read-only, with every HDU header parsed up front.
///
/// Pixel data is read lazily through cfitsio (`fitsio`), which applies
/// BSCALE/BZERO. The underlying file handle is released when this value
/// is dropped, on success and error paths alike.
pub struct FitsHandle {
    path: PathBuf,
    fits: FitsFile,
    headers: Vec<Header>,
}

impl FitsHandle {
    pub fn open(path: &Path) -> Result<Self> {
        let headers = read_all_headers(path)?;
        if headers.is_empty() {
            return Err(Error::Malformed(format!(
                "{} has no header data units",
                path.display()
            )));
        }
        let fits = FitsFile::open(path)?;
        debug!("opened {} with {} HDU(s)", path.display(), headers.len());
        Ok(Self {
            path: path.to_path_buf(),
            fits,
            headers,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    pub fn primary_header(&self) -> &Header {
        &self.headers[0]
    }

    pub fn header(&self, index: usize) -> Option<&Header> {
        self.headers.get(index)
    }

    pub fn headers(&self) -> &[Header] {
        &self.headers
    }

    /// Index of the first extension whose EXTNAME equals `name`.
    pub fn find_extension(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| {
            h.get("EXTNAME")
                .and_then(HeaderValue::as_str)
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name))
        })
    }

    /// Read the pixel grid of HDU `index` as 64-bit floats, shaped (NAXIS2, NAXIS1).
    pub fn read_image(&mut self, index: usize) -> Result<Array2<f64>> {
        let header = self
            .headers
            .get(index)
            .ok_or_else(|| Error::Malformed(format!("HDU {index} does not exist")))?;
        let (height, width) = image_shape(header)
            .ok_or_else(|| Error::Malformed(format!("HDU {index} is not a 2-D image")))?;

        let hdu = self.fits.hdu(index)?;
        let raw: Vec<f64> = hdu.read_image(&mut self.fits)?;
        if raw.len() != width * height {
            return Err(Error::Malformed(format!(
                "HDU {index}: expected {} pixels, read {}",
                width * height,
                raw.len()
            )));
        }
        // FITS stores NAXIS1 fastest, which is row-major for (NAXIS2, NAXIS1).
        Array2::from_shape_vec((height, width), raw)
            .map_err(|e| Error::Malformed(format!("HDU {index}: {e}")))
    }
}

/// (rows, columns) of a 2-D image header. Trailing axes of length 1 are allowed.
pub fn image_shape(header: &Header) -> Option<(usize, usize)> {
    let naxis = header.get_i64("NAXIS")?;
    if naxis < 2 {
        return None;
    }
    let width = usize::try_from(header.get_i64("NAXIS1")?).ok()?;
    let height = usize::try_from(header.get_i64("NAXIS2")?).ok()?;
    for axis in 3..=naxis {
        if header.get_i64(&format!("NAXIS{axis}")) != Some(1) {
            return None;
        }
    }
    Some((height, width))
}

// ---------------------------------------------------------------------------
// Header reading
// ---------------------------------------------------------------------------

/// Read the headers of every HDU by walking the raw FITS blocks.
///
/// FITS headers consist of 80-byte ASCII records packed into 2880-byte blocks.
/// Each record is `KEY     = value / comment`, a `HIERARCH` record, or a
/// commentary card (COMMENT, HISTORY, blank), which is skipped. The data
/// section of each HDU is skipped using BITPIX, NAXISn, PCOUNT and GCOUNT.
pub fn read_all_headers(fits_path: &Path) -> Result<Vec<Header>> {
    let file = std::fs::File::open(fits_path)?;
    let mut reader = BufReader::new(file);
    let mut block = [0u8; BLOCK_SIZE];
    let mut headers = Vec::new();

    loop {
        // --- Read header blocks for the current HDU ---
        let mut header_bytes: Vec<u8> = Vec::new();
        let mut found_end = false;
        while !found_end {
            match reader.read_exact(&mut block) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    if header_bytes.is_empty() {
                        return Ok(headers);
                    }
                    return Err(Error::Malformed(format!(
                        "{}: header of HDU {} has no END record",
                        fits_path.display(),
                        headers.len()
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            if header_bytes.is_empty() && !headers.is_empty() && !block.starts_with(b"XTENSION") {
                // Trailing padding after the last HDU
                return Ok(headers);
            }
            header_bytes.extend_from_slice(&block);
            found_end = block
                .chunks_exact(CARD_SIZE)
                .any(|rec| rec.starts_with(b"END") && rec[3..].iter().all(|&b| b == b' '));
        }

        let header = parse_header_block(&header_bytes);
        let data_size = padded_data_size(&header);
        headers.push(header);

        if data_size > 0 {
            reader.seek(SeekFrom::Current(data_size as i64))?;
        }
    }
}

/// Parse header records up to END into a [`Header`].
pub fn parse_header_block(header_bytes: &[u8]) -> Header {
    let mut header = Header::new();
    for rec in header_bytes.chunks_exact(CARD_SIZE) {
        let card = String::from_utf8_lossy(rec);
        let card = card.trim_end();
        if card == "END" {
            break;
        }
        if let Some((key, value)) = parse_card(card) {
            header.insert(&key, value);
        }
    }
    header
}

fn parse_card(card: &str) -> Option<(String, HeaderValue)> {
    let key = card.get(..8)?.trim();
    if key.is_empty() || matches!(key, "COMMENT" | "HISTORY" | "CONTINUE") {
        return None;
    }
    if key == "HIERARCH" {
        let rest = &card[8..];
        let eq = rest.find('=')?;
        let name = rest[..eq].trim();
        if name.is_empty() {
            return None;
        }
        let value = HeaderValue::parse(strip_fits_comment(&rest[eq + 1..]));
        return Some((name.to_string(), value));
    }
    if card.len() > 10 && card.get(8..10) == Some("= ") {
        let value = HeaderValue::parse(strip_fits_comment(&card[10..]));
        Some((key.to_string(), value))
    } else {
        None
    }
}

/// Remove the ` / comment` part from a FITS value field, respecting quoted strings.
fn strip_fits_comment(s: &str) -> &str {
    let s = s.trim();
    if s.starts_with('\'') {
        // Quoted string: find closing quote (doubled quotes are escaped)
        let mut i = 1;
        let bytes = s.as_bytes();
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\'' {
                    i += 2;
                } else {
                    return &s[..=i];
                }
            } else {
                i += 1;
            }
        }
        s
    } else if let Some(pos) = s.find('/') {
        s[..pos].trim_end()
    } else {
        s
    }
}

/// Size in bytes of the data section following `header`, rounded up to whole blocks.
fn padded_data_size(header: &Header) -> u64 {
    let bitpix = header.get_i64("BITPIX").unwrap_or(8);
    let naxis = header.get_i64("NAXIS").unwrap_or(0);
    if naxis == 0 {
        return 0;
    }
    let mut npix: u64 = 1;
    for i in 1..=naxis {
        npix *= header.get_i64(&format!("NAXIS{i}")).unwrap_or(0).max(0) as u64;
    }
    let pcount = header.get_i64("PCOUNT").unwrap_or(0).max(0) as u64;
    let gcount = header.get_i64("GCOUNT").unwrap_or(1).max(1) as u64;
    let bits = bitpix.unsigned_abs() * gcount * (pcount + npix);
    let bytes = bits.div_ceil(8);
    bytes.div_ceil(BLOCK_SIZE as u64) * BLOCK_SIZE as u64
}

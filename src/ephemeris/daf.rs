//! NAIF Double precision Array File (DAF) reader, the container format of
//! SPK kernels.
//!
//! A DAF is a sequence of 1024-byte records. The first holds the file
//! description, then a doubly linked list of summary records describes the
//! arrays, each summary being `ND` doubles followed by `NI` packed 32-bit
//! integers. Array addresses count 8-byte words from 1.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

const RECORD_LEN: usize = 1024;
const WORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endian {
    Little,
    Big,
}

impl Endian {
    fn f64(self, bytes: &[u8]) -> f64 {
        let mut b = [0u8; 8];
        b.copy_from_slice(&bytes[..8]);
        match self {
            Endian::Little => f64::from_le_bytes(b),
            Endian::Big => f64::from_be_bytes(b),
        }
    }

    fn i32(self, bytes: &[u8]) -> i32 {
        let mut b = [0u8; 4];
        b.copy_from_slice(&bytes[..4]);
        match self {
            Endian::Little => i32::from_le_bytes(b),
            Endian::Big => i32::from_be_bytes(b),
        }
    }
}

/// One array summary.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub doubles: Vec<f64>,
    pub ints: Vec<i32>,
}

/// An open DAF file.
#[derive(Debug)]
pub struct Daf {
    file: File,
    endian: Endian,
    /// File type, e.g. `SPK`
    pub kind: String,
    pub nd: usize,
    pub ni: usize,
    fward: usize,
}

impl Daf {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let mut record = [0u8; RECORD_LEN];
        file.read_exact(&mut record)?;

        let idword = String::from_utf8_lossy(&record[0..8]).to_string();
        let kind = idword
            .strip_prefix("DAF/")
            .ok_or_else(|| Error::Ephemeris(format!("not a DAF file (id word {idword:?})")))?
            .trim()
            .to_string();

        let endian = match &record[88..96] {
            b"LTL-IEEE" => Endian::Little,
            b"BIG-IEEE" => Endian::Big,
            // Pre-1990s files carry no format word; ND is always small
            _ if (1..=124).contains(&Endian::Little.i32(&record[8..12])) => Endian::Little,
            _ => Endian::Big,
        };
        let count = |bytes: &[u8], what: &str| {
            usize::try_from(endian.i32(bytes))
                .map_err(|_| Error::Ephemeris(format!("negative {what} in DAF file record")))
        };
        let nd = count(&record[8..12], "ND")?;
        let ni = count(&record[12..16], "NI")?;
        let fward = count(&record[76..80], "FWARD")?;
        if nd + ni.div_ceil(2) > RECORD_LEN / WORD_LEN - 3 {
            return Err(Error::Ephemeris(format!(
                "DAF summary size ND={nd} NI={ni} does not fit a record"
            )));
        }

        Ok(Self {
            file,
            endian,
            kind,
            nd,
            ni,
            fward,
        })
    }

    fn read_record(&mut self, number: usize) -> Result<[u8; RECORD_LEN]> {
        let mut record = [0u8; RECORD_LEN];
        let offset = (number.saturating_sub(1) * RECORD_LEN) as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut record)?;
        Ok(record)
    }

    /// Summaries of every array, in file order.
    pub fn summaries(&mut self) -> Result<Vec<Summary>> {
        let (endian, nd, ni) = (self.endian, self.nd, self.ni);
        let words_per_summary = nd + ni.div_ceil(2);
        let mut summaries = Vec::new();
        let mut next = self.fward;
        let mut visited = 0usize;
        while next != 0 {
            visited += 1;
            if visited > 100_000 {
                return Err(Error::Ephemeris("DAF summary records form a loop".into()));
            }
            let record = self.read_record(next)?;
            let word = |i: usize| endian.f64(&record[i * WORD_LEN..]);
            let following = word(0);
            let nsum = word(2);
            if !(following >= 0.0 && nsum >= 0.0) {
                return Err(Error::Ephemeris("corrupt DAF summary record".into()));
            }
            let nsum = nsum as usize;
            if 3 + nsum * words_per_summary > RECORD_LEN / WORD_LEN {
                return Err(Error::Ephemeris(format!(
                    "DAF summary record {next} claims {nsum} summaries"
                )));
            }
            for k in 0..nsum {
                let start = (3 + k * words_per_summary) * WORD_LEN;
                let doubles = (0..nd)
                    .map(|i| endian.f64(&record[start + i * WORD_LEN..]))
                    .collect();
                let int_start = start + nd * WORD_LEN;
                let ints = (0..ni)
                    .map(|i| endian.i32(&record[int_start + i * 4..]))
                    .collect();
                summaries.push(Summary { doubles, ints });
            }
            next = following as usize;
        }
        Ok(summaries)
    }

    /// Words `start..=end` (1-based addresses) as doubles.
    pub fn read_array(&mut self, start: usize, end: usize) -> Result<Vec<f64>> {
        if start == 0 || end < start {
            return Err(Error::Ephemeris(format!(
                "invalid DAF array address range {start}..={end}"
            )));
        }
        let mut bytes = vec![0u8; (end - start + 1) * WORD_LEN];
        self.file
            .seek(SeekFrom::Start(((start - 1) * WORD_LEN) as u64))?;
        self.file.read_exact(&mut bytes)?;
        Ok(bytes
            .chunks_exact(WORD_LEN)
            .map(|w| self.endian.f64(w))
            .collect())
    }
}

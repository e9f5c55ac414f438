//! JPL planetary ephemeris read from a binary SPK kernel.
//!
//! Only the Chebyshev segment types used by the DE series are evaluated:
//! type 2 (position coefficients) and type 3 (position and velocity
//! coefficients). Positions are in kilometres on the J2000/ICRF axes, with
//! epochs in TDB seconds past J2000.

use hifitime::Epoch;
use log::debug;
use nalgebra::Vector3;
use std::path::Path;

use super::daf::{Daf, Summary};
use super::{Ephemeris, AU_KM};
use crate::error::{Error, Result};

/// NAIF body codes.
pub const SOLAR_SYSTEM_BARYCENTER: i32 = 0;
pub const EARTH_MOON_BARYCENTER: i32 = 3;
pub const EARTH: i32 = 399;

/// Target/center pairs chained to place the geocenter relative to the
/// solar system barycenter.
const EARTH_CHAIN: [(i32, i32); 2] = [
    (EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER),
    (EARTH, EARTH_MOON_BARYCENTER),
];

/// One Chebyshev segment held in memory.
#[derive(Debug, Clone)]
pub struct Segment {
    pub target: i32,
    pub center: i32,
    /// Coverage in TDB seconds past J2000
    pub start_et: f64,
    pub end_et: f64,
    init: f64,
    intlen: f64,
    rsize: usize,
    /// Coefficients per component in each record
    ncoef: usize,
    records: Vec<f64>,
}

impl Segment {
    fn from_summary(daf: &mut Daf, summary: &Summary) -> Result<Option<Self>> {
        let [start_et, end_et] = summary.doubles[..] else {
            return Err(Error::Ephemeris("SPK summaries need two doubles".into()));
        };
        let [target, center, _frame, data_type, start, end] = summary.ints[..] else {
            return Err(Error::Ephemeris("SPK summaries need six integers".into()));
        };
        let components = match data_type {
            2 => 3,
            3 => 6,
            other => {
                debug!("skipping SPK segment {target}/{center} of type {other}");
                return Ok(None);
            }
        };
        let address = |a: i32| {
            usize::try_from(a).map_err(|_| Error::Ephemeris(format!("bad SPK address {a}")))
        };
        let (start, end) = (address(start)?, address(end)?);
        if end < start + 4 {
            return Err(Error::Ephemeris(format!(
                "SPK segment {target}/{center} is too short"
            )));
        }

        let mut records = daf.read_array(start, end)?;
        let directory = records.split_off(records.len() - 4);
        let (init, intlen, rsize, n) = (directory[0], directory[1], directory[2], directory[3]);
        if !(intlen > 0.0 && rsize >= 2.0 && n >= 1.0) {
            return Err(Error::Ephemeris(format!(
                "SPK segment {target}/{center} has a corrupt directory"
            )));
        }
        let (rsize, n) = (rsize as usize, n as usize);
        let ncoef = (rsize - 2) / components;
        if ncoef == 0 || records.len() != rsize * n {
            return Err(Error::Ephemeris(format!(
                "SPK segment {target}/{center}: {} words for {n} records of {rsize}",
                records.len()
            )));
        }

        Ok(Some(Self {
            target,
            center,
            start_et,
            end_et,
            init,
            intlen,
            rsize,
            ncoef,
            records,
        }))
    }

    pub fn covers(&self, et: f64) -> bool {
        (self.start_et..=self.end_et).contains(&et)
    }

    /// Position in km at `et`, TDB seconds past J2000.
    pub fn position(&self, et: f64) -> Vector3<f64> {
        let n = self.records.len() / self.rsize;
        let index = ((et - self.init) / self.intlen).floor().max(0.0) as usize;
        let record = &self.records[index.min(n - 1) * self.rsize..][..self.rsize];
        let (mid, radius) = (record[0], record[1]);
        let s = (et - mid) / radius;
        let coefficients = &record[2..];
        Vector3::from_fn(|axis, _| {
            chebyshev(&coefficients[axis * self.ncoef..(axis + 1) * self.ncoef], s)
        })
    }
}

/// Sum of `coefficients[k] * T_k(s)`.
fn chebyshev(coefficients: &[f64], s: f64) -> f64 {
    let (mut t_prev, mut t) = (1.0, s);
    let mut sum = coefficients[0];
    for (k, c) in coefficients.iter().enumerate().skip(1) {
        if k > 1 {
            let next = 2.0 * s * t - t_prev;
            t_prev = t;
            t = next;
        }
        sum += c * t;
    }
    sum
}

/// Earth ephemeris from the segments of an SPK kernel.
#[derive(Debug, Clone)]
pub struct SpkEphemeris {
    segments: Vec<Segment>,
}

impl SpkEphemeris {
    /// Read the segments needed for the Earth's barycentric position.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut daf = Daf::open(path)?;
        if daf.kind != "SPK" {
            return Err(Error::Ephemeris(format!(
                "{} is a DAF/{} file, not an SPK kernel",
                path.display(),
                daf.kind
            )));
        }
        let mut segments = Vec::new();
        for summary in daf.summaries()? {
            let pair = match summary.ints.get(..2) {
                Some(&[target, center]) => (target, center),
                _ => continue,
            };
            if !EARTH_CHAIN.contains(&pair) {
                continue;
            }
            if let Some(segment) = Segment::from_summary(&mut daf, &summary)? {
                segments.push(segment);
            }
        }
        for (target, center) in EARTH_CHAIN {
            if !segments
                .iter()
                .any(|s| s.target == target && s.center == center)
            {
                return Err(Error::Ephemeris(format!(
                    "{} has no usable segment for body {target} relative to {center}",
                    path.display()
                )));
            }
        }
        debug!(
            "{}: {} segments for the Earth",
            path.display(),
            segments.len()
        );
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Position of `target` relative to `center` in km.
    pub fn position(&self, target: i32, center: i32, et: f64) -> Result<Vector3<f64>> {
        self.segments
            .iter()
            .find(|s| s.target == target && s.center == center && s.covers(et))
            .map(|s| s.position(et))
            .ok_or_else(|| {
                Error::Ephemeris(format!(
                    "kernel does not cover body {target} relative to {center} at {et} s past J2000 TDB"
                ))
            })
    }
}

impl Ephemeris for SpkEphemeris {
    fn earth_position(&self, epoch: &Epoch) -> Result<Vector3<f64>> {
        let et = epoch.to_et_seconds();
        let mut km = Vector3::zeros();
        for (target, center) in EARTH_CHAIN {
            km += self.position(target, center, et)?;
        }
        Ok(km / AU_KM)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::io::Write;

    const WORDS_PER_RECORD: usize = 128;

    /// A type 2 segment for the synthetic kernel.
    pub(crate) struct TestSegment {
        pub target: i32,
        pub center: i32,
        pub start_et: f64,
        pub intlen: f64,
        /// Records of `[mid, radius, x.., y.., z..]`
        pub records: Vec<Vec<f64>>,
    }

    impl TestSegment {
        /// A segment holding a fixed position over `start_et..start_et + span`.
        pub(crate) fn fixed(target: i32, center: i32, km: [f64; 3], start_et: f64, span: f64) -> Self {
            let mid = start_et + span / 2.0;
            Self {
                target,
                center,
                start_et,
                intlen: span,
                records: vec![vec![mid, span / 2.0, km[0], km[1], km[2]]],
            }
        }
    }

    fn put_f64(buf: &mut Vec<u8>, v: f64) {
        buf.extend_from_slice(&v.to_le_bytes());
    }

    /// Write a little-endian DAF/SPK with one summary record.
    pub(crate) fn write_spk(path: &Path, segments: &[TestSegment]) {
        // Data arrays start after the file, summary and name records
        let mut data = Vec::new();
        let mut summaries = Vec::new();
        let mut address = 3 * WORDS_PER_RECORD + 1;
        for seg in segments {
            let rsize = seg.records[0].len();
            let start = address;
            for record in &seg.records {
                for v in record {
                    put_f64(&mut data, *v);
                }
            }
            for v in [seg.start_et, seg.intlen, rsize as f64, seg.records.len() as f64] {
                put_f64(&mut data, v);
            }
            address += seg.records.len() * rsize + 4;
            let end_et = seg.start_et + seg.intlen * seg.records.len() as f64;
            summaries.push((seg, start as i32, (address - 1) as i32, end_et));
        }

        let mut out = Vec::new();
        let mut file_record = vec![0u8; 1024];
        file_record[0..8].copy_from_slice(b"DAF/SPK ");
        file_record[8..12].copy_from_slice(&2i32.to_le_bytes());
        file_record[12..16].copy_from_slice(&6i32.to_le_bytes());
        file_record[16..76].fill(b' ');
        file_record[76..80].copy_from_slice(&2i32.to_le_bytes());
        file_record[80..84].copy_from_slice(&2i32.to_le_bytes());
        file_record[84..88].copy_from_slice(&(address as i32).to_le_bytes());
        file_record[88..96].copy_from_slice(b"LTL-IEEE");
        out.extend_from_slice(&file_record);

        let mut summary_record = Vec::new();
        put_f64(&mut summary_record, 0.0);
        put_f64(&mut summary_record, 0.0);
        put_f64(&mut summary_record, summaries.len() as f64);
        for (seg, start, end, end_et) in &summaries {
            put_f64(&mut summary_record, seg.start_et);
            put_f64(&mut summary_record, *end_et);
            for i in [seg.target, seg.center, 1, 2, *start, *end] {
                summary_record.extend_from_slice(&i.to_le_bytes());
            }
        }
        summary_record.resize(1024, 0);
        out.extend_from_slice(&summary_record);
        out.extend_from_slice(&[b' '; 1024]);
        out.extend_from_slice(&data);

        std::fs::File::create(path)
            .unwrap()
            .write_all(&out)
            .unwrap();
    }

    #[test]
    fn test_chebyshev_polynomials() {
        // T2(s) = 2s^2 - 1, T3(s) = 4s^3 - 3s
        let s = 0.3;
        assert_abs_diff_eq!(chebyshev(&[2.0], s), 2.0);
        assert_abs_diff_eq!(chebyshev(&[0.0, 1.0], s), s);
        assert_abs_diff_eq!(chebyshev(&[0.0, 0.0, 1.0], s), 2.0 * s * s - 1.0, epsilon = 1e-15);
        assert_abs_diff_eq!(
            chebyshev(&[1.0, 0.0, 0.0, 2.0], s),
            1.0 + 2.0 * (4.0 * s * s * s - 3.0 * s),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_reads_type2_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.bsp");
        // Two records of one day each; x runs linearly across each record
        let day = 86_400.0;
        let emb = TestSegment {
            target: EARTH_MOON_BARYCENTER,
            center: SOLAR_SYSTEM_BARYCENTER,
            start_et: 0.0,
            intlen: day,
            records: vec![
                vec![day / 2.0, day / 2.0, 1.0e8, 1.0e6, 2.0e7, 0.0, 3.0e7, 0.0],
                vec![1.5 * day, day / 2.0, 1.1e8, -1.0e6, 2.0e7, 5.0e5, 3.0e7, 0.0],
            ],
        };
        let earth = TestSegment::fixed(EARTH, EARTH_MOON_BARYCENTER, [4000.0, -3000.0, 100.0], 0.0, 2.0 * day);
        write_spk(&path, &[emb, earth]);

        let kernel = SpkEphemeris::open(&path).unwrap();
        assert_eq!(kernel.segments().len(), 2);

        // Quarter of the way into the first record: s = -0.5
        let p = kernel
            .position(EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER, day / 4.0)
            .unwrap();
        assert_abs_diff_eq!(p.x, 1.0e8 - 0.5e6, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 2.0e7, epsilon = 1e-6);
        assert_abs_diff_eq!(p.z, 3.0e7, epsilon = 1e-6);

        // Second record: s = 0.5
        let p = kernel
            .position(EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER, 1.75 * day)
            .unwrap();
        assert_abs_diff_eq!(p.x, 1.1e8 - 0.5e6, epsilon = 1e-6);
        assert_abs_diff_eq!(p.y, 2.0e7 + 2.5e5, epsilon = 1e-6);

        // Coverage ends with the last record
        assert!(kernel.position(EARTH, EARTH_MOON_BARYCENTER, 3.0 * day).is_err());
        assert!(matches!(
            kernel.position(EARTH, SOLAR_SYSTEM_BARYCENTER, day),
            Err(Error::Ephemeris(_))
        ));
    }

    #[test]
    fn test_earth_chain_sums_segments() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixed.bsp");
        let span = 400.0 * 86_400.0;
        write_spk(
            &path,
            &[
                TestSegment::fixed(EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER, [AU_KM, 0.0, 0.0], -span, 2.0 * span),
                TestSegment::fixed(EARTH, EARTH_MOON_BARYCENTER, [0.0, -AU_KM / 2.0, 0.0], -span, 2.0 * span),
            ],
        );
        let kernel = SpkEphemeris::open(&path).unwrap();
        let earth = kernel.earth_position(&Epoch::from_jde_tdb(2_451_545.0)).unwrap();
        assert_abs_diff_eq!(earth.x, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(earth.y, -0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(earth.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_incomplete_or_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("emb_only.bsp");
        write_spk(
            &path,
            &[TestSegment::fixed(EARTH_MOON_BARYCENTER, SOLAR_SYSTEM_BARYCENTER, [1.0, 0.0, 0.0], 0.0, 10.0)],
        );
        assert!(matches!(SpkEphemeris::open(&path), Err(Error::Ephemeris(_))));

        let text = dir.path().join("notes.txt");
        std::fs::write(&text, vec![b'x'; 2048]).unwrap();
        assert!(matches!(SpkEphemeris::open(&text), Err(Error::Ephemeris(_))));
    }
}

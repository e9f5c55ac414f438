//! The built-in instrument variants, in dispatch priority order.

use super::rules::{
    ExptimeRule, ExtRule, FilterKey, FilterRule, FilterSearch, HeaderMatch, LocationRule,
    MaskRule, MatchCriteria, Normalize, ObstimeRule, SiteRule, Table, TimeKey,
};
use super::{Identity, Variant};
use crate::header::Header;
use crate::time::TimeFormat;

/// All built-in variants. Earlier entries win when several match.
pub fn all() -> Vec<Variant> {
    vec![
        lcogt(),
        hawki(),
        alfosc(),
        notcam(),
        ps1(),
        liverpool(),
        omega2000(),
        swope(),
        swope_newheader(),
        dupont(),
        retrocam(),
        baade(),
        sofi(),
        efosc(),
        astronircam(),
        omegacam(),
        andicam(),
        pairtel(),
        tjo_meia2(),
        tjo_meia3(),
        ratir(),
        schmidt(),
        afosc(),
    ]
}

fn criteria(telescope: &'static str, instrument: &'static str) -> MatchCriteria {
    MatchCriteria {
        telescope,
        instrument,
        ..Default::default()
    }
}

fn filter(table: Table) -> FilterRule {
    FilterRule::Keyword(FilterKey::new("FILTER", table))
}

fn start(key: &'static str, format: TimeFormat) -> ObstimeRule {
    ObstimeRule::from_key(TimeKey::start(key, format))
}

fn midpoint(key: &'static str, format: TimeFormat) -> ObstimeRule {
    ObstimeRule::from_key(TimeKey::midpoint(key, format))
}

const SWOPE_FILTERS: Table = &[("u", "up"), ("g", "gp"), ("r", "rp"), ("i", "ip")];
const KS: Table = &[("Ks", "K")];

pub fn lcogt() -> Variant {
    Variant::new("LCOGT")
        .matching(MatchCriteria {
            origin: "LCOGT",
            ..Default::default()
        })
        .peakmax(60000.0)
        .site(SiteRule::HeaderKeyword("SITE"))
        .obstime(start("DATE-OBS", TimeFormat::Isot).with_location(LocationRule::Header {
            lat: "LATITUDE",
            lon: "LONGITUD",
            height: "HEIGHT",
        }))
        .filter(filter(&[("zs", "zp")]))
        .mask(MaskRule::Extension("BPM"))
}

/// ESO VLT UT4 multi-extension images; the science extension is the
/// detector chip the target falls on.
pub fn hawki() -> Variant {
    Variant::new("HAWKI")
        .matching(MatchCriteria {
            telescope: "ESO-VLT-U4",
            origin: "ESO-PARANAL",
            instrument: "HAWKI",
            unique_headers: vec![("PRODCATG", HeaderMatch::Str("SCIENCE.MEFIMAGE"))],
        })
        .siteid(2)
        .obstime(start("DATE-OBS", TimeFormat::Isot))
        .ext(ExtRule::TargetSearch {
            extensions: 1..=4,
            fallback: None,
        })
        .ob_type_from("ESO OCS DET1 IMGNAME")
}

/// Nordic Optical Telescope, ALFOSC in imaging mode. Older files lack
/// `FILTER` and only record the filter wheel positions.
pub fn alfosc() -> Variant {
    Variant::new("ALFOSC")
        .matching(MatchCriteria {
            unique_headers: vec![("OBS_MODE", HeaderMatch::Str("imaging"))],
            ..criteria("NOT", "ALFOSC")
        })
        .siteid(5)
        .peakmax(80000.0)
        .obstime(midpoint("DATE-AVG", TimeFormat::Isot))
        .filter(FilterRule::KeywordOrSearch {
            keyword: FilterKey::new(
                "FILTER",
                &[
                    ("B Bes", "B"),
                    ("V Bes", "V"),
                    ("R Bes", "R"),
                    ("g SDSS", "gp"),
                    ("r SDSS", "rp"),
                    ("i SDSS", "ip"),
                    ("i int", "ip"),
                    ("u SDSS", "up"),
                    ("z SDSS", "zp"),
                ],
            )
            .normalized(Normalize::UnderscoreToSpace),
            search: FilterSearch {
                keys: vec!["ALFLTNM", "FAFLTNM", "FBFLTNM"],
                table: &[
                    ("B_Bes 440_100", "B"),
                    ("V_Bes 530_80", "V"),
                    ("R_Bes 650_130", "R"),
                    ("g'_SDSS 480_145", "gp"),
                    ("r'_SDSS 618_148", "rp"),
                    ("i'_SDSS 771_171", "ip"),
                    ("i_int 797_157", "ip"),
                    ("z'_SDSS 832_LP", "zp"),
                ],
                normalize: Normalize::CollapseDoubleSpace,
            },
        })
}

pub fn notcam() -> Variant {
    Variant::new("NOTCAM")
        .matching(MatchCriteria {
            unique_headers: vec![("OBS_MODE", HeaderMatch::Str("imaging"))],
            ..criteria("NOT", "NOTCAM")
        })
        .siteid(5)
        .obstime(midpoint("DATE-AVG", TimeFormat::Isot))
        .filter(FilterRule::SearchOnly {
            forbidden: "FILTER",
            search: FilterSearch {
                keys: vec!["NCFLTNM1", "NCFLTNM2"],
                table: KS,
                normalize: Normalize::Verbatim,
            },
        })
}

pub fn ps1() -> Variant {
    Variant::new("PS1")
        .matching(MatchCriteria {
            unique_headers: vec![
                ("FPA.TELESCOPE", HeaderMatch::Str("PS1")),
                ("FPA.INSTRUMENT", HeaderMatch::Str("GPC1")),
            ],
            ..Default::default()
        })
        .siteid(6)
        .obstime(midpoint("MJD-OBS", TimeFormat::Mjd))
        .filter(FilterRule::Keyword(FilterKey::new(
            "FPA.FILTER",
            &[
                ("g.00000", "gp"),
                ("r.00000", "rp"),
                ("i.00000", "ip"),
                ("z.00000", "zp"),
            ],
        )))
}

pub fn liverpool() -> Variant {
    Variant::new("Liverpool")
        .matching(criteria("Liverpool Telescope", ""))
        .siteid(8)
        .obstime(start("DATE-OBS", TimeFormat::Isot))
        .filter(FilterRule::Keyword(FilterKey::new(
            "FILTER1",
            &[
                ("Bessel-B", "B"),
                ("Bessell-B", "B"),
                ("Bessel-V", "V"),
                ("Bessell-V", "V"),
                ("SDSS-U", "up"),
                ("SDSS-G", "gp"),
                ("SDSS-R", "rp"),
                ("SDSS-I", "ip"),
                ("SDSS-Z", "zp"),
            ],
        )))
}

pub fn omega2000() -> Variant {
    Variant::new("Omega2000")
        .matching(criteria("CA 3.5m", "Omega2000"))
        .siteid(9)
        .obstime(start("MJD-OBS", TimeFormat::Mjd))
}

fn is_swope(identity: &Identity<'_>, header: &Header) -> bool {
    identity.telescope.to_uppercase().starts_with("SWO")
        && header.get_string("SITENAME").as_deref() == Some("LCO")
}

fn is_swope_newheader(identity: &Identity<'_>, _header: &Header) -> bool {
    identity.telescope.to_uppercase().starts_with("SWO") && identity.origin == "ziggy"
}

pub fn swope() -> Variant {
    Variant::new("Swope")
        .matched_by(is_swope)
        .siteid(10)
        .filter(filter(SWOPE_FILTERS))
}

/// Swope files written by the newer acquisition software.
pub fn swope_newheader() -> Variant {
    Variant::new("Swope_newheader")
        .matched_by(is_swope_newheader)
        .siteid(10)
        .obstime(start("MJD-OBS", TimeFormat::Mjd))
        .filter(filter(SWOPE_FILTERS))
}

pub fn dupont() -> Variant {
    Variant::new("Dupont")
        .matching(MatchCriteria {
            unique_headers: vec![("SITENAME", HeaderMatch::Str("LCO"))],
            ..criteria("DUP", "Direct/SITe2K-1")
        })
        .siteid(14)
        .filter(filter(SWOPE_FILTERS))
}

pub fn retrocam() -> Variant {
    Variant::new("RetroCam")
        .matching(criteria("DUP", "RetroCam"))
        .siteid(16)
        .filter(filter(&[("Yc", "Y"), ("Hc", "H"), ("Jo", "J")]))
}

/// Magellan Baade FourStar; `EXPTIME` covers a single coadd.
pub fn baade() -> Variant {
    Variant::new("Baade")
        .matching(MatchCriteria {
            unique_headers: vec![("SITENAME", HeaderMatch::Str("LCO"))],
            ..criteria("Baade", "FourStar")
        })
        .siteid(11)
        .exptime(ExptimeRule::TimesCount {
            key: "EXPTIME",
            count: "NCOMBINE",
        })
        .filter(filter(&[("Ks", "K"), ("J1", "Y")]))
}

fn is_sofi(identity: &Identity<'_>, _header: &Header) -> bool {
    identity.instrument == "SOFI" && matches!(identity.telescope, "ESO-NTT" | "other")
}

pub fn sofi() -> Variant {
    Variant::new("Sofi")
        .matched_by(is_sofi)
        .siteid(12)
        .obstime(ObstimeRule::first_of(vec![
            TimeKey::midpoint("TMID", TimeFormat::Mjd),
            TimeKey::start("MJD-OBS", TimeFormat::Mjd),
        ]))
        .filter(FilterRule::KeywordOrSearch {
            keyword: FilterKey::new("FILTER", KS),
            search: FilterSearch {
                keys: vec!["ESO INS FILT1 ID", "ESO INS FILT2 ID"],
                table: KS,
                normalize: Normalize::Verbatim,
            },
        })
}

pub fn efosc() -> Variant {
    Variant::new("EFOSC")
        .matching(criteria("ESO-NTT", "EFOSC"))
        .siteid(15)
        .obstime(start("DATE-OBS", TimeFormat::Isot))
        .filter(filter(&[
            ("g782", "gp"),
            ("r784", "rp"),
            ("i705", "ip"),
            ("B639", "B"),
            ("V641", "V"),
        ]))
}

pub fn astronircam() -> Variant {
    Variant::new("AstroNIRCam")
        .matching(criteria("SAI-2.5", "ASTRONIRCAM"))
        .siteid(13)
        .exptime(ExptimeRule::FirstOf(vec!["FULL_EXP", "EXPTIME"]))
        .obstime(ObstimeRule::first_of(vec![
            TimeKey::midpoint("MIDPOINT", TimeFormat::Isot),
            TimeKey::midpoint("MJD-AVG", TimeFormat::Mjd),
        ]))
        .filter(filter(&[("H_Open", "H"), ("K_Open", "K")]))
}

/// VLT Survey Telescope.
pub fn omegacam() -> Variant {
    Variant::new("OmegaCam")
        .matching(criteria("", "OMEGACAM"))
        .siteid(18)
        .obstime(start("MJD-OBS", TimeFormat::Mjd))
        .filter(FilterRule::Keyword(FilterKey::new(
            "ESO INS FILT1 NAME",
            &[("i_SDSS", "ip")],
        )))
}

pub fn andicam() -> Variant {
    Variant::new("AndiCam")
        .matching(MatchCriteria {
            unique_headers: vec![("OBSERVAT", HeaderMatch::Str("CTIO"))],
            ..criteria("", "ANDICAM-CCD")
        })
        .siteid(20)
        .obstime(start("JD", TimeFormat::Jd))
        .filter(FilterRule::Keyword(FilterKey::new("CCDFLTID", &[])))
}

pub fn pairtel() -> Variant {
    Variant::new("PairTel")
        .matching(criteria("1.3m PAIRITEL", "2MASS Survey cam"))
        .siteid(21)
        .obstime(ObstimeRule::interval(
            "STRT_CPU",
            "STOP_CPU",
            TimeFormat::Iso,
        ))
        .filter(filter(&[("j", "J"), ("h", "H"), ("k", "K")]))
}

pub fn tjo_meia2() -> Variant {
    Variant::new("TJO_Meia2")
        .matching(criteria("TJO", "MEIA2"))
        .siteid(22)
        .obstime(start("JD", TimeFormat::Jd))
}

pub fn tjo_meia3() -> Variant {
    Variant::new("TJO_Meia3")
        .matching(criteria("TJO", "MEIA3"))
        .siteid(22)
        .obstime(start("JD", TimeFormat::Jd))
}

pub fn ratir() -> Variant {
    Variant::new("RATIR")
        .matching(criteria("OAN/SPM Harold L. Johnson 1.5-meter", ""))
        .siteid(23)
        .obstime(midpoint("DATE-OBS", TimeFormat::Isot))
        .filter(filter(&[("Z", "zp"), ("r", "rp"), ("i", "ip")]))
}

pub fn schmidt() -> Variant {
    Variant::new("Schmidt")
        .matching(MatchCriteria {
            unique_headers: vec![("SITELAT", HeaderMatch::Num(45.8494444))],
            ..criteria("67/91 Schmidt Telescope", "Moravian G4-16000LC")
        })
        .siteid(26)
        .peakmax(56000.0)
        .obstime(start("DATE-OBS", TimeFormat::Isot))
        .filter(FilterRule::Canonical {
            key: "FILTER",
            first_letter: false,
        })
}

pub fn afosc() -> Variant {
    Variant::new("AFOSC")
        .matching(criteria("1.82m Reflector", "AFOSC"))
        .siteid(25)
        .peakmax(50000.0)
        .obstime(start("DATE-OBS", TimeFormat::Isot))
        .filter(FilterRule::Canonical {
            key: "FILTER",
            first_letter: true,
        })
}

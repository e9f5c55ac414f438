use anyhow::{bail, Context};
use clap::Parser;
use log::{error, LevelFilter};
use serde::Serialize;
use std::path::{Path, PathBuf};

use fitsnorm::{
    AnalyticEphemeris, InstrumentDefaults, LoadedImage, Loader, SiteCatalog, SkyCoord,
    SpkEphemeris,
};

#[derive(Parser)]
#[command(
    name = "fitsnorm",
    version,
    about = "Identify and normalize astronomical FITS images"
)]
struct Args {
    /// FITS files or directories of FITS files
    paths: Vec<PathBuf>,

    /// Target right ascension in degrees (ICRS)
    #[arg(long, requires = "dec", allow_negative_numbers = true)]
    ra: Option<f64>,

    /// Target declination in degrees (ICRS)
    #[arg(long, requires = "ra", allow_negative_numbers = true)]
    dec: Option<f64>,

    /// JSON site catalog
    #[arg(long)]
    sites: Option<PathBuf>,

    /// JPL SPK kernel for the barycentric correction [default: $FITSNORM_EPHEMERIS]
    #[arg(long)]
    ephemeris: Option<PathBuf>,

    /// Use the built-in analytic ephemeris (about 0.1 s) instead of a kernel
    #[arg(long, conflicts_with = "ephemeris")]
    analytic_ephemeris: bool,

    /// Print one JSON object per file
    #[arg(long)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// List the supported instruments in priority order and exit
    #[arg(long, exclusive = true)]
    list_instruments: bool,
}

#[derive(Serialize)]
struct Summary<'a> {
    path: &'a Path,
    instrument: &'a str,
    extension: usize,
    shape: (usize, usize),
    masked_pixels: usize,
    exptime: Option<f64>,
    photfilter: Option<&'a str>,
    peakmax: Option<f64>,
    /// UTC Julian date, or TDB after barycentric correction
    obstime_jd: Option<f64>,
    siteid: Option<i64>,
    instrument_defaults: Option<InstrumentDefaults>,
}

impl<'a> Summary<'a> {
    fn new(path: &'a Path, loaded: &'a LoadedImage, barycentric: bool) -> Self {
        let image = &loaded.image;
        Self {
            path,
            instrument: &loaded.instrument,
            extension: loaded.extension,
            shape: image.shape(),
            masked_pixels: image.mask().iter().filter(|&&m| m).count(),
            exptime: image.exptime,
            photfilter: image.photfilter.as_deref(),
            peakmax: image.peakmax,
            obstime_jd: image
                .obstime
                .map(|t| if barycentric { t.jd_tdb() } else { t.jd() }),
            siteid: image.site.as_ref().and_then(|s| s.siteid),
            instrument_defaults: image.instrument_defaults,
        }
    }
}

fn collect_fits_files(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let entries =
        std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension()
                        .and_then(|e| e.to_str())
                        .map(|e| e.to_ascii_lowercase())
                        .as_deref(),
                    Some("fits" | "fit" | "fts")
                )
        })
        .collect();
    files.sort();
    Ok(files)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(default_level)
        .parse_default_env()
        .init();

    if args.list_instruments {
        for (i, name) in fitsnorm::instrument::builtin().names().iter().enumerate() {
            println!("{:2} {name}", i + 1);
        }
        return Ok(());
    }

    if args.paths.is_empty() {
        bail!("no input files given");
    }

    let sites = match &args.sites {
        Some(path) => SiteCatalog::from_json_file(path)
            .with_context(|| format!("reading site catalog {}", path.display()))?,
        None => SiteCatalog::default(),
    };
    let target = args.ra.zip(args.dec).map(SkyCoord::from);
    let mut loader = Loader::new().with_sites(sites);
    if let Some(path) = &args.ephemeris {
        let kernel = SpkEphemeris::open(path)
            .with_context(|| format!("reading ephemeris kernel {}", path.display()))?;
        loader = loader.with_ephemeris(kernel);
    } else if args.analytic_ephemeris {
        loader = loader.with_ephemeris(AnalyticEphemeris);
    }

    let mut files = Vec::new();
    for path in &args.paths {
        if path.is_dir() {
            files.extend(collect_fits_files(path)?);
        } else {
            files.push(path.clone());
        }
    }

    let mut failed = 0usize;
    for path in &files {
        let loaded = match loader
            .load(path, target)
            .with_context(|| format!("loading {}", path.display()))
        {
            Ok(loaded) => loaded,
            Err(e) => {
                error!("{e:#}");
                failed += 1;
                continue;
            }
        };
        let summary = Summary::new(path, &loaded, target.is_some());
        if args.json {
            println!("{}", serde_json::to_string(&summary)?);
        } else {
            println!(
                "{}: {} ext {} {}x{} masked={} exptime={} filter={} jd={} site={}",
                path.display(),
                summary.instrument,
                summary.extension,
                summary.shape.0,
                summary.shape.1,
                summary.masked_pixels,
                summary.exptime.map_or("-".into(), |v| v.to_string()),
                summary.photfilter.unwrap_or("-"),
                summary.obstime_jd.map_or("-".into(), |v| format!("{v:.6}")),
                summary.siteid.map_or("-".into(), |v| v.to_string()),
            );
        }
    }

    if failed > 0 {
        bail!("{failed} of {} file(s) failed to load", files.len());
    }
    Ok(())
}

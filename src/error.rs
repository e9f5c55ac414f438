use thiserror::Error;

/// Errors raised while resolving and normalizing an image.
#[derive(Debug, Error)]
pub enum Error {
    #[error("FITS I/O error: {0}")]
    Fits(#[from] fitsio::errors::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed FITS file: {0}")]
    Malformed(String),

    #[error("required header keyword {0} is missing")]
    MissingHeader(String),

    #[error("header keyword {key} has an unusable value: {reason}")]
    InvalidHeader { key: String, reason: String },

    #[error("could not determine filter used, candidates: {0:?}")]
    AmbiguousFilter(Vec<String>),

    #[error("{instrument}: header defines {key}, which this instrument never writes")]
    UnexpectedFilterKeyword { instrument: String, key: String },

    #[error("could not find filter {filter} in the canonical filter table")]
    UnknownFilter { filter: String },

    #[error("could not determine origin of image (TELESCOP={telescope:?}, ORIGIN={origin:?}, INSTRUME={instrument:?})")]
    NoInstrument {
        telescope: String,
        origin: String,
        instrument: String,
    },

    #[error("{0}: a target coordinate is needed to find the correct extension")]
    TargetRequired(String),

    #[error("could not find image extension that target is on")]
    TargetNotOnImage,

    #[error("image OB type {0:?} is neither AutoJitter nor FixedOffset")]
    ObType(String),

    #[error("site {0} not found")]
    SiteNotFound(i64),

    #[error("site lookup failed: {0}")]
    SiteLookup(String),

    #[error("observatory location is unknown for this image")]
    MissingLocation,

    #[error("observation time is not available")]
    MissingObstime,

    #[error("invalid time value {value:?}: {reason}")]
    InvalidTime { value: String, reason: String },

    #[error("mask shape {mask:?} does not match image shape {image:?}")]
    ShapeMismatch {
        image: (usize, usize),
        mask: (usize, usize),
    },

    #[error("world coordinate system: {0}")]
    Wcs(String),

    #[error("ephemeris: {0}")]
    Ephemeris(String),

    #[error("no ephemeris kernel for the barycentric correction; set FITSNORM_EPHEMERIS to a JPL SPK file")]
    NoEphemeris,

    #[error("instrument {shadowed} can never be selected: {by} precedes it and matches everything it matches")]
    UnreachableVariant { shadowed: String, by: String },

    #[error("instrument {0} is registered twice")]
    DuplicateVariant(String),
}

/// Coarse classification of [`Error`], for batch callers deciding what to do
/// with a file that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Required header data is absent or unusable.
    MissingData,
    /// More than one (or no) plausible value, e.g. filter candidates.
    Ambiguous,
    /// No instrument or extension matches.
    NoMatch,
    /// File or collaborator I/O failed.
    Io,
    /// Programming or configuration error (registry ordering, shapes).
    Invalid,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Fits(_) | Error::Io(_) | Error::SiteLookup(_) | Error::Ephemeris(_) => {
                ErrorKind::Io
            }
            Error::Malformed(_)
            | Error::MissingHeader(_)
            | Error::InvalidHeader { .. }
            | Error::TargetRequired(_)
            | Error::ObType(_)
            | Error::SiteNotFound(_)
            | Error::MissingLocation
            | Error::MissingObstime
            | Error::InvalidTime { .. }
            | Error::Wcs(_) => ErrorKind::MissingData,
            Error::AmbiguousFilter(_)
            | Error::UnexpectedFilterKeyword { .. }
            | Error::UnknownFilter { .. } => ErrorKind::Ambiguous,
            Error::NoInstrument { .. } | Error::TargetNotOnImage => ErrorKind::NoMatch,
            Error::ShapeMismatch { .. }
            | Error::UnreachableVariant { .. }
            | Error::DuplicateVariant(_)
            | Error::NoEphemeris => ErrorKind::Invalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::MissingHeader("EXPTIME".to_string());
        assert!(err.to_string().contains("EXPTIME"));
        assert_eq!(err.kind(), ErrorKind::MissingData);

        let err = Error::AmbiguousFilter(vec!["B".into(), "V".into()]);
        assert!(err.to_string().contains("could not determine filter"));
        assert_eq!(err.kind(), ErrorKind::Ambiguous);
    }

    #[test]
    fn test_no_match_kind() {
        let err = Error::NoInstrument {
            telescope: "X".into(),
            origin: String::new(),
            instrument: "Y".into(),
        };
        assert_eq!(err.kind(), ErrorKind::NoMatch);
        assert_eq!(Error::TargetNotOnImage.kind(), ErrorKind::NoMatch);
    }

    #[test]
    fn test_ephemeris_kinds() {
        assert_eq!(Error::NoEphemeris.kind(), ErrorKind::Invalid);
        assert!(Error::NoEphemeris.to_string().contains("FITSNORM_EPHEMERIS"));
        assert_eq!(Error::Ephemeris("no coverage".into()).kind(), ErrorKind::Io);
    }
}

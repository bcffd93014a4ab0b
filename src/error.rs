use std::fmt;

/// Severity band an [`Error`] falls into, per the NTv2 error taxonomy.
///
/// Bands are ordered by how they propagate: a `Generic` or `Unrecoverable`
/// error aborts whatever it was raised from; a `Warning` is folded into
/// [`crate::header::FixFlags`] and only surfaced by [`crate::Grid::validate`];
/// `RecoverableRead` sits in between — the field is kept, but `validate`
/// reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Generic,
    Warning,
    RecoverableRead,
    Unrecoverable,
}

/// The `ntv2grid` error type.
///
/// Each variant also carries a stable numeric code (see [`Error::code`]),
/// taken from the original `NTV2_ERR_*` constants, so callers that need to
/// interoperate with other NTv2 tooling can compare codes rather than match
/// on variants.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("i/o error")]
    Io(#[from] std::io::Error),

    #[error("UTF8 error")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("null or empty path")]
    NullPath,

    #[error("cannot open file: {0}")]
    CannotOpen(String),

    #[error("unexpected end of file")]
    UnexpectedEof,

    #[error("NUM_OREC is not 11 (file is not a valid NTv2 file, or endianness could not be determined)")]
    InvalidNumOrec,

    #[error("NUM_SREC is not 11")]
    InvalidNumSrec,

    #[error("NUM_FILE must be a positive integer")]
    InvalidNumFile,

    #[error("GS_TYPE must be one of SECONDS, MINUTES or DEGREES, found {0:?}")]
    InvalidGsType(String),

    #[error("GS_COUNT does not match the declared grid dimensions (record {0})")]
    InvalidGsCount(usize),

    #[error("nrows * ncols does not equal num for record {0}")]
    InvalidDelta(usize),

    #[error("record {0} cannot be its own parent")]
    InvalidParentName(usize),

    #[error("parent record for {0:?} not found")]
    ParentNotFound(String),

    #[error("file has no top-level parent")]
    NoTopLevelParent,

    #[error("parent chain loop detected starting at record {0}")]
    ParentLoop(usize),

    #[error("top-level parents {0} and {1} overlap")]
    ParentOverlap(usize, usize),

    #[error("sibling sub-files {0} and {1} overlap")]
    SubfileOverlap(usize, usize),

    #[error("invalid lat min/max for record {0}")]
    InvalidLatMinMax(usize),

    #[error("invalid lon min/max for record {0}")]
    InvalidLonMinMax(usize),

    #[error("invalid LAT_INC for record {0}")]
    InvalidLatInc(usize),

    #[error("invalid LONG_INC for record {0}")]
    InvalidLonInc(usize),

    #[error("extent leaves no active record")]
    InvalidExtent,

    #[error("headers have not been read")]
    HeadersNotRead,

    #[error("unknown file type (expected .gsb or .gsa extension)")]
    UnknownFileType,

    #[error("file is the wrong kind for this operation")]
    WrongFileKind,

    #[error("original overview/sub-file records were not kept (load with keep_orig)")]
    OrigDataNotKept,

    #[error("shift data was not read (load with read_data)")]
    DataNotRead,

    #[error("invalid line in ASCII file: {0:?}")]
    InvalidAsciiLine(String),

    #[error("file needs cosmetic fixing (see Grid::fixed())")]
    NeedsFixing,
}

impl Error {
    /// The stable numeric code for this error, matching `NTV2_ERR_*`.
    pub fn code(&self) -> u16 {
        use Error::*;
        match self {
            Io(_) => 2,
            Utf8(_) => 2,
            NullPath => 318,
            CannotOpen(_) => 321,
            UnexpectedEof => 322,
            InvalidNumOrec => 301,
            InvalidNumSrec => 302,
            InvalidNumFile => 303,
            InvalidGsType(_) => 304,
            InvalidGsCount(_) => 305,
            InvalidDelta(_) => 306,
            InvalidParentName(_) => 307,
            ParentNotFound(_) => 308,
            NoTopLevelParent => 309,
            ParentLoop(_) => 310,
            ParentOverlap(_, _) => 311,
            SubfileOverlap(_, _) => 312,
            InvalidExtent => 313,
            HeadersNotRead => 314,
            UnknownFileType => 315,
            WrongFileKind => 316,
            OrigDataNotKept => 319,
            DataNotRead => 320,
            InvalidAsciiLine(_) => 323,
            InvalidLatMinMax(_) => 201,
            InvalidLonMinMax(_) => 202,
            InvalidLatInc(_) => 205,
            InvalidLonInc(_) => 206,
            NeedsFixing => 101,
        }
    }

    /// The severity band this error falls into.
    pub fn severity(&self) -> Severity {
        let code = self.code();
        if code < 100 {
            Severity::Generic
        } else if code < 200 {
            Severity::Warning
        } else if code < 300 {
            Severity::RecoverableRead
        } else {
            Severity::Unrecoverable
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Generic => "generic",
            Severity::Warning => "warning",
            Severity::RecoverableRead => "recoverable-read",
            Severity::Unrecoverable => "unrecoverable",
        };
        f.write_str(s)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

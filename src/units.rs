//! The `gs-units` a NTv2 file's bounding-box/increment values are stored in.

use crate::error::Error;

/// The native unit of a file's header (bounding-box and increment) fields.
///
/// Grid-shift data itself is always stored in decimal seconds of arc; `Unit`
/// only governs the overview/sub-file header fields (see spec.md §3) and the
/// header-to-degrees / data-to-seconds conversion factors derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Seconds,
    Minutes,
    Degrees,
}

impl Unit {
    pub(crate) fn from_gs_type(s: &str) -> Result<Self, Error> {
        match s.trim_end() {
            "SECONDS" => Ok(Unit::Seconds),
            "MINUTES" => Ok(Unit::Minutes),
            "DEGREES" => Ok(Unit::Degrees),
            other => Err(Error::InvalidGsType(other.to_string())),
        }
    }

    pub(crate) fn gs_type(self) -> &'static str {
        match self {
            Unit::Seconds => "SECONDS ",
            Unit::Minutes => "MINUTES ",
            Unit::Degrees => "DEGREES ",
        }
    }

    /// Factor to convert a header (bounding-box/increment) value to degrees.
    pub(crate) fn header_conversion(self) -> f64 {
        match self {
            Unit::Seconds => 1.0 / 3600.0,
            Unit::Minutes => 1.0 / 60.0,
            Unit::Degrees => 1.0,
        }
    }

    /// Factor to convert a grid-shift value, stored in this unit's native
    /// data representation, to seconds of arc. Used as `raw * data_conversion()
    /// / 3600.0` to get degrees (spec.md §4.G).
    pub(crate) fn data_conversion(self) -> f64 {
        match self {
            Unit::Seconds => 1.0,
            Unit::Minutes => 60.0,
            Unit::Degrees => 3600.0,
        }
    }
}

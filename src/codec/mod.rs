//! Byte-layer codec: endianness/padding-word autodetection, fixed-field
//! record I/O for the binary variant, and a line-oriented tokeniser for the
//! ASCII variant (spec.md §4.A).

pub mod ascii;
pub mod binary;

/// How a file's binary records are laid out on disk, or how to lay them out
/// on write. `Native` always resolves to one of `Big`/`Little` before it
/// reaches the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Endianness {
    Big,
    Little,
    #[default]
    Native,
    /// Write-only: reuse whatever endianness the source file had.
    MatchInput,
}

impl Endianness {
    /// Resolve to a concrete `Big`/`Little`, given the endianness a loaded
    /// file was read with (`None` if the source was ASCII or unknown).
    pub(crate) fn resolve(self, input_was_big_endian: Option<bool>) -> bool {
        match self {
            Endianness::Big => true,
            Endianness::Little => false,
            Endianness::Native => cfg!(target_endian = "big"),
            Endianness::MatchInput => input_was_big_endian.unwrap_or(cfg!(target_endian = "big")),
        }
    }
}

/// Which of the two file variants a path or buffer represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Binary,
    Ascii,
}

impl FileKind {
    pub fn from_extension(path: &std::path::Path) -> Option<Self> {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("gsb") => Some(FileKind::Binary),
            Some("gsa") => Some(FileKind::Ascii),
            _ => None,
        }
    }
}

/// Width of a name/key field: 8 bytes, never varies.
pub const NAME_LEN: usize = 8;
/// Width of a binary int or float field.
pub const INT_LEN: usize = 4;
/// Width of a binary double field.
pub const DBL_LEN: usize = 8;
/// Size in bytes of one grid-shift data record (lat-shift, lon-shift,
/// lat-accuracy, lon-accuracy, each a 32-bit float).
pub const NODE_SIZE: usize = 16;

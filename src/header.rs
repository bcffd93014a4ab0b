//! Name-field cleanup and the `fixed` bitmask, plus the raw overview/sub-file
//! records kept around verbatim when a [`crate::LoadOptions::keep_orig`] load
//! is requested (needed to write a file back out).

use bitflags::bitflags;

/// Name field width: 8 bytes, space-padded, never null-terminated.
pub const NAME_LEN: usize = 8;

bitflags! {
    /// Bitmask of cosmetic fixes applied while cleaning up a loaded file.
    ///
    /// None of these abort a load — they are warnings, surfaced only by
    /// [`crate::Grid::validate`] (spec.md §4.B, §7).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FixFlags: u8 {
        const UNPRINTABLE_CHAR       = 0x01;
        const NAME_LOWERCASE         = 0x02;
        const NAME_NOT_ALPHA         = 0x04;
        const BLANK_PARENT_NAME      = 0x08;
        const BLANK_SUBFILE_NAME     = 0x10;
        const END_REC_NOT_FOUND      = 0x20;
        const END_REC_NAME_NOT_ALPHA = 0x40;
        const END_REC_PAD_NOT_ZERO   = 0x80;
    }
}

/// Clean up an 8-byte name field.
///
/// Mirrors `ntv2_cleanup_str` in the original C source: walks at most
/// [`NAME_LEN`] bytes, stopping ("blanking out" the remainder) at the first
/// byte it cannot make sense of. `is_user_data` relaxes the rules for
/// free-form values (e.g. `VERSION`'s value) versus the fixed keyword
/// fields (e.g. `"SUB_NAME"`), which must end up upper-case and alphanumeric.
pub fn clean_name(raw: &[u8], is_user_data: bool) -> (String, FixFlags) {
    let mut out = [b' '; NAME_LEN];
    let mut fixed = FixFlags::empty();
    let mut at_end = false;

    for i in 0..NAME_LEN {
        let c = raw.get(i).copied().unwrap_or(b' ');

        if at_end {
            out[i] = b' ';
            continue;
        }

        if !(0x20..=0x7f).contains(&c) {
            out[i] = b' ';
            at_end = true;
            fixed |= FixFlags::UNPRINTABLE_CHAR;
            continue;
        }

        if c == b' ' || c == b'_' || c.is_ascii_uppercase() {
            out[i] = c;
            continue;
        }

        if !is_user_data && c.is_ascii_lowercase() {
            out[i] = c.to_ascii_uppercase();
            fixed |= FixFlags::NAME_LOWERCASE;
            continue;
        }

        if !is_user_data {
            out[i] = b' ';
            at_end = true;
            fixed |= FixFlags::NAME_NOT_ALPHA;
        } else {
            out[i] = c;
        }
    }

    (String::from_utf8_lossy(&out).into_owned(), fixed)
}

/// Sentinel parent name denoting a top-level (root) sub-grid.
pub const NO_PARENT_NAME: &str = "NONE    ";

/// All-blank name, used to detect an accidentally-empty field.
pub const ALL_BLANKS: &str = "        ";

/// The overview record, exactly as laid out on disk (spec.md §6), retained
/// only when [`crate::LoadOptions::keep_orig`] is set.
#[derive(Debug, Clone)]
pub struct OverviewRaw {
    pub num_orec: i32,
    pub num_srec: i32,
    pub num_file: i32,
    pub gs_type: String,
    pub version: String,
    pub system_f: String,
    pub system_t: String,
    pub major_f: f64,
    pub minor_f: f64,
    pub major_t: f64,
    pub minor_t: f64,
}

/// One sub-file record, exactly as laid out on disk (spec.md §6), retained
/// only when [`crate::LoadOptions::keep_orig`] is set. All coordinate/extent
/// fields remain in the file's native unit and sign convention
/// (positive-west longitude) here — the cleaned-up, degrees/standard-sign
/// values live on [`crate::node::Node`].
#[derive(Debug, Clone)]
pub struct SubfileRaw {
    pub sub_name: String,
    pub parent: String,
    pub created: String,
    pub updated: String,
    pub s_lat: f64,
    pub n_lat: f64,
    pub e_lon: f64,
    pub w_lon: f64,
    pub lat_inc: f64,
    pub lon_inc: f64,
    pub gs_count: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_keyword_uppercases_and_flags() {
        let (name, fixed) = clean_name(b"sub_name", false);
        assert_eq!(name, "SUB_NAME");
        assert!(fixed.contains(FixFlags::NAME_LOWERCASE));
    }

    #[test]
    fn clean_keyword_stops_at_non_alnum() {
        let (name, fixed) = clean_name(b"SUB-NAME", false);
        assert_eq!(name, "SUB     ");
        assert!(fixed.contains(FixFlags::NAME_NOT_ALPHA));
    }

    #[test]
    fn clean_user_value_keeps_punctuation() {
        let (name, fixed) = clean_name(b"NTv2-98 ", true);
        assert_eq!(name, "NTv2-98 ");
        assert!(fixed.is_empty());
    }

    #[test]
    fn clean_unprintable_byte_truncates() {
        let mut raw = *b"ABCD\0FGH";
        raw[4] = 0x01;
        let (name, fixed) = clean_name(&raw, false);
        assert_eq!(name, "ABCD    ");
        assert!(fixed.contains(FixFlags::UNPRINTABLE_CHAR));
    }

    #[test]
    fn short_input_is_space_padded() {
        let (name, _) = clean_name(b"AB", false);
        assert_eq!(name, "AB      ");
    }
}

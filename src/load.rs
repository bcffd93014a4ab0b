//! Header and data parsing for both file variants (spec.md §4.A/§4.B), and
//! the handful of load-time invariant checks that precede topology
//! resolution (NUM_OREC/NUM_SREC/NUM_FILE counts, GS_TYPE, GS_COUNT).
//!
//! Grounded on `ntv2_read_ov_bin`/`ntv2_read_sf_bin`/`ntv2_read_ov_asc`/
//! `ntv2_read_sf_asc` in the original C source. Binary parsing walks the
//! file strictly sequentially (sub-files are not guaranteed to precede
//! their children — see `crate::topology`), recording each sub-file's data
//! offset as it goes so a lazy load can skip straight past the shift
//! quads without materialising them.

use crate::codec::ascii::{self, AsciiReader};
use crate::codec::binary::BinaryReader;
use crate::codec::NODE_SIZE;
use crate::error::Error;
use crate::header::{self, FixFlags, OverviewRaw, SubfileRaw, ALL_BLANKS, NO_PARENT_NAME};
use crate::node::{Data, Node};
use crate::units::Unit;

/// Everything a loader produces, before topology resolution or cropping.
pub struct Loaded {
    pub nodes: Vec<Node>,
    pub overview: OverviewRaw,
    pub subfile_raw: Vec<Option<SubfileRaw>>,
    pub unit: Unit,
    pub fixed: FixFlags,
    /// `Some` for binary files (the endianness the file was read with),
    /// `None` for ASCII.
    pub big_endian: Option<bool>,
    pub pads_present: bool,
}

fn check_key(raw_key: [u8; 8], expected: &str, fixed: &mut FixFlags) {
    let (cleaned, cleanup_flags) = header::clean_name(&raw_key, false);
    *fixed |= cleanup_flags;
    if cleaned.trim_end() != expected {
        *fixed |= FixFlags::NAME_NOT_ALPHA;
    }
}

fn clean_required(raw: &[u8], is_user_data: bool, fixed: &mut FixFlags) -> String {
    let (name, f) = header::clean_name(raw, is_user_data);
    *fixed |= f;
    name
}

/// Build a [`Node`] from one sub-file's raw, native-unit fields, converting
/// to degrees/standard sign (spec.md §3).
fn build_node(raw: &SubfileRaw, header_conv: f64, index: usize) -> Result<Node, Error> {
    let mut node = Node {
        name: raw.sub_name.clone(),
        parent_name: raw.parent.clone(),
        active: true,
        parent: None,
        first_child: None,
        next_sibling: None,
        lat_min: raw.s_lat * header_conv,
        lat_max: raw.n_lat * header_conv,
        lat_inc: raw.lat_inc * header_conv,
        lon_min: -raw.w_lon * header_conv,
        lon_max: -raw.e_lon * header_conv,
        lon_inc: raw.lon_inc * header_conv,
        nrows: 0,
        ncols: 0,
        num: 0,
        offset: 0,
        wskip: 0,
        eskip: 0,
        sskip: 0,
        nskip: 0,
        data: Data::Lazy,
    };
    node.recompute_shape().ok_or(Error::InvalidDelta(index))?;
    if node.num as i32 != raw.gs_count {
        return Err(Error::InvalidGsCount(index));
    }
    Ok(node)
}

pub fn load_binary(buf: &[u8], read_data: bool, keep_orig: bool) -> Result<Loaded, Error> {
    let mut r = BinaryReader::detect(buf)?;
    let mut fixed = FixFlags::empty();

    check_key(r.read_key()?, "NUM_SREC", &mut fixed);
    let num_srec = r.read_i32()?;
    if num_srec != 11 {
        return Err(Error::InvalidNumSrec);
    }

    check_key(r.read_key()?, "NUM_FILE", &mut fixed);
    let num_file = r.read_i32()?;
    if num_file <= 0 {
        return Err(Error::InvalidNumFile);
    }

    check_key(r.read_key()?, "GS_TYPE", &mut fixed);
    let gs_type_raw = r.read_name()?;
    let gs_type = clean_required(&gs_type_raw, false, &mut fixed);
    let unit = Unit::from_gs_type(&gs_type)?;

    check_key(r.read_key()?, "VERSION", &mut fixed);
    let version = clean_required(&r.read_name()?, true, &mut fixed);
    check_key(r.read_key()?, "SYSTEM_F", &mut fixed);
    let system_f = clean_required(&r.read_name()?, true, &mut fixed);
    check_key(r.read_key()?, "SYSTEM_T", &mut fixed);
    let system_t = clean_required(&r.read_name()?, true, &mut fixed);
    check_key(r.read_key()?, "MAJOR_F", &mut fixed);
    let major_f = r.read_f64()?;
    check_key(r.read_key()?, "MINOR_F", &mut fixed);
    let minor_f = r.read_f64()?;
    check_key(r.read_key()?, "MAJOR_T", &mut fixed);
    let major_t = r.read_f64()?;
    check_key(r.read_key()?, "MINOR_T", &mut fixed);
    let minor_t = r.read_f64()?;

    let overview = OverviewRaw {
        num_orec: 11,
        num_srec,
        num_file,
        gs_type,
        version,
        system_f,
        system_t,
        major_f,
        minor_f,
        major_t,
        minor_t,
    };

    let header_conv = unit.header_conversion();
    let mut nodes = Vec::with_capacity(num_file as usize);
    let mut subfile_raw = Vec::with_capacity(num_file as usize);

    for i in 0..num_file as usize {
        check_key(r.read_key()?, "SUB_NAME", &mut fixed);
        let sub_name_raw = r.read_name()?;
        let mut sub_name = clean_required(&sub_name_raw, false, &mut fixed);
        if sub_name == ALL_BLANKS {
            fixed |= FixFlags::BLANK_SUBFILE_NAME;
            sub_name = format!("SF{i:06}");
            sub_name.truncate(8);
            while sub_name.len() < 8 {
                sub_name.push(' ');
            }
        }

        check_key(r.read_key()?, "PARENT", &mut fixed);
        let parent_raw = r.read_name()?;
        let mut parent = clean_required(&parent_raw, false, &mut fixed);
        if parent == ALL_BLANKS {
            parent = NO_PARENT_NAME.to_string();
            fixed |= FixFlags::BLANK_PARENT_NAME;
        }

        check_key(r.read_key()?, "CREATED", &mut fixed);
        let created = clean_required(&r.read_name()?, true, &mut fixed);
        check_key(r.read_key()?, "UPDATED", &mut fixed);
        let updated = clean_required(&r.read_name()?, true, &mut fixed);

        check_key(r.read_key()?, "S_LAT", &mut fixed);
        let s_lat = r.read_f64()?;
        check_key(r.read_key()?, "N_LAT", &mut fixed);
        let n_lat = r.read_f64()?;
        check_key(r.read_key()?, "E_LONG", &mut fixed);
        let e_lon = r.read_f64()?;
        check_key(r.read_key()?, "W_LONG", &mut fixed);
        let w_lon = r.read_f64()?;
        check_key(r.read_key()?, "LAT_INC", &mut fixed);
        let lat_inc = r.read_f64()?;
        check_key(r.read_key()?, "LONG_INC", &mut fixed);
        let lon_inc = r.read_f64()?;
        check_key(r.read_key()?, "GS_COUNT", &mut fixed);
        let gs_count = r.read_i32()?;

        let raw = SubfileRaw {
            sub_name,
            parent,
            created,
            updated,
            s_lat,
            n_lat,
            e_lon,
            w_lon,
            lat_inc,
            lon_inc,
            gs_count,
        };

        let mut node = build_node(&raw, header_conv, i)?;
        node.offset = r.position() as u64;

        let cell_bytes = node.num * NODE_SIZE;
        if read_data {
            let mut shifts = Vec::with_capacity(node.num);
            let mut accur = if keep_orig { Some(Vec::with_capacity(node.num)) } else { None };
            for _ in 0..node.num {
                let lat = r.read_f32()?;
                let lon = r.read_f32()?;
                let lat_acc = r.read_f32()?;
                let lon_acc = r.read_f32()?;
                shifts.push((lat, lon));
                if let Some(accur) = accur.as_mut() {
                    accur.push((lat_acc, lon_acc));
                }
            }
            node.data = match accur {
                Some(accur) => Data::ShiftsWithAccuracy(shifts, accur),
                None => Data::Shifts(shifts),
            };
        } else {
            if r.remaining() < cell_bytes {
                return Err(Error::UnexpectedEof);
            }
            r.seek(r.position() + cell_bytes);
            node.data = Data::Lazy;
        }

        nodes.push(node);
        subfile_raw.push(Some(raw));
    }

    if r.remaining() >= 16 {
        let end_key = r.read_key()?;
        let (end_name, _) = header::clean_name(&end_key, false);
        if end_name.trim_end() != "END" {
            fixed |= FixFlags::END_REC_NAME_NOT_ALPHA;
        }
        let pad = r.read_name()?;
        if pad != [0u8; 8] {
            fixed |= FixFlags::END_REC_PAD_NOT_ZERO;
        }
    } else {
        fixed |= FixFlags::END_REC_NOT_FOUND;
    }

    Ok(Loaded {
        nodes,
        overview,
        subfile_raw,
        unit,
        fixed,
        big_endian: Some(r.big_endian),
        pads_present: r.pads_present,
    })
}

pub fn load_ascii(text: &str, keep_orig: bool) -> Result<Loaded, Error> {
    let mut r = AsciiReader::new(text);
    let mut fixed = FixFlags::empty();

    let num_orec = ascii::parse_i32(r.read_field("NUM_OREC")?)?;
    if num_orec != 11 {
        return Err(Error::InvalidNumOrec);
    }
    let num_srec = ascii::parse_i32(r.read_field("NUM_SREC")?)?;
    if num_srec != 11 {
        return Err(Error::InvalidNumSrec);
    }
    let num_file = ascii::parse_i32(r.read_field("NUM_FILE")?)?;
    if num_file <= 0 {
        return Err(Error::InvalidNumFile);
    }
    let gs_type_raw = r.read_field("GS_TYPE")?;
    let gs_type = clean_required(gs_type_raw.as_bytes(), false, &mut fixed);
    let unit = Unit::from_gs_type(gs_type_raw)?;
    let version = clean_required(r.read_field("VERSION")?.as_bytes(), true, &mut fixed);
    let system_f = clean_required(r.read_field("SYSTEM_F")?.as_bytes(), true, &mut fixed);
    let system_t = clean_required(r.read_field("SYSTEM_T")?.as_bytes(), true, &mut fixed);
    let major_f = ascii::parse_f64(r.read_field("MAJOR_F")?)?;
    let minor_f = ascii::parse_f64(r.read_field("MINOR_F")?)?;
    let major_t = ascii::parse_f64(r.read_field("MAJOR_T")?)?;
    let minor_t = ascii::parse_f64(r.read_field("MINOR_T")?)?;

    let overview = OverviewRaw {
        num_orec: 11,
        num_srec,
        num_file,
        gs_type,
        version,
        system_f,
        system_t,
        major_f,
        minor_f,
        major_t,
        minor_t,
    };

    let header_conv = unit.header_conversion();
    let mut nodes = Vec::with_capacity(num_file as usize);
    let mut subfile_raw = Vec::with_capacity(num_file as usize);

    for i in 0..num_file as usize {
        let sub_name_raw = r.read_field("SUB_NAME")?;
        let mut sub_name = clean_required(sub_name_raw.as_bytes(), false, &mut fixed);
        if sub_name == ALL_BLANKS {
            fixed |= FixFlags::BLANK_SUBFILE_NAME;
            sub_name = format!("SF{i:06}");
            sub_name.truncate(8);
            while sub_name.len() < 8 {
                sub_name.push(' ');
            }
        }
        let parent_raw = r.read_field("PARENT")?;
        let mut parent = clean_required(parent_raw.as_bytes(), false, &mut fixed);
        if parent == ALL_BLANKS {
            parent = NO_PARENT_NAME.to_string();
            fixed |= FixFlags::BLANK_PARENT_NAME;
        }
        let created = clean_required(r.read_field("CREATED")?.as_bytes(), true, &mut fixed);
        let updated = clean_required(r.read_field("UPDATED")?.as_bytes(), true, &mut fixed);
        let s_lat = ascii::parse_f64(r.read_field("S_LAT")?)?;
        let n_lat = ascii::parse_f64(r.read_field("N_LAT")?)?;
        let e_lon = ascii::parse_f64(r.read_field("E_LONG")?)?;
        let w_lon = ascii::parse_f64(r.read_field("W_LONG")?)?;
        let lat_inc = ascii::parse_f64(r.read_field("LAT_INC")?)?;
        let lon_inc = ascii::parse_f64(r.read_field("LONG_INC")?)?;
        let gs_count = ascii::parse_i32(r.read_field("GS_COUNT")?)?;

        let raw = SubfileRaw {
            sub_name,
            parent,
            created,
            updated,
            s_lat,
            n_lat,
            e_lon,
            w_lon,
            lat_inc,
            lon_inc,
            gs_count,
        };
        let mut node = build_node(&raw, header_conv, i)?;

        let mut shifts = Vec::with_capacity(node.num);
        let mut accur = if keep_orig { Some(Vec::with_capacity(node.num)) } else { None };
        for _ in 0..node.num {
            let (lat, lon, lat_acc, lon_acc) = r.read_shift_line()?;
            shifts.push((lat, lon));
            if let Some(accur) = accur.as_mut() {
                accur.push((lat_acc, lon_acc));
            }
        }
        node.data = match accur {
            Some(accur) => Data::ShiftsWithAccuracy(shifts, accur),
            None => Data::Shifts(shifts),
        };

        nodes.push(node);
        subfile_raw.push(Some(raw));
    }

    Ok(Loaded {
        nodes,
        overview,
        subfile_raw,
        unit,
        fixed,
        big_endian: None,
        pads_present: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::binary::BinaryWriter;

    fn synthetic_binary_single_grid() -> Vec<u8> {
        let mut w = BinaryWriter::new(true);
        w.write_field_name("NUM_OREC");
        w.write_i32(11);
        w.write_field_name("NUM_SREC");
        w.write_i32(11);
        w.write_field_name("NUM_FILE");
        w.write_i32(1);
        w.write_field_name("GS_TYPE ");
        w.write_name("SECONDS ");
        w.write_field_name("VERSION ");
        w.write_name("NTv2_0.0");
        w.write_field_name("SYSTEM_F");
        w.write_name("NAD27   ");
        w.write_field_name("SYSTEM_T");
        w.write_name("NAD83   ");
        w.write_field_name("MAJOR_F ");
        w.write_f64(6378206.4);
        w.write_field_name("MINOR_F ");
        w.write_f64(6356583.8);
        w.write_field_name("MAJOR_T ");
        w.write_f64(6378137.0);
        w.write_field_name("MINOR_T ");
        w.write_f64(6356752.314);

        w.write_field_name("SUB_NAME");
        w.write_name("GRID1   ");
        w.write_field_name("PARENT  ");
        w.write_name("NONE    ");
        w.write_field_name("CREATED ");
        w.write_name("01012020");
        w.write_field_name("UPDATED ");
        w.write_name("01012020");
        w.write_field_name("S_LAT   ");
        w.write_f64(0.0);
        w.write_field_name("N_LAT   ");
        w.write_f64(3600.0);
        w.write_field_name("E_LONG  ");
        w.write_f64(0.0);
        w.write_field_name("W_LONG  ");
        w.write_f64(3600.0);
        w.write_field_name("LAT_INC ");
        w.write_f64(3600.0);
        w.write_field_name("LONG_INC");
        w.write_f64(3600.0);
        w.write_field_name("GS_COUNT");
        w.write_i32(4);

        for _ in 0..4 {
            w.write_f32(1.0);
            w.write_f32(2.0);
            w.write_f32(0.1);
            w.write_f32(0.2);
        }

        w.write_field_name("END     ");
        w.buf.extend_from_slice(&[0u8; 8]);
        w.buf
    }

    #[test]
    fn loads_single_grid_binary_file() {
        let buf = synthetic_binary_single_grid();
        let loaded = load_binary(&buf, true, true).unwrap();
        assert_eq!(loaded.nodes.len(), 1);
        assert_eq!(loaded.unit, Unit::Seconds);
        let node = &loaded.nodes[0];
        assert_eq!(node.lat_min, 0.0);
        assert_eq!(node.lat_max, 1.0);
        assert_eq!(node.lon_min, -1.0);
        assert_eq!(node.lon_max, 0.0);
        assert_eq!(node.nrows, 2);
        assert_eq!(node.ncols, 2);
        match &node.data {
            Data::ShiftsWithAccuracy(s, a) => {
                assert_eq!(s.len(), 4);
                assert_eq!(a[0], (0.1, 0.2));
            }
            _ => panic!("expected materialised data"),
        }
    }

    #[test]
    fn lazy_binary_load_skips_data_and_records_offset() {
        let buf = synthetic_binary_single_grid();
        let loaded = load_binary(&buf, false, true).unwrap();
        let node = &loaded.nodes[0];
        assert!(node.data.is_lazy());
        assert!(node.offset > 0);
    }

    #[test]
    fn rejects_bad_gs_type() {
        let mut buf = synthetic_binary_single_grid();
        // GS_TYPE value starts right after the 8-byte "GS_TYPE " key, which
        // itself follows the 3 x 16-byte NUM_* fields (48 bytes in).
        let value_offset = 48 + 8;
        buf[value_offset..value_offset + 8].copy_from_slice(b"BOGUS   ");
        assert!(matches!(load_binary(&buf, true, true), Err(Error::InvalidGsType(_))));
    }
}

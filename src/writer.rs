//! Binary and ASCII serialisation (spec.md §4.H).
//!
//! Grounded on `ntv2_write_file_bin`/`ntv2_write_file_asc` and their
//! `ntv2_write_ov_*`/`ntv2_write_sf_*`/`ntv2_write_end_*` helpers in the
//! original C source: the file is walked depth-first — overview record,
//! then each top-level parent recursively with its children, in array
//! order — and every geometric field is recomputed from the (possibly
//! cropped) [`Node`], not copied from the raw record, so a crop survives a
//! round trip. Only the free-form `CREATED`/`UPDATED` strings, which the
//! model doesn't otherwise track, are pulled from the retained
//! [`SubfileRaw`].

use crate::codec::ascii::format_number;
use crate::codec::binary::BinaryWriter;
use crate::error::Error;
use crate::header::{OverviewRaw, SubfileRaw};
use crate::node::{Data, Node, NodeIndex};
use crate::topology::{self, Topology};
use crate::units::Unit;

const BLANK8: &str = "        ";

fn materialised(node: &Node) -> Result<(&[(f32, f32)], Option<&[(f32, f32)]>), Error> {
    match &node.data {
        Data::Shifts(s) => Ok((s, None)),
        Data::ShiftsWithAccuracy(s, a) => Ok((s, Some(a))),
        Data::Lazy => Err(Error::DataNotRead),
    }
}

fn count_active(nodes: &[Node]) -> usize {
    nodes.iter().filter(|n| n.active).count()
}

fn created_updated(meta: Option<&SubfileRaw>) -> (&str, &str) {
    match meta {
        Some(raw) => (raw.created.as_str(), raw.updated.as_str()),
        None => (BLANK8, BLANK8),
    }
}

/// Preconditions shared by both variants: the source must have been loaded
/// with `keep_orig` and `read_data`, and must have at least one top-level
/// parent with materialised shifts (spec.md §4.H).
fn check_preconditions(nodes: &[Node], topo: &Topology, keep_orig: bool) -> Result<(), Error> {
    if !keep_orig {
        return Err(Error::OrigDataNotKept);
    }
    let first = topo.first_top_level.ok_or(Error::NoTopLevelParent)?;
    materialised(&nodes[first])?;
    Ok(())
}

pub fn write_binary(
    nodes: &[Node],
    topo: &Topology,
    overview: &OverviewRaw,
    subfile_meta: &[Option<SubfileRaw>],
    unit: Unit,
    keep_orig: bool,
    big_endian: bool,
) -> Result<Vec<u8>, Error> {
    check_preconditions(nodes, topo, keep_orig)?;

    let mut w = BinaryWriter::new(big_endian);

    w.write_field_name("NUM_OREC");
    w.write_i32(11);
    w.write_field_name("NUM_SREC");
    w.write_i32(11);
    w.write_field_name("NUM_FILE");
    w.write_i32(count_active(nodes) as i32);
    w.write_field_name("GS_TYPE ");
    w.write_name(unit.gs_type());
    w.write_field_name("VERSION ");
    w.write_name(&overview.version);
    w.write_field_name("SYSTEM_F");
    w.write_name(&overview.system_f);
    w.write_field_name("SYSTEM_T");
    w.write_name(&overview.system_t);
    w.write_field_name("MAJOR_F ");
    w.write_f64(overview.major_f);
    w.write_field_name("MINOR_F ");
    w.write_f64(overview.minor_f);
    w.write_field_name("MAJOR_T ");
    w.write_f64(overview.major_t);
    w.write_field_name("MINOR_T ");
    w.write_f64(overview.minor_t);

    for &top in &topology::top_level_chain(nodes, topo.first_top_level) {
        write_subfile_recursive_bin(&mut w, nodes, top, subfile_meta, unit)?;
    }

    w.write_field_name("END     ");
    w.buf.extend_from_slice(&[0u8; 8]);

    Ok(w.buf)
}

fn write_subfile_recursive_bin(
    w: &mut BinaryWriter,
    nodes: &[Node],
    i: NodeIndex,
    subfile_meta: &[Option<SubfileRaw>],
    unit: Unit,
) -> Result<(), Error> {
    let node = &nodes[i];
    let (created, updated) = created_updated(subfile_meta.get(i).and_then(|m| m.as_ref()));
    let conv = unit.header_conversion();

    w.write_field_name("SUB_NAME");
    w.write_name(&node.name);
    w.write_field_name("PARENT  ");
    w.write_name(&node.parent_name);
    w.write_field_name("CREATED ");
    w.write_name(created);
    w.write_field_name("UPDATED ");
    w.write_name(updated);
    w.write_field_name("S_LAT   ");
    w.write_f64(node.lat_min / conv);
    w.write_field_name("N_LAT   ");
    w.write_f64(node.lat_max / conv);
    w.write_field_name("E_LONG  ");
    w.write_f64(-node.lon_max / conv);
    w.write_field_name("W_LONG  ");
    w.write_f64(-node.lon_min / conv);
    w.write_field_name("LAT_INC ");
    w.write_f64(node.lat_inc / conv);
    w.write_field_name("LONG_INC");
    w.write_f64(node.lon_inc / conv);
    w.write_field_name("GS_COUNT");
    w.write_i32(node.num as i32);

    let (shifts, accuracy) = materialised(node)?;
    for (idx, &(lat, lon)) in shifts.iter().enumerate() {
        let (lat_acc, lon_acc) = accuracy.map(|a| a[idx]).unwrap_or((0.0, 0.0));
        w.write_f32(lat);
        w.write_f32(lon);
        w.write_f32(lat_acc);
        w.write_f32(lon_acc);
    }

    for child in topology::children(nodes, i) {
        write_subfile_recursive_bin(w, nodes, child, subfile_meta, unit)?;
    }
    Ok(())
}

pub fn write_ascii(
    nodes: &[Node],
    topo: &Topology,
    overview: &OverviewRaw,
    subfile_meta: &[Option<SubfileRaw>],
    unit: Unit,
    keep_orig: bool,
) -> Result<String, Error> {
    check_preconditions(nodes, topo, keep_orig)?;

    let mut out = String::new();
    out.push_str("NUM_OREC 11\n");
    out.push_str("NUM_SREC 11\n");
    out.push_str(&format!("NUM_FILE {}\n", count_active(nodes)));
    out.push_str(&format!("GS_TYPE  {}\n", unit.gs_type().trim_end()));
    out.push_str(&format!("VERSION  {}\n", overview.version.trim_end()));
    out.push_str(&format!("SYSTEM_F {}\n", overview.system_f.trim_end()));
    out.push_str(&format!("SYSTEM_T {}\n", overview.system_t.trim_end()));
    out.push_str(&format!("MAJOR_F  {}\n", format_number(overview.major_f)));
    out.push_str(&format!("MINOR_F  {}\n", format_number(overview.minor_f)));
    out.push_str(&format!("MAJOR_T  {}\n", format_number(overview.major_t)));
    out.push_str(&format!("MINOR_T  {}\n", format_number(overview.minor_t)));

    for &top in &topology::top_level_chain(nodes, topo.first_top_level) {
        write_subfile_recursive_asc(&mut out, nodes, top, subfile_meta, unit)?;
    }

    out.push_str("END\n");
    Ok(out)
}

fn write_subfile_recursive_asc(
    out: &mut String,
    nodes: &[Node],
    i: NodeIndex,
    subfile_meta: &[Option<SubfileRaw>],
    unit: Unit,
) -> Result<(), Error> {
    out.push('\n');
    let node = &nodes[i];
    let (created, updated) = created_updated(subfile_meta.get(i).and_then(|m| m.as_ref()));
    let conv = unit.header_conversion();

    out.push_str(&format!("SUB_NAME {}\n", node.name.trim_end()));
    out.push_str(&format!("PARENT   {}\n", node.parent_name.trim_end()));
    out.push_str(&format!("CREATED  {}\n", created.trim_end()));
    out.push_str(&format!("UPDATED  {}\n", updated.trim_end()));
    out.push_str(&format!("S_LAT    {}\n", format_number(node.lat_min / conv)));
    out.push_str(&format!("N_LAT    {}\n", format_number(node.lat_max / conv)));
    out.push_str(&format!("E_LONG   {}\n", format_number(-node.lon_max / conv)));
    out.push_str(&format!("W_LONG   {}\n", format_number(-node.lon_min / conv)));
    out.push_str(&format!("LAT_INC  {}\n", format_number(node.lat_inc / conv)));
    out.push_str(&format!("LONG_INC {}\n", format_number(node.lon_inc / conv)));
    out.push_str(&format!("GS_COUNT {}\n", node.num));

    let (shifts, accuracy) = materialised(node)?;
    for (idx, &(lat, lon)) in shifts.iter().enumerate() {
        let (lat_acc, lon_acc) = accuracy.map(|a| a[idx]).unwrap_or((0.0, 0.0));
        out.push_str(&format!(
            "{} {} {} {}\n",
            format_number(lat as f64),
            format_number(lon as f64),
            format_number(lat_acc as f64),
            format_number(lon_acc as f64)
        ));
    }

    for child in topology::children(nodes, i) {
        write_subfile_recursive_asc(out, nodes, child, subfile_meta, unit)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview() -> OverviewRaw {
        OverviewRaw {
            num_orec: 11,
            num_srec: 11,
            num_file: 1,
            gs_type: "SECONDS ".into(),
            version: "NTv2_0.0".into(),
            system_f: "NAD27   ".into(),
            system_t: "NAD83   ".into(),
            major_f: 6378206.4,
            minor_f: 6356583.8,
            major_t: 6378137.0,
            minor_t: 6356752.314,
        }
    }

    fn node() -> Node {
        Node {
            name: "GRID1   ".into(),
            parent_name: "NONE    ".into(),
            active: true,
            parent: None,
            first_child: None,
            next_sibling: None,
            lat_min: 40.0,
            lat_max: 41.0,
            lat_inc: 1.0,
            lon_min: -80.0,
            lon_max: -79.0,
            lon_inc: 1.0,
            nrows: 2,
            ncols: 2,
            num: 4,
            offset: 0,
            wskip: 0,
            eskip: 0,
            sskip: 0,
            nskip: 0,
            data: Data::Shifts(vec![(1.0, 2.0); 4]),
        }
    }

    #[test]
    fn rejects_write_without_keep_orig() {
        let nodes = vec![node()];
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let err = write_binary(&nodes, &topo, &overview(), &[None], Unit::Seconds, false, true).unwrap_err();
        assert!(matches!(err, Error::OrigDataNotKept));
    }

    #[test]
    fn rejects_write_without_data_read() {
        let mut n = node();
        n.data = Data::Lazy;
        let nodes = vec![n];
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let err = write_binary(&nodes, &topo, &overview(), &[None], Unit::Seconds, true, true).unwrap_err();
        assert!(matches!(err, Error::DataNotRead));
    }

    #[test]
    fn binary_round_trip_header_fields() {
        let nodes = vec![node()];
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let bytes = write_binary(&nodes, &topo, &overview(), &[None], Unit::Seconds, true, true).unwrap();
        // NUM_OREC key + i32(11) + pad, then NUM_SREC key...
        assert_eq!(&bytes[0..8], b"NUM_OREC");
        assert_eq!(i32::from_be_bytes(bytes[8..12].try_into().unwrap()), 11);
        // Buffer ends with the "END" marker field.
        assert_eq!(&bytes[bytes.len() - 16..bytes.len() - 8], b"END     ");
    }

    #[test]
    fn ascii_output_contains_header_and_data_lines() {
        let nodes = vec![node()];
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let text = write_ascii(&nodes, &topo, &overview(), &[None], Unit::Seconds, true).unwrap();
        assert!(text.starts_with("NUM_OREC 11\n"));
        assert!(text.contains("SUB_NAME GRID1\n"));
        assert!(text.trim_end().ends_with("END"));
    }
}

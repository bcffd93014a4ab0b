//! Cell-aligned extent cropping (spec.md §4.D).
//!
//! Grounded on `ntv2_process_extent`/`ntv2_inactivate` in the original C
//! source. An extent outside a node's box deactivates its whole subtree; an
//! extent that only partly overlaps rounds each edge outward to the next
//! full cell of the *parent's* increment, shrinks the box, and records byte
//! strides so a lazy reader can skip the cropped-away rows/columns without
//! recomputing offsets.

use crate::codec::NODE_SIZE;
use crate::eq::{ge, gt, le, lt};
use crate::error::Error;
use crate::header::FixFlags;
use crate::node::{Node, NodeIndex};
use crate::topology::{self, Topology};

/// A crop mask in degrees, standard sign convention.
#[derive(Debug, Clone, Copy)]
pub struct Extent {
    pub wlon: f64,
    pub slat: f64,
    pub elon: f64,
    pub nlat: f64,
}

impl Extent {
    pub fn is_empty(&self) -> bool {
        crate::eq::approx_eq(self.wlon, self.elon) || crate::eq::approx_eq(self.slat, self.nlat)
    }
}

fn inactivate(nodes: &mut [Node], i: NodeIndex) {
    if !nodes[i].active {
        return;
    }
    nodes[i].active = false;
    let mut child = nodes[i].first_child;
    while let Some(c) = child {
        inactivate(nodes, c);
        child = nodes[c].next_sibling;
    }
}

/// Apply `extent` to every active node, re-running the topology resolver if
/// anything was pruned. Returns the new topology (unchanged if nothing was
/// cropped).
pub fn apply(
    nodes: &mut [Node],
    extent: Extent,
    topo: Topology,
    fixed: &mut FixFlags,
) -> Result<Topology, Error> {
    if extent.is_empty() {
        return Ok(topo);
    }

    let n = nodes.len();
    let mut changed = false;
    let mut remaining = n;

    for i in 0..n {
        if !nodes[i].active {
            continue;
        }

        let rec = &nodes[i];
        if ge(extent.wlon, rec.lon_max)
            || ge(extent.slat, rec.lat_max)
            || le(extent.elon, rec.lon_min)
            || le(extent.nlat, rec.lat_min)
        {
            log::debug!("record {i} ({}) lies outside the crop extent, deactivating", rec.name);
            let before = count_active(nodes);
            inactivate(nodes, i);
            remaining -= before - count_active(nodes);
            changed = true;
            continue;
        }

        let subset = gt(extent.wlon, rec.lon_min)
            || gt(extent.slat, rec.lat_min)
            || lt(extent.elon, rec.lon_max)
            || lt(extent.nlat, rec.lat_max);
        if !subset {
            continue;
        }

        let ocols = nodes[i].ncols;
        let (lat_inc, lon_inc, lat_mul, lon_mul) = match nodes[i].parent {
            Some(p) => {
                let plat = nodes[p].lat_inc;
                let plon = nodes[p].lon_inc;
                let lat_mul = (plat / nodes[i].lat_inc + 0.5) as i64;
                let lon_mul = (plon / nodes[i].lon_inc + 0.5) as i64;
                (plat, plon, lat_mul, lon_mul)
            }
            None => (nodes[i].lat_inc, nodes[i].lon_inc, 1, 1),
        };

        let mut wskip = 0i64;
        let mut eskip = 0i64;
        let mut sskip = 0i64;
        let mut nskip = 0i64;

        if gt(extent.wlon, nodes[i].lon_min) {
            let d = (extent.wlon - nodes[i].lon_min) / lon_inc;
            let k = d.floor() as i64 * lon_mul;
            if k > 0 {
                wskip = k;
                nodes[i].lon_min += k as f64 * nodes[i].lon_inc;
                nodes[i].ncols -= k as usize;
            }
        }
        if lt(extent.elon, nodes[i].lon_max) {
            let d = (nodes[i].lon_max - extent.elon) / lon_inc;
            let k = d.floor() as i64 * lon_mul;
            if k > 0 {
                eskip = k;
                nodes[i].lon_max -= k as f64 * nodes[i].lon_inc;
                nodes[i].ncols -= k as usize;
            }
        }
        if gt(extent.slat, nodes[i].lat_min) {
            let d = (extent.slat - nodes[i].lat_min) / lat_inc;
            let k = d.floor() as i64 * lat_mul;
            if k > 0 {
                sskip = k;
                nodes[i].lat_min += k as f64 * nodes[i].lat_inc;
                nodes[i].nrows -= k as usize;
            }
        }
        if lt(extent.nlat, nodes[i].lat_max) {
            let d = (nodes[i].lat_max - extent.nlat) / lat_inc;
            let k = d.floor() as i64 * lat_mul;
            if k > 0 {
                nskip = k;
                nodes[i].lat_max -= k as f64 * nodes[i].lat_inc;
                nodes[i].nrows -= k as usize;
            }
        }

        if nodes[i].ncols == 0 || nodes[i].nrows == 0 {
            let before = count_active(nodes);
            inactivate(nodes, i);
            remaining -= before - count_active(nodes);
            changed = true;
            continue;
        }

        if nskip > 0 || sskip > 0 || wskip > 0 || eskip > 0 {
            nodes[i].num = nodes[i].ncols * nodes[i].nrows;
            let cell = NODE_SIZE as u64;
            nodes[i].sskip = sskip as u64 * cell * ocols as u64;
            nodes[i].nskip = nskip as u64 * cell * ocols as u64;
            nodes[i].wskip = wskip as u64 * cell;
            nodes[i].eskip = eskip as u64 * cell;
            changed = true;
            log::debug!(
                "record {i} cropped to {}x{} cells (wskip={wskip} eskip={eskip} sskip={sskip} nskip={nskip})",
                nodes[i].ncols,
                nodes[i].nrows
            );
        }
    }

    if !changed {
        return Ok(topo);
    }
    if remaining == 0 {
        return Err(Error::InvalidExtent);
    }
    topology::resolve(nodes, fixed)
}

fn count_active(nodes: &[Node]) -> usize {
    nodes.iter().filter(|n| n.active).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Data;

    fn top_level(name: &str, lat_inc: f64, lon_inc: f64, size: f64) -> Node {
        Node {
            name: name.to_string(),
            parent_name: "NONE    ".to_string(),
            active: true,
            parent: None,
            first_child: None,
            next_sibling: None,
            lat_min: -size,
            lat_max: size,
            lat_inc,
            lon_min: -size,
            lon_max: size,
            lon_inc,
            nrows: (2.0 * size / lat_inc) as usize + 1,
            ncols: (2.0 * size / lon_inc) as usize + 1,
            num: 0,
            offset: 0,
            wskip: 0,
            eskip: 0,
            sskip: 0,
            nskip: 0,
            data: Data::Lazy,
        }
    }

    #[test]
    fn crop_rounds_outward_to_cell_boundary() {
        // A 20x20 degree grid at 1 degree spacing: 21x21 nodes, 20x20 cells.
        let mut nodes = vec![top_level("A       ", 1.0, 1.0, 10.0)];
        nodes[0].num = nodes[0].nrows * nodes[0].ncols;
        let ocols = nodes[0].ncols;
        let mut fixed = FixFlags::empty();
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        // West/south edges sit 1.5 cells inside the grid: rounds outward to
        // a 1-cell crop (floor(1.5) = 1), leaving a half-cell margin.
        let extent = Extent {
            wlon: -8.5,
            slat: -8.5,
            elon: 10.0,
            nlat: 10.0,
        };
        let topo = apply(&mut nodes, extent, topo, &mut fixed).unwrap();
        assert_eq!(topo.num_parents, 1);
        assert_eq!(nodes[0].ncols, 20);
        assert_eq!(nodes[0].nrows, 20);
        assert_eq!(nodes[0].lon_min, -9.0);
        assert_eq!(nodes[0].lat_min, -9.0);
        assert_eq!(nodes[0].eskip, 0);
        assert_eq!(nodes[0].nskip, 0);
        assert_eq!(nodes[0].wskip, NODE_SIZE as u64);
        assert_eq!(nodes[0].sskip, NODE_SIZE as u64 * ocols as u64);
    }

    #[test]
    fn extent_fully_outside_deactivates_everything() {
        let mut nodes = vec![top_level("A       ", 1.0, 1.0, 1.0)];
        let mut fixed = FixFlags::empty();
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let extent = Extent {
            wlon: 50.0,
            slat: 50.0,
            elon: 51.0,
            nlat: 51.0,
        };
        let err = apply(&mut nodes, extent, topo, &mut fixed).unwrap_err();
        assert!(matches!(err, Error::InvalidExtent));
    }

    #[test]
    fn empty_extent_is_a_no_op() {
        let mut nodes = vec![top_level("A       ", 1.0, 1.0, 1.0)];
        let before = nodes[0].clone();
        let mut fixed = FixFlags::empty();
        let topo = Topology {
            num_parents: 1,
            first_top_level: Some(0),
        };
        let extent = Extent {
            wlon: 1.0,
            slat: 1.0,
            elon: 1.0,
            nlat: 1.0,
        };
        let out = apply(&mut nodes, extent, topo, &mut fixed).unwrap();
        assert_eq!(out.num_parents, topo.num_parents);
        assert_eq!(nodes[0].lat_min, before.lat_min);
    }
}

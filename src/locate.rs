//! Point location: find the deepest sub-grid containing (lon, lat) and the
//! edge/corner status under which it was found (spec.md §4.F).
//!
//! Grounded on `ntv2_find_rec` in the original C source, with one
//! deliberate correction: that function's top-level (stage 1) "on West
//! limit" branch tests the same condition as the line above it
//! (`lat == lat_max` instead of `lon == lon_min`), making `WEST` structurally
//! unreachable at the top level — almost certainly a copy-paste slip, since
//! the function's own child-descent stage (stage 2) uses the correct
//! `lon == lon_min` test and the spec states `WEST` unambiguously as "on
//! lon_min". This module applies the corrected edge test at both stages.
//!
//! `CONTAINED` is north/east-inclusive: `lon_min < lon ≤ lon_max ∧
//! lat_min < lat ≤ lat_max` (spec.md §4.F), matching `ntv2_find_rec`'s own
//! stage-1 test (`NTV2_LE(lat, lat_max) && NTV2_GT(lat, lat_min)`,
//! libntv2.c:3882-3883). As in the original, this makes `NORTH` structurally
//! unreachable at stage 1 — a point on a grid's own north edge is already
//! `CONTAINED` — and means a point on a shared horizontal sibling edge is
//! claimed by the grid to its south, not its north.

use crate::eq::{approx_eq, ge, gt, le, lt};
use crate::node::{Node, NodeIndex};

/// Edge/corner status a located point was found under, ranked so that a
/// lower variant always wins a tie (`#[derive(Ord)]` follows declaration
/// order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Status {
    Contained,
    North,
    West,
    NorthWest,
    OutsideCell,
    NotFound,
}

/// Result of a location query.
#[derive(Debug, Clone, Copy)]
pub struct Located {
    pub node: Option<NodeIndex>,
    pub status: Status,
    /// Signed cell overflow direction when `status == OutsideCell`, used by
    /// the interpolator's halo rule. `0` otherwise.
    pub horz: i8,
    pub vert: i8,
}

fn contained(node: &Node, lon: f64, lat: f64) -> bool {
    gt(lon, node.lon_min) && le(lon, node.lon_max) && gt(lat, node.lat_min) && le(lat, node.lat_max)
}

fn north(node: &Node, lon: f64, lat: f64) -> bool {
    gt(lon, node.lon_min) && le(lon, node.lon_max) && approx_eq(lat, node.lat_max)
}

fn west(node: &Node, lon: f64, lat: f64) -> bool {
    approx_eq(lon, node.lon_min) && ge(lat, node.lat_min) && lt(lat, node.lat_max)
}

fn north_west(node: &Node, lon: f64, lat: f64) -> bool {
    approx_eq(lon, node.lon_min) && approx_eq(lat, node.lat_max)
}

/// Within one cell outside any edge, and how many dimensions (0/1/2) the
/// point is properly inside (used for the two-vs-one-dimension tie-break).
fn outside_cell(node: &Node, lon: f64, lat: f64) -> Option<u8> {
    let within = gt(lon, node.lon_min - node.lon_inc)
        && lt(lon, node.lon_max + node.lon_inc)
        && gt(lat, node.lat_min - node.lat_inc)
        && lt(lat, node.lat_max + node.lat_inc);
    if !within {
        return None;
    }
    let mut npings = 0u8;
    if ge(lon, node.lon_min) && le(lon, node.lon_max) {
        npings += 1;
    }
    if ge(lat, node.lat_min) && le(lat, node.lat_max) {
        npings += 1;
    }
    Some(npings)
}

/// Derived from the cell indices the interpolator would land on (floored,
/// before the clamp it applies for `OUTSIDE_CELL`), not from a direct
/// coordinate comparison — the two disagree at a corner where the point
/// overflows one axis and sits exactly on the opposite edge of the other
/// (e.g. `lon == lon_min` with `lat` above `lat_max`), matching
/// `ntv2_calculate_shifts` (libntv2.c:4270-4273).
fn halo_overflow(node: &Node, lon: f64, lat: f64) -> (i8, i8) {
    let icol = ((node.lon_max - lon) / node.lon_inc).floor();
    let irow = ((lat - node.lat_min) / node.lat_inc).floor();

    let horz = if icol < 0.0 {
        1
    } else if icol > node.ncols as f64 - 2.0 {
        -1
    } else {
        0
    };
    let vert = if irow < 0.0 {
        -1
    } else if irow > node.nrows as f64 - 2.0 {
        1
    } else {
        0
    };
    (horz, vert)
}

/// Stage 1: pick the best-ranked top-level parent across the whole chain.
fn locate_top_level(nodes: &[Node], chain: &[NodeIndex], lon: f64, lat: f64) -> Located {
    let mut best: Option<(NodeIndex, Status)> = None;
    let mut best_npings = 0u8;

    for &idx in chain {
        let node = &nodes[idx];

        if contained(node, lon, lat) {
            best = Some((idx, Status::Contained));
            break;
        }
        if north(node, lon, lat) {
            if best.is_none_or(|(_, s)| s > Status::North) {
                best = Some((idx, Status::North));
            }
            continue;
        }
        if west(node, lon, lat) {
            if best.is_none_or(|(_, s)| s > Status::West) {
                best = Some((idx, Status::West));
            }
            continue;
        }
        if north_west(node, lon, lat) {
            if best.is_none_or(|(_, s)| s > Status::NorthWest) {
                best = Some((idx, Status::NorthWest));
            }
            continue;
        }
        if best.is_none_or(|(_, s)| s >= Status::OutsideCell) {
            if let Some(npings) = outside_cell(node, lon, lat) {
                let replace = match best {
                    Some((_, Status::OutsideCell)) => npings >= best_npings,
                    _ => true,
                };
                if replace {
                    best = Some((idx, Status::OutsideCell));
                    best_npings = npings;
                }
            }
        }
    }

    match best {
        Some((idx, Status::OutsideCell)) => {
            let (horz, vert) = halo_overflow(&nodes[idx], lon, lat);
            Located {
                node: Some(idx),
                status: Status::OutsideCell,
                horz,
                vert,
            }
        }
        Some((idx, status)) => Located {
            node: Some(idx),
            status,
            horz: 0,
            vert: 0,
        },
        None => Located {
            node: None,
            status: Status::NotFound,
            horz: 0,
            vert: 0,
        },
    }
}

/// Stage 2: descend into children while one improves on the current rank.
fn descend(nodes: &[Node], mut current: NodeIndex, mut status: Status, lon: f64, lat: f64) -> (NodeIndex, Status) {
    loop {
        if nodes[current].first_child.is_none() {
            return (current, status);
        }

        let mut best: Option<(NodeIndex, Status)> = None;
        let mut child = nodes[current].first_child;
        while let Some(idx) = child {
            let node = &nodes[idx];
            if contained(node, lon, lat) {
                best = Some((idx, Status::Contained));
                break;
            } else if north(node, lon, lat) && best.is_none_or(|(_, s)| s > Status::North) {
                best = Some((idx, Status::North));
            } else if west(node, lon, lat) && best.is_none_or(|(_, s)| s > Status::West) {
                best = Some((idx, Status::West));
            } else if north_west(node, lon, lat) && best.is_none_or(|(_, s)| s > Status::NorthWest) {
                best = Some((idx, Status::NorthWest));
            }
            child = node.next_sibling;
        }

        match best {
            Some((idx, s)) => {
                current = idx;
                status = s;
            }
            None => return (current, status),
        }
    }
}

/// Locate `(lon, lat)` among the top-level chain starting at `first`.
pub fn locate(nodes: &[Node], first: Option<NodeIndex>, lon: f64, lat: f64) -> Located {
    let chain = crate::topology::top_level_chain(nodes, first);
    let top = locate_top_level(nodes, &chain, lon, lat);

    let Some(idx) = top.node else {
        return top;
    };
    if top.status == Status::OutsideCell {
        return top;
    }

    let (idx, status) = descend(nodes, idx, top.status, lon, lat);
    Located {
        node: Some(idx),
        status,
        horz: 0,
        vert: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Data;

    fn grid(name: &str, lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64, inc: f64) -> Node {
        Node {
            name: name.to_string(),
            parent_name: "NONE    ".to_string(),
            active: true,
            parent: None,
            first_child: None,
            next_sibling: None,
            lat_min,
            lat_max,
            lat_inc: inc,
            lon_min,
            lon_max,
            lon_inc: inc,
            nrows: ((lat_max - lat_min) / inc) as usize + 1,
            ncols: ((lon_max - lon_min) / inc) as usize + 1,
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
    fn interior_point_is_contained() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), 0.0, 0.0);
        assert_eq!(r.node, Some(0));
        assert_eq!(r.status, Status::Contained);
    }

    #[test]
    fn shared_vertical_border_claimed_by_western_grid() {
        let mut nodes = vec![
            grid("W       ", -10.0, 0.0, -10.0, 10.0, 1.0),
            grid("E       ", 0.0, 10.0, -10.0, 10.0, 1.0),
        ];
        nodes[0].next_sibling = Some(1);
        let r = locate(&nodes, Some(0), 0.0, 5.0);
        assert_eq!(r.node, Some(0));
        assert_eq!(r.status, Status::Contained);
    }

    #[test]
    fn shared_horizontal_border_claimed_by_southern_grid() {
        let mut nodes = vec![
            grid("S       ", -10.0, 10.0, -10.0, 0.0, 1.0),
            grid("N       ", -10.0, 10.0, 0.0, 10.0, 1.0),
        ];
        nodes[0].next_sibling = Some(1);
        let r = locate(&nodes, Some(0), 5.0, 0.0);
        assert_eq!(r.node, Some(0));
        assert_eq!(r.status, Status::Contained);
    }

    #[test]
    fn own_north_edge_is_contained() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), 0.0, 10.0);
        assert_eq!(r.status, Status::Contained);
    }

    #[test]
    fn own_west_edge_is_west_status() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), -10.0, 0.0);
        assert_eq!(r.status, Status::West);
    }

    #[test]
    fn own_corner_is_north_west_status() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), -10.0, 10.0);
        assert_eq!(r.status, Status::NorthWest);
    }

    #[test]
    fn just_outside_is_outside_cell() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), 10.5, 0.0);
        assert_eq!(r.status, Status::OutsideCell);
        assert_eq!(r.horz, 1);
        assert_eq!(r.vert, 0);
    }

    #[test]
    fn outside_cell_on_one_edge_overflows_the_other_dimension_too() {
        // On the west edge exactly, but above lat_max: the west-edge test
        // requires lat < lat_max so this isn't WEST, and it's too far from
        // lat_max to be NORTH_WEST. The halo overflow is derived from the
        // (floored, unclamped) cell indices, which land past the grid in
        // both dimensions even though `lon` sits exactly on `lon_min`.
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), -10.0, 10.5);
        assert_eq!(r.status, Status::OutsideCell);
        assert_eq!(r.horz, -1);
        assert_eq!(r.vert, 1);
    }

    #[test]
    fn far_outside_is_not_found() {
        let nodes = vec![grid("A       ", -10.0, 10.0, -10.0, 10.0, 1.0)];
        let r = locate(&nodes, Some(0), 50.0, 50.0);
        assert_eq!(r.node, None);
        assert_eq!(r.status, Status::NotFound);
    }

    #[test]
    fn descends_into_containing_child() {
        let mut nodes = vec![
            grid("PARENT  ", -10.0, 10.0, -10.0, 10.0, 1.0),
            grid("CHILD   ", -2.0, 2.0, -2.0, 2.0, 0.5),
        ];
        nodes[1].parent = Some(0);
        nodes[0].first_child = Some(1);
        let r = locate(&nodes, Some(0), 0.0, 0.0);
        assert_eq!(r.node, Some(1));
        assert_eq!(r.status, Status::Contained);
    }
}
